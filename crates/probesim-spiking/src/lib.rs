// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # probesim Spiking
//!
//! Client-side simulated neurons around the electrode:
//! - **Rate sources**: GLM over behavioral signals, event-average curves, flat rates
//! - **Records**: position, colors, scale and spike countdown per neuron
//! - **Population**: spawn/remove by voxel, parallel per-tick update, visual export

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod neuron;
pub mod population;
pub mod rate;

pub use neuron::{NeuronId, NeuronRecord, NeuronVisual, Rgba, SpikeVisuals};
pub use population::{SpikingPopulation, TickStats};
pub use rate::{BehaviorSignals, EventCurve, Feedback, GlmWeights, RateSource, StimSide};
