// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-neuron simulation record and spike visuals.
//!
//! ```text
//! Each tick, in order:
//!     1. decay:  scale = max(baseline_scale, scale × decay_factor)
//!                if countdown > 0: countdown -= 1; if countdown == 0: color = baseline_color
//!     2. onset:  with probability rate × dt:
//!                scale = baseline_scale × spike_scale_multiple
//!                color = active_color, countdown = window_ticks
//! ```
//!
//! Color uses a countdown rather than a decay so it returns to the baseline
//! exactly when the window expires.

use probesim_atlas::VoxelCoord;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rate::RateSource;

pub type Rgba = [f32; 4];

/// Stable handle of a neuron within one population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeuronId(pub u32);

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spike appearance parameters shared by a population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeVisuals {
    pub decay_factor: f32,
    pub spike_scale_multiple: f32,
    pub window_ticks: u16,
    pub active_color: Rgba,
    pub baseline_scale: f32,
}

impl Default for SpikeVisuals {
    fn default() -> Self {
        Self {
            decay_factor: 0.9,
            spike_scale_multiple: 2.0,
            window_ticks: 5,
            active_color: [1.0, 1.0, 1.0, 1.0],
            baseline_scale: 1.0,
        }
    }
}

/// Render-facing state of one neuron.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronVisual {
    pub id: NeuronId,
    pub position: [f32; 3],
    pub color: Rgba,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub struct NeuronRecord {
    pub id: NeuronId,
    pub voxel: VoxelCoord,
    pub position: [f32; 3],
    pub baseline_color: Rgba,
    pub color: Rgba,
    pub scale: f32,
    /// Ticks left before the color returns to baseline (0 = idle)
    pub spike_countdown: u16,
    pub rate_source: Option<RateSource>,
    pub spike_count: u64,
}

impl NeuronRecord {
    pub fn new(
        id: NeuronId,
        voxel: VoxelCoord,
        position: [f32; 3],
        baseline_color: Rgba,
        rate_source: Option<RateSource>,
        visuals: &SpikeVisuals,
    ) -> Self {
        Self {
            id,
            voxel,
            position,
            baseline_color,
            color: baseline_color,
            scale: visuals.baseline_scale,
            spike_countdown: 0,
            rate_source,
            spike_count: 0,
        }
    }

    /// Apply one tick of decay from earlier spikes.
    #[inline]
    pub fn decay(&mut self, visuals: &SpikeVisuals) {
        self.scale = (self.scale * visuals.decay_factor).max(visuals.baseline_scale);
        if self.spike_countdown > 0 {
            self.spike_countdown -= 1;
            if self.spike_countdown == 0 {
                self.color = self.baseline_color;
            }
        }
    }

    /// Start a spike this tick.
    #[inline]
    pub fn fire(&mut self, visuals: &SpikeVisuals) {
        self.scale = visuals.baseline_scale * visuals.spike_scale_multiple;
        self.color = visuals.active_color;
        self.spike_countdown = visuals.window_ticks;
        self.spike_count += 1;
    }

    /// Full tick: decay, then spike if `draw < probability`. Returns whether it fired.
    #[inline]
    pub fn step(&mut self, probability: f32, draw: f32, visuals: &SpikeVisuals) -> bool {
        self.decay(visuals);
        let fired = draw < probability;
        if fired {
            self.fire(visuals);
        }
        fired
    }

    pub fn is_spiking(&self) -> bool {
        self.spike_countdown > 0
    }

    pub fn visual(&self) -> NeuronVisual {
        NeuronVisual {
            id: self.id,
            position: self.position,
            color: self.color,
            scale: self.scale,
        }
    }
}
