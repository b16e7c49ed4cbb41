// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ProbeSim
//!
//! Virtual electrode recording over a sparse volumetric brain atlas: neurons
//! are streamed in around the electrode tip on demand and spike according to
//! behavioral signals.
//!
//! ## Crates
//!
//! - **`config`**: TOML configuration with environment and CLI overrides
//! - **`observability`**: logging setup and per-crate debug flags
//! - **`atlas`**: voxel grid, sparse datasets, border field
//! - **`spiking`**: neuron records, rate sources, per-tick update
//! - **`streaming`**: population oracle and the neighborhood streaming protocol
//!
//! ## Usage
//!
//! ```rust,no_run
//! use probesim::prelude::*;
//!
//! let config = probesim::config::load_config(None, None)?;
//! let runtime = ProbeRuntime::from_config(config)?;
//! let mut session = runtime.open_session(ClientId(1));
//!
//! session.move_tip(VoxelCoord::new(216, 120, 228))?;
//! session.set_signals(0.8, 1, 0);
//! let tick = session.tick();
//! println!("{} spikes from {} neurons", tick.stats.spikes, tick.stats.neurons);
//! # Ok::<(), probesim::SessionError>(())
//! ```

pub mod error;
pub mod runtime;
pub mod session;

pub use probesim_atlas as atlas;
pub use probesim_config as config;
pub use probesim_observability as observability;
pub use probesim_spiking as spiking;
pub use probesim_streaming as streaming;

pub use error::{SessionError, SessionResult};
pub use runtime::{glm_weights, spike_visuals, ProbeRuntime};
pub use session::{BulkLoad, BulkNeuron, ProbeSession, SessionTick};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::atlas::{BorderField, GridDims, SparseVolumeIndex, VoxelCoord};
    pub use crate::config::ProbesimConfig;
    pub use crate::spiking::{BehaviorSignals, GlmWeights, NeuronId, NeuronVisual, RateSource};
    pub use crate::streaming::{ClientId, NeuronFactory, NeuronPopulationOracle, OracleBuilder};
    pub use crate::{BulkLoad, BulkNeuron, ProbeRuntime, ProbeSession, SessionError};
}
