// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Server-side startup: datasets, oracle and the streaming thread.

use std::sync::Arc;

use probesim_atlas::{load_all, GridDims, VolumeError};
use probesim_config::{validate_config, GlmConfig, ProbesimConfig, SpikingConfig};
use probesim_spiking::{GlmWeights, SpikeVisuals, SpikingPopulation};
use probesim_streaming::{
    ClientId, GlmNeuronFactory, NeuronPopulationOracle, StreamingHub, StreamingServer,
};
use tracing::{debug, info, warn};

use crate::error::SessionResult;
use crate::session::ProbeSession;

pub fn spike_visuals(config: &SpikingConfig) -> SpikeVisuals {
    SpikeVisuals {
        decay_factor: config.decay_factor,
        spike_scale_multiple: config.spike_scale_multiple,
        window_ticks: config.spike_window_ticks,
        active_color: config.active_color,
        baseline_scale: config.baseline_scale,
    }
}

pub fn glm_weights(config: &GlmConfig) -> GlmWeights {
    GlmWeights {
        baseline: config.baseline,
        wheel_velocity: config.wheel_velocity,
        stim_left: config.stim_left,
        stim_right: config.stim_right,
        feedback: config.feedback,
    }
}

/// One oracle and server thread shared by every session.
pub struct ProbeRuntime {
    config: ProbesimConfig,
    hub: StreamingHub,
    failed_datasets: Vec<(String, VolumeError)>,
}

impl ProbeRuntime {
    /// Validate `config`, load its datasets and start serving.
    ///
    /// Datasets that fail to load are skipped; see [`ProbeRuntime::failed_datasets`].
    pub fn from_config(config: ProbesimConfig) -> SessionResult<Self> {
        validate_config(&config)?;
        configure_thread_pool(config.system.max_cores);

        let dims = GridDims::from(config.volume.dims);
        let report = load_all(&config.datasets, &config.system.data_dir, dims);

        let mut builder = NeuronPopulationOracle::builder(dims);
        for (name, dataset) in report.loaded {
            builder = builder.register(name, dataset)?;
        }
        let oracle = builder.initialize(config.oracle.seed, config.oracle.density)?;
        let mut runtime = Self::with_oracle(config, oracle)?;
        runtime.failed_datasets = report.failed;
        Ok(runtime)
    }

    /// Serve an already built oracle.
    pub fn with_oracle(config: ProbesimConfig, oracle: NeuronPopulationOracle) -> SessionResult<Self> {
        let server = Arc::new(StreamingServer::new(
            Arc::new(oracle),
            config.oracle.derived_datasets.clone(),
        ));
        let hub = StreamingHub::start(
            server,
            config.streaming.request_queue_capacity,
            config.streaming.response_queue_capacity,
        )?;
        info!(
            neurons = hub.server().oracle().neuron_count(),
            radius = config.streaming.radius,
            "Probe runtime started"
        );
        Ok(Self {
            config,
            hub,
            failed_datasets: Vec::new(),
        })
    }

    /// Connect a new electrode session with its own population.
    pub fn open_session(&self, client: ClientId) -> ProbeSession {
        let spiking = &self.config.spiking;
        let population = SpikingPopulation::new(
            spike_visuals(spiking),
            spiking.seed ^ u64::from(client.0),
        );
        let factory = GlmNeuronFactory {
            origin: self.config.volume.origin_voxel,
            voxel_size_um: self.config.volume.voxel_size_um,
            baseline_color: spiking.baseline_color,
            weights: glm_weights(&self.config.glm),
        };
        ProbeSession::new(
            self.hub.connect(client),
            self.dims(),
            population,
            Box::new(factory),
            self.config.streaming.radius,
            spiking.dt(),
        )
    }

    pub(crate) fn hub(&self) -> &StreamingHub {
        &self.hub
    }

    pub fn config(&self) -> &ProbesimConfig {
        &self.config
    }

    pub fn dims(&self) -> GridDims {
        self.hub.server().oracle().dims()
    }

    pub fn server(&self) -> &Arc<StreamingServer> {
        self.hub.server()
    }

    /// Datasets skipped at startup, with the reason.
    pub fn failed_datasets(&self) -> &[(String, VolumeError)] {
        &self.failed_datasets
    }

    pub fn shutdown(&mut self) {
        self.hub.shutdown();
    }
}

fn configure_thread_pool(max_cores: usize) {
    if max_cores == 0 {
        return;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(max_cores).build_global() {
        Ok(()) => debug!(threads = max_cores, "Rayon pool configured"),
        Err(e) => warn!(error = %e, "Rayon pool already initialized, max_cores ignored"),
    }
}
