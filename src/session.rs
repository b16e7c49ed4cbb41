// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Probe Session
//!
//! One electrode: its streaming client, its response queue and the neuron
//! population it renders.
//!
//! ```text
//! move_tip(tip)   -> neighborhood request (skipped when nothing is new)
//! tick()          -> 1. apply every response that arrived since the last tick
//!                    2. advance the population by dt
//! ```
//!
//! Requests never wait for their response; the simulation keeps ticking.

use probesim_atlas::{GridDims, VoxelCoord};
use probesim_spiking::{
    BehaviorSignals, Feedback, NeuronVisual, RateSource, Rgba, SpikingPopulation, StimSide, TickStats,
};
use probesim_streaming::{
    ApplyOutcome, ClientId, ClientLink, ClientState, NeuronFactory, RequestId, StreamingClient,
    StreamingDiagnostics,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SessionResult;
use crate::runtime::ProbeRuntime;

/// One pre-baked neuron of a bulk load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkNeuron {
    pub voxel: VoxelCoord,
    pub rate_source: Option<RateSource>,
    /// Falls back to the session's baseline color
    pub color: Option<Rgba>,
}

/// Neurons placed directly, bypassing streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkLoad {
    pub dataset: String,
    pub neurons: Vec<BulkNeuron>,
}

/// Result of one [`ProbeSession::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTick {
    pub responses_applied: usize,
    pub neurons_spawned: usize,
    pub stats: TickStats,
}

pub struct ProbeSession {
    client: StreamingClient,
    link: ClientLink,
    population: SpikingPopulation,
    factory: Box<dyn NeuronFactory + Send>,
    radius: u32,
    dt: f32,
    tip: Option<VoxelCoord>,
}

impl ProbeSession {
    pub fn new(
        link: ClientLink,
        dims: GridDims,
        population: SpikingPopulation,
        factory: Box<dyn NeuronFactory + Send>,
        radius: u32,
        dt: f32,
    ) -> Self {
        Self {
            client: StreamingClient::new(link.client(), dims),
            link,
            population,
            factory,
            radius,
            dt,
            tip: None,
        }
    }

    /// Move the electrode tip and ask for any new voxels around it.
    ///
    /// Returns the id of the request sent, or `None` if the neighborhood was
    /// already covered. A request lost to a full queue stays outstanding.
    pub fn move_tip(&mut self, tip: VoxelCoord) -> SessionResult<Option<RequestId>> {
        self.tip = Some(tip);
        let Some(request) = self.client.request_neighborhood(tip, self.radius) else {
            return Ok(None);
        };
        let id = request.request_id;
        if let Err(e) = self.link.send(request) {
            warn!(client = %self.client.id(), request = id.0, error = %e, "Request not delivered");
            return Err(e.into());
        }
        Ok(Some(id))
    }

    /// Apply arrived responses, then advance the population one tick.
    pub fn tick(&mut self) -> SessionTick {
        let mut responses_applied = 0;
        let mut neurons_spawned = 0;
        for response in self.link.drain() {
            if let ApplyOutcome::Applied { spawned, .. } =
                self.client
                    .apply_response(response, &mut self.population, self.factory.as_ref())
            {
                responses_applied += 1;
                neurons_spawned += spawned;
            }
        }

        SessionTick {
            responses_applied,
            neurons_spawned,
            stats: self.population.tick(self.dt),
        }
    }

    /// Replace the behavioral signals, keeping the current trial start.
    ///
    /// `stim_on_side` and `feedback` use -1 / 0 / 1.
    pub fn set_signals(&mut self, wheel_velocity: f32, stim_on_side: i8, feedback: i8) {
        let trial_start = self.population.signals().trial_start;
        self.population.set_signals(BehaviorSignals {
            wheel_velocity,
            stim_on_side: StimSide::from_sign(stim_on_side),
            feedback: Feedback::from_sign(feedback),
            trial_start,
        });
    }

    pub fn start_trial(&mut self) {
        self.population.start_trial();
    }

    /// Swap the rate source of the neuron at `voxel`. Returns `false` if the
    /// voxel has no neuron.
    pub fn set_rate_source(&mut self, voxel: VoxelCoord, rate_source: Option<RateSource>) -> bool {
        match self.population.id_at(voxel) {
            Some(id) => self.population.set_rate_source(id, rate_source),
            None => false,
        }
    }

    /// Spawn pre-baked neurons. Occupied or out-of-domain voxels are skipped.
    ///
    /// Returns the number of neurons added.
    pub fn bulk_load(&mut self, load: BulkLoad) -> usize {
        let dims = self.client.dims();
        let mut spawned = 0;
        let mut skipped = 0;
        for neuron in load.neurons {
            if !dims.contains(neuron.voxel) || self.population.contains_voxel(neuron.voxel) {
                skipped += 1;
                continue;
            }
            let template = self.factory.build(neuron.voxel, &[]);
            self.population.spawn(
                neuron.voxel,
                template.position,
                neuron.color.unwrap_or(template.baseline_color),
                neuron.rate_source,
            );
            self.client.mark_present(neuron.voxel);
            spawned += 1;
        }
        info!(dataset = %load.dataset, spawned, skipped, "Bulk load applied");
        spawned
    }

    /// Remove every neuron and forget all streaming state, including
    /// requests that never got a response.
    pub fn clear_population(&mut self) {
        self.population.clear();
        self.client.reset();
        for stale in self.link.drain() {
            debug!(client = %self.client.id(), request = stale.request_id.0, "Dropping response from before reset");
        }
    }

    /// Clear everything and close the route on the server.
    pub fn disconnect(mut self, runtime: &ProbeRuntime) -> bool {
        self.clear_population();
        let removed = runtime.hub().disconnect(self.client.id());
        info!(client = %self.client.id(), "Session disconnected");
        removed
    }

    pub fn client_id(&self) -> ClientId {
        self.client.id()
    }

    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    pub fn tip(&self) -> Option<VoxelCoord> {
        self.tip
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: u32) {
        self.radius = radius;
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn population(&self) -> &SpikingPopulation {
        &self.population
    }

    pub fn client(&self) -> &StreamingClient {
        &self.client
    }

    pub fn diagnostics(&self) -> StreamingDiagnostics {
        self.client.diagnostics()
    }

    pub fn visual_states(&self) -> Vec<NeuronVisual> {
        self.population.visual_states()
    }
}
