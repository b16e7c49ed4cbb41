// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Spiking Population
//!
//! Dynamically sized set of [`NeuronRecord`]s plus the per-tick update.
//!
//! Records have no shared mutable state, so [`SpikingPopulation::tick`] runs
//! them in parallel. Each record draws from its own RNG stream derived from
//! `(seed, tick, neuron id)`, which keeps a run reproducible regardless of
//! how rayon splits the work.

use ahash::AHashMap;
use probesim_atlas::VoxelCoord;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};
use xxhash_rust::xxh64::xxh64;

use crate::neuron::{NeuronId, NeuronRecord, NeuronVisual, Rgba, SpikeVisuals};
use crate::rate::{BehaviorSignals, RateSource};

/// Result of one [`SpikingPopulation::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    pub spikes: usize,
    pub neurons: usize,
}

pub struct SpikingPopulation {
    records: Vec<NeuronRecord>,
    slot_by_id: AHashMap<NeuronId, usize>,
    id_by_voxel: AHashMap<VoxelCoord, NeuronId>,
    next_id: u32,
    visuals: SpikeVisuals,
    signals: BehaviorSignals,
    /// Simulation time in seconds
    now: f64,
    tick_count: u64,
    seed: u64,
}

impl SpikingPopulation {
    pub fn new(visuals: SpikeVisuals, seed: u64) -> Self {
        Self {
            records: Vec::new(),
            slot_by_id: AHashMap::new(),
            id_by_voxel: AHashMap::new(),
            next_id: 0,
            visuals,
            signals: BehaviorSignals::default(),
            now: 0.0,
            tick_count: 0,
            seed,
        }
    }

    /// Add a neuron at `voxel`.
    ///
    /// A voxel holds at most one neuron: spawning on an occupied voxel is a
    /// no-op that returns the existing id.
    pub fn spawn(
        &mut self,
        voxel: VoxelCoord,
        position: [f32; 3],
        baseline_color: Rgba,
        rate_source: Option<RateSource>,
    ) -> NeuronId {
        if let Some(&existing) = self.id_by_voxel.get(&voxel) {
            debug!(%voxel, id = %existing, "Duplicate spawn ignored");
            return existing;
        }

        let id = self.allocate_id();

        let record = NeuronRecord::new(id, voxel, position, baseline_color, rate_source, &self.visuals);
        self.slot_by_id.insert(id, self.records.len());
        self.id_by_voxel.insert(voxel, id);
        self.records.push(record);
        id
    }

    /// Next free id. The counter wraps, so ids still in use are skipped.
    fn allocate_id(&mut self) -> NeuronId {
        loop {
            let id = NeuronId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.slot_by_id.contains_key(&id) {
                return id;
            }
        }
    }

    /// Remove a neuron. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: NeuronId) -> bool {
        let Some(slot) = self.slot_by_id.remove(&id) else {
            return false;
        };
        let removed = self.records.swap_remove(slot);
        self.id_by_voxel.remove(&removed.voxel);
        if let Some(moved) = self.records.get(slot) {
            self.slot_by_id.insert(moved.id, slot);
        }
        true
    }

    /// Drop every neuron. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.slot_by_id.clear();
        self.id_by_voxel.clear();
        info!(removed = count, "Population cleared");
        count
    }

    pub fn set_signals(&mut self, signals: BehaviorSignals) {
        self.signals = signals;
    }

    pub fn signals(&self) -> &BehaviorSignals {
        &self.signals
    }

    /// Mark the start of a new trial at the current simulation time.
    pub fn start_trial(&mut self) {
        self.signals.trial_start = self.now;
    }

    /// Swap the rate source of one neuron. Returns `false` if the id is unknown.
    pub fn set_rate_source(&mut self, id: NeuronId, rate_source: Option<RateSource>) -> bool {
        match self.slot_by_id.get(&id) {
            Some(&slot) => {
                self.records[slot].rate_source = rate_source;
                true
            }
            None => false,
        }
    }

    /// Advance every neuron by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickStats {
        let now = self.now;
        let tick = self.tick_count;
        let seed = self.seed;
        let visuals = self.visuals;
        let signals = self.signals;

        let spikes: usize = self
            .records
            .par_iter_mut()
            .map(|record| {
                let probability = record
                    .rate_source
                    .as_ref()
                    .map_or(0.0, |source| source.rate(now, &signals) * dt);
                let draw = if probability > 0.0 {
                    neuron_rng(seed, tick, record.id).gen::<f32>()
                } else {
                    1.0
                };
                record.step(probability, draw, &visuals) as usize
            })
            .sum();

        self.now += dt as f64;
        self.tick_count += 1;

        TickStats {
            tick,
            spikes,
            neurons: self.records.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: NeuronId) -> Option<&NeuronRecord> {
        self.slot_by_id.get(&id).map(|&slot| &self.records[slot])
    }

    pub fn id_at(&self, voxel: VoxelCoord) -> Option<NeuronId> {
        self.id_by_voxel.get(&voxel).copied()
    }

    pub fn contains_voxel(&self, voxel: VoxelCoord) -> bool {
        self.id_by_voxel.contains_key(&voxel)
    }

    pub fn records(&self) -> &[NeuronRecord] {
        &self.records
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn visuals(&self) -> &SpikeVisuals {
        &self.visuals
    }

    /// Snapshot for the rendering layer.
    pub fn visual_states(&self) -> Vec<NeuronVisual> {
        self.records.iter().map(NeuronRecord::visual).collect()
    }
}

fn neuron_rng(seed: u64, tick: u64, id: NeuronId) -> SmallRng {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&tick.to_le_bytes());
    key[8..].copy_from_slice(&id.0.to_le_bytes());
    SmallRng::seed_from_u64(xxh64(&key, seed))
}
