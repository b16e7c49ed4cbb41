// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neuron Population Oracle
//!
//! Server-side authority over which voxels hold a neuron.
//!
//! ```text
//! OracleBuilder ──register(name, dataset)──▶ OracleBuilder
//!       │
//!       └──initialize(seed, density)──▶ NeuronPopulationOracle
//!                                          ├── exists(coord)
//!                                          ├── sample_derived_values(name, coord)
//!                                          └── table() -> PopulationExistenceTable
//! ```
//!
//! Queries are only reachable on an initialized oracle, and the builder is
//! consumed by `initialize`, so setup happens exactly once.

use ahash::AHashMap;
use probesim_atlas::{GridDims, LoadedDataset, VoxelCoord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;
use tracing::info;

use crate::claims::ClaimTable;
use crate::error::OracleError;

/// Existence grid plus the per-voxel "requested" claims.
pub struct PopulationExistenceTable {
    dims: GridDims,
    exists: RoaringBitmap,
    requested: ClaimTable,
}

impl PopulationExistenceTable {
    /// Independent Bernoulli draw per voxel in scan order.
    fn sample(dims: GridDims, seed: u64, density: f64) -> Result<Self, OracleError> {
        if !(0.0..=1.0).contains(&density) {
            return Err(OracleError::InvalidDensity(density));
        }
        let total = dims.total_voxels();
        let total_u32 = u32::try_from(total).map_err(|_| OracleError::GridTooLarge(total))?;

        let mut exists = RoaringBitmap::new();
        if density >= 1.0 {
            exists.insert_range(0..total_u32);
        } else if density > 0.0 {
            let mut rng = StdRng::seed_from_u64(seed);
            for linear in 0..total_u32 {
                if rng.gen_bool(density) {
                    exists.push(linear);
                }
            }
        }

        Ok(Self {
            dims,
            exists,
            requested: ClaimTable::new(total),
        })
    }

    #[inline]
    pub fn exists(&self, coord: VoxelCoord) -> bool {
        self.dims
            .linear_index(coord)
            .map_or(false, |i| self.exists.contains(i as u32))
    }

    /// Claim an existing voxel for one in-flight response.
    ///
    /// Returns `false` if the voxel does not exist, lies outside the grid, or
    /// is already claimed by another request.
    pub fn try_claim(&self, coord: VoxelCoord) -> bool {
        match self.dims.linear_index(coord) {
            Some(i) if self.exists.contains(i as u32) => self.requested.try_claim(i),
            _ => false,
        }
    }

    pub fn release(&self, coord: VoxelCoord) {
        if let Some(i) = self.dims.linear_index(coord) {
            self.requested.release(i);
        }
    }

    pub fn is_claimed(&self, coord: VoxelCoord) -> bool {
        self.dims
            .linear_index(coord)
            .map_or(false, |i| self.requested.is_claimed(i))
    }

    pub fn neuron_count(&self) -> u64 {
        self.exists.len()
    }

    pub fn claimed_count(&self) -> usize {
        self.requested.claimed_count()
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }
}

/// Collects datasets before the oracle starts answering queries.
pub struct OracleBuilder {
    dims: GridDims,
    datasets: AHashMap<String, LoadedDataset>,
}

impl OracleBuilder {
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            datasets: AHashMap::new(),
        }
    }

    /// Register a dataset under `name`, replacing any earlier one.
    pub fn register(
        mut self,
        name: impl Into<String>,
        dataset: LoadedDataset,
    ) -> Result<Self, OracleError> {
        let name = name.into();
        if dataset.dims() != self.dims {
            return Err(OracleError::DimsMismatch {
                dataset: name,
                expected: self.dims,
                actual: dataset.dims(),
            });
        }
        self.datasets.insert(name, dataset);
        Ok(self)
    }

    pub fn initialize(self, seed: u64, density: f64) -> Result<NeuronPopulationOracle, OracleError> {
        let table = PopulationExistenceTable::sample(self.dims, seed, density)?;
        info!(
            seed,
            density,
            neurons = table.neuron_count(),
            voxels = self.dims.total_voxels(),
            datasets = self.datasets.len(),
            "Neuron population oracle initialized"
        );
        Ok(NeuronPopulationOracle {
            table,
            datasets: self.datasets,
            seed,
            density,
        })
    }
}

pub struct NeuronPopulationOracle {
    table: PopulationExistenceTable,
    datasets: AHashMap<String, LoadedDataset>,
    seed: u64,
    density: f64,
}

impl NeuronPopulationOracle {
    pub fn builder(dims: GridDims) -> OracleBuilder {
        OracleBuilder::new(dims)
    }

    #[inline]
    pub fn exists(&self, coord: VoxelCoord) -> bool {
        self.table.exists(coord)
    }

    /// Per-voxel value of a registered dataset.
    ///
    /// Categorical datasets report their area id as a float. Coordinates
    /// outside the grid yield `NaN`.
    pub fn sample_derived_values(&self, dataset: &str, coord: VoxelCoord) -> Result<f32, OracleError> {
        match self.datasets.get(dataset) {
            Some(LoadedDataset::Continuous(index)) => Ok(index.value_at(coord)),
            Some(LoadedDataset::Categorical(index)) => Ok(index
                .get(coord)
                .map_or(f32::NAN, |area| area as f32)),
            None => Err(OracleError::UnknownDataset(dataset.to_string())),
        }
    }

    pub fn has_dataset(&self, dataset: &str) -> bool {
        self.datasets.contains_key(dataset)
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.datasets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn table(&self) -> &PopulationExistenceTable {
        &self.table
    }

    pub fn dims(&self) -> GridDims {
        self.table.dims()
    }

    pub fn neuron_count(&self) -> u64 {
        self.table.neuron_count()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn density(&self) -> f64 {
        self.density
    }
}
