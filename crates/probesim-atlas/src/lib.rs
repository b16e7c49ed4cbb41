// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # probesim Atlas
//!
//! Volumetric brain-atlas data for the probe simulator:
//! - **Coordinates**: `VoxelCoord` / `GridDims`, scan order and neighborhoods
//! - **Sparse volumes**: presence bitmap + packed values decoded for O(1) lookup
//! - **Border field**: area boundaries precomputed from an annotation volume
//! - **Loader**: dataset files declared in the configuration
//!
//! Every structure here is immutable after construction and can be shared
//! across threads without synchronization.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod border;
pub mod coord;
pub mod error;
pub mod loader;
pub mod volume;

pub use border::BorderField;
pub use coord::{GridDims, VoxelCoord};
pub use error::{Result, VolumeError};
pub use loader::{load_all, load_dataset, LoadReport, LoadedDataset};
pub use volume::{SparseVolumeIndex, ValueWidth, VoxelValue};
