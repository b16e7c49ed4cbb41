// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dataset files on disk.
//!
//! Each declared dataset is loaded on its own; a broken dataset is reported and
//! skipped while the others stay usable.

use std::fs;
use std::path::{Path, PathBuf};

use probesim_config::{DatasetConfig, DatasetKind, RemapKind};
use tracing::{error, info};

use crate::coord::GridDims;
use crate::error::{Result, VolumeError};
use crate::volume::{SparseVolumeIndex, ValueWidth};

/// A decoded dataset of either flavor.
#[derive(Debug, Clone)]
pub enum LoadedDataset {
    Categorical(SparseVolumeIndex<u32>),
    Continuous(SparseVolumeIndex<f32>),
}

impl LoadedDataset {
    pub fn present_count(&self) -> usize {
        match self {
            LoadedDataset::Categorical(index) => index.present_count(),
            LoadedDataset::Continuous(index) => index.present_count(),
        }
    }

    pub fn dims(&self) -> GridDims {
        match self {
            LoadedDataset::Categorical(index) => index.dims(),
            LoadedDataset::Continuous(index) => index.dims(),
        }
    }
}

/// Outcome of [`load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<(String, LoadedDataset)>,
    pub failed: Vec<(String, VolumeError)>,
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| VolumeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_u32_table(path: &Path) -> Result<Vec<u32>> {
    ValueWidth::U32.decode(&read(path)?)
}

fn read_f32_table(path: &Path) -> Result<Vec<f32>> {
    Ok(read_u32_table(path)?.into_iter().map(f32::from_bits).collect())
}

fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

/// Load one dataset described by `entry`, with paths relative to `data_dir`.
pub fn load_dataset(entry: &DatasetConfig, data_dir: &Path, dims: GridDims) -> Result<LoadedDataset> {
    let width = ValueWidth::from_bytes(entry.value_width)?;
    let presence = read(&resolve(data_dir, &entry.bitmap))?;
    let raw = read(&resolve(data_dir, &entry.values))?;
    let remap_path = entry.remap.as_ref().map(|p| resolve(data_dir, p));

    let dataset = match entry.kind {
        DatasetKind::Categorical => {
            let remap = match (&remap_path, entry.remap_kind) {
                (Some(path), RemapKind::U32) => Some(read_u32_table(path)?),
                // Float tables on an id dataset are truncated to ids
                (Some(path), RemapKind::F32) => {
                    Some(read_f32_table(path)?.into_iter().map(|v| v as u32).collect())
                }
                (None, _) => None,
            };
            LoadedDataset::Categorical(SparseVolumeIndex::load(
                dims,
                &presence,
                &raw,
                width,
                remap.as_deref(),
            )?)
        }
        DatasetKind::Continuous => {
            let remap = match (&remap_path, entry.remap_kind) {
                (Some(path), RemapKind::F32) => Some(read_f32_table(path)?),
                (Some(path), RemapKind::U32) => {
                    Some(read_u32_table(path)?.into_iter().map(|v| v as f32).collect())
                }
                (None, _) => None,
            };
            LoadedDataset::Continuous(SparseVolumeIndex::load(
                dims,
                &presence,
                &raw,
                width,
                remap.as_deref(),
            )?)
        }
    };

    Ok(dataset)
}

/// Load every dataset independently.
pub fn load_all(entries: &[DatasetConfig], data_dir: &Path, dims: GridDims) -> LoadReport {
    let mut report = LoadReport::default();
    for entry in entries {
        match load_dataset(entry, data_dir, dims) {
            Ok(dataset) => {
                info!(
                    dataset = %entry.name,
                    present_voxels = dataset.present_count(),
                    total_voxels = dims.total_voxels(),
                    "Loaded dataset"
                );
                report.loaded.push((entry.name.clone(), dataset));
            }
            Err(e) => {
                error!(dataset = %entry.name, error = %e, "Dataset load failed, skipping");
                report.failed.push((entry.name.clone(), e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::VoxelCoord;
    use tempfile::tempdir;

    fn entry(name: &str, kind: DatasetKind, width: u8, remap: Option<&str>, remap_kind: RemapKind) -> DatasetConfig {
        DatasetConfig {
            name: name.to_string(),
            kind,
            bitmap: PathBuf::from(format!("{}_bitmap.bin", name)),
            values: PathBuf::from(format!("{}_values.bin", name)),
            value_width: width,
            remap: remap.map(PathBuf::from),
            remap_kind,
        }
    }

    #[test]
    fn test_load_continuous_with_float_remap() {
        let dir = tempdir().unwrap();
        let dims = GridDims::new(2, 2, 1);
        fs::write(dir.path().join("rf_x_bitmap.bin"), [1u8, 0, 0, 1]).unwrap();
        fs::write(dir.path().join("rf_x_values.bin"), [1u8, 0]).unwrap();
        let table: Vec<u8> = [-10.0f32, 12.5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(dir.path().join("rf_x_remap.bin"), table).unwrap();

        let dataset = load_dataset(
            &entry("rf_x", DatasetKind::Continuous, 1, Some("rf_x_remap.bin"), RemapKind::F32),
            dir.path(),
            dims,
        )
        .unwrap();

        let LoadedDataset::Continuous(index) = dataset else {
            panic!("expected continuous dataset");
        };
        assert_eq!(index.value_at(VoxelCoord::new(0, 0, 0)), 12.5);
        assert_eq!(index.value_at(VoxelCoord::new(1, 1, 0)), -10.0);
        assert_eq!(index.value_at(VoxelCoord::new(1, 0, 0)), 0.0);
    }

    #[test]
    fn test_broken_dataset_does_not_block_others() {
        let dir = tempdir().unwrap();
        let dims = GridDims::new(2, 1, 1);
        fs::write(dir.path().join("good_bitmap.bin"), [1u8, 1]).unwrap();
        fs::write(dir.path().join("good_values.bin"), 700u32.to_le_bytes().repeat(2)).unwrap();
        fs::write(dir.path().join("bad_bitmap.bin"), [1u8, 1]).unwrap();
        fs::write(dir.path().join("bad_values.bin"), [3u8]).unwrap();

        let report = load_all(
            &[
                entry("bad", DatasetKind::Categorical, 1, None, RemapKind::U32),
                entry("missing", DatasetKind::Categorical, 1, None, RemapKind::U32),
                entry("good", DatasetKind::Categorical, 4, None, RemapKind::U32),
            ],
            dir.path(),
            dims,
        );

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].0, "good");
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, VolumeError::FormatError { expected: 2, actual: 1 }));
        assert!(matches!(report.failed[1].1, VolumeError::Io { .. }));

        let LoadedDataset::Categorical(index) = &report.loaded[0].1 else {
            panic!("expected categorical dataset");
        };
        assert_eq!(index.area_at(VoxelCoord::new(1, 0, 0)), 700);
    }
}
