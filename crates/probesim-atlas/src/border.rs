// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Area boundary field derived from a categorical volume.
//!
//! A voxel is on a border when its value differs from the next voxel along dv
//! or along lr. Voxels on the last dv row or last lr column have no forward
//! neighbor and are never flagged.

use ndarray::{Array3, Zip};

use crate::coord::{GridDims, VoxelCoord};
use crate::volume::{SparseVolumeIndex, VoxelValue};

#[derive(Debug, Clone)]
pub struct BorderField {
    dims: GridDims,
    border: Array3<bool>,
}

impl BorderField {
    pub fn compute<T: VoxelValue>(index: &SparseVolumeIndex<T>) -> Self {
        let dims = index.dims();
        let values = index.values();
        let mut border = Array3::from_elem(dims.shape(), false);

        Zip::indexed(&mut border).par_for_each(|(a, d, l), flag| {
            if d + 1 >= dims.dv || l + 1 >= dims.lr {
                return;
            }
            let v = values[[a, d, l]];
            *flag = v != values[[a, d + 1, l]] || v != values[[a, d, l + 1]];
        });

        Self { dims, border }
    }

    /// `false` outside the grid.
    #[inline]
    pub fn is_border(&self, coord: VoxelCoord) -> bool {
        self.dims
            .index_of(coord)
            .map_or(false, |idx| self.border[idx])
    }

    /// Number of border voxels.
    pub fn count(&self) -> usize {
        self.border.iter().filter(|&&b| b).count()
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }
}
