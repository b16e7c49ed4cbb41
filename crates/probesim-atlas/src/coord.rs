// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Voxel addressing on the fixed atlas grid.
//!
//! Axis order is (ap, dv, lr) everywhere. Storage order of the source datasets is
//! column-major: `ap` varies fastest, then `dv`, then `lr`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer voxel coordinate. Components are signed so that neighborhoods around
/// a tip near the volume edge can be expressed before clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub ap: i32,
    pub dv: i32,
    pub lr: i32,
}

impl VoxelCoord {
    pub const fn new(ap: i32, dv: i32, lr: i32) -> Self {
        Self { ap, dv, lr }
    }

    /// Continuous position in millimetres relative to `origin` (voxel units).
    pub fn to_position(&self, origin: [f32; 3], voxel_size_um: f32) -> [f32; 3] {
        let scale = voxel_size_um / 1000.0;
        [
            (self.ap as f32 - origin[0]) * scale,
            (self.dv as f32 - origin[1]) * scale,
            (self.lr as f32 - origin[2]) * scale,
        ]
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.ap, self.dv, self.lr)
    }
}

impl From<(i32, i32, i32)> for VoxelCoord {
    fn from((ap, dv, lr): (i32, i32, i32)) -> Self {
        Self::new(ap, dv, lr)
    }
}

/// Grid dimensions D0 x D1 x D2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub ap: usize,
    pub dv: usize,
    pub lr: usize,
}

impl GridDims {
    pub const fn new(ap: usize, dv: usize, lr: usize) -> Self {
        Self { ap, dv, lr }
    }

    pub fn total_voxels(&self) -> usize {
        self.ap * self.dv * self.lr
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ap, self.dv, self.lr)
    }

    #[inline]
    pub fn contains(&self, coord: VoxelCoord) -> bool {
        coord.ap >= 0
            && coord.dv >= 0
            && coord.lr >= 0
            && (coord.ap as usize) < self.ap
            && (coord.dv as usize) < self.dv
            && (coord.lr as usize) < self.lr
    }

    /// Array index `[ap, dv, lr]` for an in-domain coordinate.
    #[inline]
    pub fn index_of(&self, coord: VoxelCoord) -> Option<[usize; 3]> {
        self.contains(coord)
            .then(|| [coord.ap as usize, coord.dv as usize, coord.lr as usize])
    }

    /// Position of `coord` in storage (scan) order.
    #[inline]
    pub fn linear_index(&self, coord: VoxelCoord) -> Option<usize> {
        self.index_of(coord)
            .map(|[a, d, l]| a + self.ap * (d + self.dv * l))
    }

    /// Inverse of [`GridDims::linear_index`].
    pub fn coord_of(&self, linear: usize) -> Option<VoxelCoord> {
        if linear >= self.total_voxels() {
            return None;
        }
        let a = linear % self.ap;
        let rest = linear / self.ap;
        let d = rest % self.dv;
        let l = rest / self.dv;
        Some(VoxelCoord::new(a as i32, d as i32, l as i32))
    }

    /// All in-domain voxels within Chebyshev distance `radius` of `center`,
    /// in deterministic (ap, dv, lr) nesting order.
    pub fn neighborhood(&self, center: VoxelCoord, radius: u32) -> Vec<VoxelCoord> {
        // Widened so tips far outside the grid and huge radii cannot overflow
        let r = i64::from(radius);
        let clip = |c: i32, len: usize| -> Option<(i32, i32)> {
            let lo = (i64::from(c) - r).max(0);
            let hi = (i64::from(c) + r).min(len as i64 - 1);
            if lo > hi {
                return None;
            }
            Some((i32::try_from(lo).ok()?, i32::try_from(hi).ok()?))
        };
        let (Some((a0, a1)), Some((d0, d1)), Some((l0, l1))) = (
            clip(center.ap, self.ap),
            clip(center.dv, self.dv),
            clip(center.lr, self.lr),
        ) else {
            return Vec::new();
        };

        let span = |lo: i32, hi: i32| (hi - lo) as usize + 1;
        let mut out = Vec::with_capacity(span(a0, a1) * span(d0, d1) * span(l0, l1));
        for ap in a0..=a1 {
            for dv in d0..=d1 {
                for lr in l0..=l1 {
                    out.push(VoxelCoord::new(ap, dv, lr));
                }
            }
        }
        out
    }
}

impl From<[usize; 3]> for GridDims {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }
}
