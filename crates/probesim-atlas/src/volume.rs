// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Sparse Volume Index
//!
//! Decodes a sparse volumetric dataset into a dense grid for O(1) lookup.
//!
//! ## Serialized layout
//!
//! ```text
//! presence bitmap : 1 byte per voxel (0 = absent), scan order ap -> dv -> lr (ap fastest)
//! value stream    : one packed code per present voxel, 1/2/4 bytes little-endian
//! remap table     : optional, code -> final value
//! ```
//!
//! The i-th present voxel in scan order takes the i-th code of the value stream.
//! Absent voxels hold [`VoxelValue::ABSENT`]; queries outside the grid return
//! [`VoxelValue::OUT_OF_DOMAIN`].

use ndarray::{Array3, ShapeBuilder};

use crate::coord::{GridDims, VoxelCoord};
use crate::error::{Result, VolumeError};

/// Value types that can be stored in a [`SparseVolumeIndex`].
pub trait VoxelValue: Copy + PartialEq + Send + Sync + 'static {
    /// Stored for voxels without a measurement.
    const ABSENT: Self;
    /// Returned for coordinates outside the grid. Never a decoded value.
    const OUT_OF_DOMAIN: Self;

    /// Conversion of a raw code when no remap table is given.
    fn from_code(code: u32) -> Self;
}

/// Categorical area ids.
impl VoxelValue for u32 {
    const ABSENT: Self = 0;
    const OUT_OF_DOMAIN: Self = u32::MAX;

    fn from_code(code: u32) -> Self {
        code
    }
}

/// Continuous parameters. Out-of-domain is NaN; test with `is_nan()`.
impl VoxelValue for f32 {
    const ABSENT: Self = 0.0;
    const OUT_OF_DOMAIN: Self = f32::NAN;

    fn from_code(code: u32) -> Self {
        code as f32
    }
}

/// Byte width of one packed code in the value stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    U8,
    U16,
    U32,
}

impl ValueWidth {
    pub fn from_bytes(width: u8) -> Result<Self> {
        match width {
            1 => Ok(ValueWidth::U8),
            2 => Ok(ValueWidth::U16),
            4 => Ok(ValueWidth::U32),
            other => Err(VolumeError::UnsupportedWidth(other)),
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            ValueWidth::U8 => 1,
            ValueWidth::U16 => 2,
            ValueWidth::U32 => 4,
        }
    }

    /// Split a little-endian stream into codes.
    pub fn decode(self, raw: &[u8]) -> Result<Vec<u32>> {
        let width = self.bytes();
        if raw.len() % width != 0 {
            return Err(VolumeError::ValueWidth {
                width: width as u8,
                len: raw.len(),
            });
        }
        let codes = match self {
            ValueWidth::U8 => raw.iter().map(|&b| b as u32).collect(),
            ValueWidth::U16 => raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32)
                .collect(),
            ValueWidth::U32 => raw
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };
        Ok(codes)
    }
}

/// Dense, read-only decoding of a sparse dataset.
#[derive(Debug, Clone)]
pub struct SparseVolumeIndex<T: VoxelValue> {
    dims: GridDims,
    values: Array3<T>,
    present_count: usize,
}

impl<T: VoxelValue> SparseVolumeIndex<T> {
    /// Decode a packed value stream.
    ///
    /// # Errors
    /// - `BitmapSize` if the bitmap does not cover the grid exactly
    /// - `ValueWidth` if the stream length is not a multiple of `width`
    /// - `FormatError` if the number of present voxels differs from the number of codes
    /// - `RemapOutOfRange` if a code has no remap entry
    pub fn load(
        dims: GridDims,
        presence: &[u8],
        raw_values: &[u8],
        width: ValueWidth,
        remap: Option<&[T]>,
    ) -> Result<Self> {
        let codes = width.decode(raw_values)?;
        Self::from_codes(dims, presence, &codes, remap)
    }

    /// Build from already-unpacked codes.
    pub fn from_codes(
        dims: GridDims,
        presence: &[u8],
        codes: &[u32],
        remap: Option<&[T]>,
    ) -> Result<Self> {
        let total = dims.total_voxels();
        if presence.len() != total {
            return Err(VolumeError::BitmapSize {
                expected: total,
                actual: presence.len(),
            });
        }

        let present_count = presence.iter().filter(|&&b| b != 0).count();
        if present_count != codes.len() {
            return Err(VolumeError::FormatError {
                expected: present_count,
                actual: codes.len(),
            });
        }

        let mut dense = Vec::with_capacity(total);
        let mut counter = 0usize;
        for &bit in presence {
            if bit == 0 {
                dense.push(T::ABSENT);
                continue;
            }
            let code = codes[counter];
            counter += 1;
            let value = match remap {
                Some(table) => *table.get(code as usize).ok_or(VolumeError::RemapOutOfRange {
                    code,
                    len: table.len(),
                })?,
                None => T::from_code(code),
            };
            dense.push(value);
        }

        // Scan order is ap-fastest, i.e. Fortran layout for shape (ap, dv, lr)
        let values = Array3::from_shape_vec(dims.shape().f(), dense).map_err(|_| {
            VolumeError::BitmapSize {
                expected: total,
                actual: presence.len(),
            }
        })?;

        Ok(Self {
            dims,
            values,
            present_count,
        })
    }

    /// Decoded value, `ABSENT` for unmeasured voxels, `OUT_OF_DOMAIN` outside the grid.
    #[inline]
    pub fn value_at(&self, coord: VoxelCoord) -> T {
        match self.dims.index_of(coord) {
            Some(idx) => self.values[idx],
            None => T::OUT_OF_DOMAIN,
        }
    }

    /// `None` outside the grid.
    #[inline]
    pub fn get(&self, coord: VoxelCoord) -> Option<T> {
        self.dims.index_of(coord).map(|idx| self.values[idx])
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Number of voxels that carried a value in the source bitmap
    pub fn present_count(&self) -> usize {
        self.present_count
    }

    pub(crate) fn values(&self) -> &Array3<T> {
        &self.values
    }
}

impl SparseVolumeIndex<u32> {
    /// Area id at `coord` for annotation datasets.
    pub fn area_at(&self, coord: VoxelCoord) -> u32 {
        self.value_at(coord)
    }
}
