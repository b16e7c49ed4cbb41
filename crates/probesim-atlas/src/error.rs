// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Failures while decoding a sparse volume. Each one aborts only the dataset
/// being loaded.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("presence bitmap marks {expected} voxels but the value stream holds {actual}")]
    FormatError { expected: usize, actual: usize },

    #[error("presence bitmap has {actual} entries, grid needs {expected}")]
    BitmapSize { expected: usize, actual: usize },

    #[error("value stream of {len} bytes is not a multiple of the {width}-byte value width")]
    ValueWidth { width: u8, len: usize },

    #[error("unsupported value width: {0} (expected 1, 2 or 4)")]
    UnsupportedWidth(u8),

    #[error("stored code {code} has no entry in a remap table of length {len}")]
    RemapOutOfRange { code: u32, len: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VolumeError>;
