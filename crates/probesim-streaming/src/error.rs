// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use probesim_atlas::GridDims;

use crate::messages::ClientId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("no dataset registered under '{0}'")]
    UnknownDataset(String),

    #[error("neuron density must be within [0, 1], got {0}")]
    InvalidDensity(f64),

    #[error("dataset '{dataset}' has dims {actual:?}, oracle grid is {expected:?}")]
    DimsMismatch {
        dataset: String,
        expected: GridDims,
        actual: GridDims,
    },

    #[error("grid of {0} voxels exceeds the u32 voxel index space")]
    GridTooLarge(usize),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamingError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("queue full, message dropped")]
    QueueFull,

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("no route for client {0}")]
    UnknownClient(ClientId),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}
