// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request/response payloads exchanged between a client and the server.

use probesim_atlas::VoxelCoord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of one client/electrode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Per-client request sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Distinct voxels a client wants populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingRequest {
    pub client: ClientId,
    pub request_id: RequestId,
    pub voxels: Vec<VoxelCoord>,
}

/// Values of one derived dataset, parallel to [`StreamingResponse::voxels`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub dataset: String,
    pub values: Vec<f32>,
}

/// The existing subset of a request, with derived per-voxel data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingResponse {
    pub client: ClientId,
    pub request_id: RequestId,
    pub voxels: Vec<VoxelCoord>,
    pub derived: Vec<DerivedColumn>,
}

impl StreamingResponse {
    /// Derived values of the `i`-th voxel, one per column.
    pub fn derived_for(&self, i: usize) -> Vec<f32> {
        self.derived
            .iter()
            .map(|column| column.values.get(i).copied().unwrap_or(f32::NAN))
            .collect()
    }
}
