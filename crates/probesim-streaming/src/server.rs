// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Streaming Server
//!
//! Validates requests against the oracle and delivers each response to the
//! requesting client only.
//!
//! ```text
//! for voxel in request:
//!     exists?  no  -> drop (sparse population, not an error)
//!     claim?   no  -> drop (in flight for another request)
//!     yes            -> include with derived values
//! route to request.client   (unicast, never broadcast)
//! release claims
//! ```

use ahash::{AHashMap, AHashSet};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use probesim_atlas::VoxelCoord;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::diagnostics::{ServerCounters, ServerDiagnostics};
use crate::error::StreamingError;
use crate::messages::{ClientId, DerivedColumn, StreamingRequest, StreamingResponse};
use crate::oracle::NeuronPopulationOracle;

pub struct StreamingServer {
    oracle: Arc<NeuronPopulationOracle>,
    derived_datasets: Vec<String>,
    routes: RwLock<AHashMap<ClientId, Sender<StreamingResponse>>>,
    counters: ServerCounters,
    warned_datasets: Mutex<AHashSet<String>>,
}

impl StreamingServer {
    /// `derived_datasets` are attached to every response, in this order.
    pub fn new(oracle: Arc<NeuronPopulationOracle>, derived_datasets: Vec<String>) -> Self {
        Self {
            oracle,
            derived_datasets,
            routes: RwLock::new(AHashMap::new()),
            counters: ServerCounters::default(),
            warned_datasets: Mutex::new(AHashSet::new()),
        }
    }

    /// Open a response route for `client`, replacing any previous one.
    pub fn connect(&self, client: ClientId, capacity: usize) -> Receiver<StreamingResponse> {
        let (tx, rx) = bounded(capacity);
        if self.routes.write().insert(client, tx).is_some() {
            info!(%client, "Client reconnected, previous route dropped");
        } else {
            info!(%client, "Client connected");
        }
        rx
    }

    pub fn disconnect(&self, client: ClientId) -> bool {
        let removed = self.routes.write().remove(&client).is_some();
        if removed {
            info!(%client, "Client disconnected");
        }
        removed
    }

    pub fn is_connected(&self, client: ClientId) -> bool {
        self.routes.read().contains_key(&client)
    }

    pub fn client_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Build the response for `request`, claiming every voxel it includes.
    ///
    /// The claims stay held until [`StreamingServer::release_claims`].
    pub fn build_response(&self, request: &StreamingRequest) -> StreamingResponse {
        let table = self.oracle.table();
        let mut voxels = Vec::with_capacity(request.voxels.len());
        let mut dropped_absent = 0u64;
        let mut dropped_claimed = 0u64;

        for &voxel in &request.voxels {
            if !table.exists(voxel) {
                dropped_absent += 1;
            } else if table.try_claim(voxel) {
                voxels.push(voxel);
            } else {
                dropped_claimed += 1;
            }
        }

        let derived = self
            .derived_datasets
            .iter()
            .map(|dataset| DerivedColumn {
                dataset: dataset.clone(),
                values: self.derived_column(dataset, &voxels),
            })
            .collect();

        ServerCounters::add(&self.counters.voxels_dropped_absent, dropped_absent);
        ServerCounters::add(&self.counters.voxels_dropped_claimed, dropped_claimed);

        StreamingResponse {
            client: request.client,
            request_id: request.request_id,
            voxels,
            derived,
        }
    }

    fn derived_column(&self, dataset: &str, voxels: &[VoxelCoord]) -> Vec<f32> {
        if !self.oracle.has_dataset(dataset) {
            ServerCounters::add(&self.counters.unknown_dataset_lookups, 1);
            if self.warned_datasets.lock().insert(dataset.to_string()) {
                warn!(dataset, "Unknown derived dataset, streaming NaN values");
            }
            return vec![f32::NAN; voxels.len()];
        }
        voxels
            .iter()
            .map(|&v| self.oracle.sample_derived_values(dataset, v).unwrap_or(f32::NAN))
            .collect()
    }

    pub fn release_claims(&self, response: &StreamingResponse) {
        let table = self.oracle.table();
        for &voxel in &response.voxels {
            table.release(voxel);
        }
    }

    /// Validate, answer and route one request.
    ///
    /// Returns the number of voxels delivered. Nothing is claimed for a
    /// client without a route.
    pub fn handle_request(&self, request: StreamingRequest) -> Result<usize, StreamingError> {
        let route = self
            .routes
            .read()
            .get(&request.client)
            .cloned()
            .ok_or(StreamingError::UnknownClient(request.client))?;

        let response = self.build_response(&request);
        ServerCounters::add(&self.counters.requests_handled, 1);
        let delivered = response.voxels.len();
        debug!(
            client = %request.client,
            request = request.request_id.0,
            requested = request.voxels.len(),
            delivered,
            "Request handled"
        );

        let claimed = response.voxels.clone();
        let result = match route.try_send(response) {
            Ok(()) => Ok(delivered),
            Err(TrySendError::Full(_)) => Err(StreamingError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(StreamingError::Disconnected),
        };
        if result.is_err() {
            ServerCounters::add(&self.counters.undeliverable_responses, 1);
        }

        let table = self.oracle.table();
        for voxel in claimed {
            table.release(voxel);
        }
        result
    }

    pub fn oracle(&self) -> &Arc<NeuronPopulationOracle> {
        &self.oracle
    }

    pub fn derived_datasets(&self) -> &[String] {
        &self.derived_datasets
    }

    pub fn diagnostics(&self) -> ServerDiagnostics {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RequestId;
    use crate::oracle::OracleBuilder;
    use probesim_atlas::{GridDims, LoadedDataset, SparseVolumeIndex, VoxelCoord};

    fn server(density: f64, derived: &[&str]) -> StreamingServer {
        let dims = GridDims::new(16, 16, 16);
        let presence = vec![1u8; dims.total_voxels()];
        let codes = vec![0u32; dims.total_voxels()];
        let rf_x = SparseVolumeIndex::from_codes(dims, &presence, &codes, Some(&[3.5f32][..])).unwrap();
        let oracle = OracleBuilder::new(dims)
            .register("rf_x", LoadedDataset::Continuous(rf_x))
            .unwrap()
            .initialize(42, density)
            .unwrap();
        StreamingServer::new(
            Arc::new(oracle),
            derived.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn request(client: u32, id: u64, voxels: Vec<VoxelCoord>) -> StreamingRequest {
        StreamingRequest {
            client: ClientId(client),
            request_id: RequestId(id),
            voxels,
        }
    }

    #[test]
    fn test_response_is_existent_subset() {
        let server = server(0.3, &["rf_x"]);
        let dims = server.oracle().dims();
        let voxels = dims.neighborhood(VoxelCoord::new(8, 8, 8), 2);
        let rx = server.connect(ClientId(1), 4);

        server.handle_request(request(1, 0, voxels.clone())).unwrap();
        let response = rx.try_recv().unwrap();

        let expected: Vec<VoxelCoord> = voxels
            .iter()
            .copied()
            .filter(|&v| server.oracle().exists(v))
            .collect();
        assert!(!expected.is_empty() && expected.len() < voxels.len());
        assert_eq!(response.voxels, expected);
        assert_eq!(response.derived.len(), 1);
        assert_eq!(response.derived[0].values, vec![3.5; expected.len()]);

        let diag = server.diagnostics();
        assert_eq!(diag.requests_handled, 1);
        assert_eq!(diag.voxels_dropped_absent as usize, voxels.len() - expected.len());
        assert_eq!(server.oracle().table().claimed_count(), 0);
    }

    #[test]
    fn test_unicast_only_reaches_requester() {
        let server = server(1.0, &[]);
        let rx_a = server.connect(ClientId(1), 4);
        let rx_b = server.connect(ClientId(2), 4);

        server
            .handle_request(request(2, 7, vec![VoxelCoord::new(0, 0, 0)]))
            .unwrap();

        assert!(rx_a.try_recv().is_err());
        let response = rx_b.try_recv().unwrap();
        assert_eq!(response.client, ClientId(2));
        assert_eq!(response.request_id, RequestId(7));
    }

    #[test]
    fn test_unknown_client_claims_nothing() {
        let server = server(1.0, &[]);
        let err = server
            .handle_request(request(9, 0, vec![VoxelCoord::new(1, 1, 1)]))
            .unwrap_err();
        assert!(matches!(err, StreamingError::UnknownClient(ClientId(9))));
        assert_eq!(server.diagnostics().requests_handled, 0);
        assert!(!server.oracle().table().is_claimed(VoxelCoord::new(1, 1, 1)));
    }

    #[test]
    fn test_in_flight_claim_blocks_second_request() {
        let server = server(1.0, &[]);
        let v = VoxelCoord::new(3, 3, 3);

        let first = server.build_response(&request(1, 0, vec![v]));
        let second = server.build_response(&request(2, 0, vec![v]));
        assert_eq!(first.voxels, vec![v]);
        assert!(second.voxels.is_empty());
        assert_eq!(server.diagnostics().voxels_dropped_claimed, 1);

        server.release_claims(&first);
        let third = server.build_response(&request(2, 1, vec![v]));
        assert_eq!(third.voxels, vec![v]);
    }

    #[test]
    fn test_unknown_derived_dataset_yields_nan() {
        let server = server(1.0, &["rf_x", "rf_y"]);
        let rx = server.connect(ClientId(1), 4);
        for id in 0..3 {
            server
                .handle_request(request(1, id, vec![VoxelCoord::new(id as i32, 0, 0)]))
                .unwrap();
        }
        let response = rx.try_recv().unwrap();
        assert_eq!(response.derived[0].values, vec![3.5]);
        assert_eq!(response.derived[1].dataset, "rf_y");
        assert!(response.derived[1].values[0].is_nan());
        assert_eq!(server.diagnostics().unknown_dataset_lookups, 3);
    }

    #[test]
    fn test_full_outbox_releases_claims() {
        let server = server(1.0, &[]);
        let _rx = server.connect(ClientId(1), 1);
        server
            .handle_request(request(1, 0, vec![VoxelCoord::new(0, 0, 0)]))
            .unwrap();
        let err = server
            .handle_request(request(1, 1, vec![VoxelCoord::new(1, 0, 0)]))
            .unwrap_err();
        assert!(matches!(err, StreamingError::QueueFull));
        assert_eq!(server.diagnostics().undeliverable_responses, 1);
        assert_eq!(server.oracle().table().claimed_count(), 0);
    }

    #[test]
    fn test_disconnect_removes_route() {
        let server = server(1.0, &[]);
        let rx = server.connect(ClientId(1), 1);
        assert!(server.disconnect(ClientId(1)));
        assert!(!server.disconnect(ClientId(1)));
        assert!(!server.is_connected(ClientId(1)));
        assert!(rx.try_recv().is_err());
        assert_eq!(server.client_count(), 0);
    }
}
