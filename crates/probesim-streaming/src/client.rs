// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Streaming Client
//!
//! Per-electrode request state. Every in-domain voxel is in at most one of
//! three local sets:
//!
//! - `requested`: sent, no response yet
//! - `present`: a neuron was spawned from a response (or bulk load)
//! - `absent`: a response arrived without it
//!
//! Voxels in any set are never requested again until [`StreamingClient::reset`].
//! A request whose response never arrives leaves its voxels in `requested`
//! for good; `outstanding_voxels` in the diagnostics exposes that leak.

use ahash::AHashMap;
use probesim_atlas::{GridDims, VoxelCoord};
use probesim_spiking::SpikingPopulation;
use roaring::RoaringBitmap;
use tracing::{debug, info, trace};

use crate::diagnostics::StreamingDiagnostics;
use crate::factory::NeuronFactory;
use crate::messages::{ClientId, RequestId, StreamingRequest, StreamingResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    AwaitingResponse,
}

/// What [`StreamingClient::apply_response`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        spawned: usize,
        /// Returned voxels that already had a neuron
        duplicates: usize,
        /// Batch voxels the server was silent about
        absent: usize,
    },
    /// Not addressed to this client, or for no pending request
    Ignored,
}

pub struct StreamingClient {
    id: ClientId,
    dims: GridDims,
    requested: RoaringBitmap,
    present: RoaringBitmap,
    absent: RoaringBitmap,
    pending: AHashMap<RequestId, Vec<u32>>,
    next_request: u64,
    diagnostics: StreamingDiagnostics,
}

impl StreamingClient {
    pub fn new(id: ClientId, dims: GridDims) -> Self {
        Self {
            id,
            dims,
            requested: RoaringBitmap::new(),
            present: RoaringBitmap::new(),
            absent: RoaringBitmap::new(),
            pending: AHashMap::new(),
            next_request: 0,
            diagnostics: StreamingDiagnostics::default(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn state(&self) -> ClientState {
        if self.pending.is_empty() {
            ClientState::Idle
        } else {
            ClientState::AwaitingResponse
        }
    }

    #[inline]
    fn key(&self, voxel: VoxelCoord) -> Option<u32> {
        self.dims.linear_index(voxel).and_then(|i| u32::try_from(i).ok())
    }

    fn is_known(&self, key: u32) -> bool {
        self.requested.contains(key) || self.present.contains(key) || self.absent.contains(key)
    }

    /// Build the request for everything new around `tip`.
    ///
    /// Returns `None` when every voxel in the neighborhood is already
    /// requested, present or known absent; no request should be sent then.
    pub fn request_neighborhood(&mut self, tip: VoxelCoord, radius: u32) -> Option<StreamingRequest> {
        let mut voxels = Vec::new();
        let mut keys = Vec::new();
        for voxel in self.dims.neighborhood(tip, radius) {
            let Some(key) = self.key(voxel) else { continue };
            if !self.is_known(key) {
                voxels.push(voxel);
                keys.push(key);
            }
        }

        if voxels.is_empty() {
            self.diagnostics.requests_elided += 1;
            trace!(client = %self.id, %tip, radius, "Neighborhood already covered, request elided");
            return None;
        }

        for &key in &keys {
            self.requested.insert(key);
        }
        let request_id = RequestId(self.next_request);
        self.next_request += 1;
        self.pending.insert(request_id, keys);

        self.diagnostics.requests_sent += 1;
        self.diagnostics.voxels_requested += voxels.len() as u64;
        debug!(
            client = %self.id,
            request = request_id.0,
            %tip,
            radius,
            voxels = voxels.len(),
            "Neighborhood request"
        );

        Some(StreamingRequest {
            client: self.id,
            request_id,
            voxels,
        })
    }

    /// Resolve the batch a response answers and spawn its neurons.
    ///
    /// Every voxel of the original batch leaves `requested`: returned ones
    /// become present, the rest absent.
    pub fn apply_response(
        &mut self,
        response: StreamingResponse,
        population: &mut SpikingPopulation,
        factory: &dyn NeuronFactory,
    ) -> ApplyOutcome {
        if response.client != self.id {
            self.diagnostics.ignored_responses += 1;
            debug!(client = %self.id, addressed = %response.client, "Response for another client ignored");
            return ApplyOutcome::Ignored;
        }
        let Some(batch) = self.pending.remove(&response.request_id) else {
            self.diagnostics.ignored_responses += 1;
            debug!(client = %self.id, request = response.request_id.0, "Response for unknown request ignored");
            return ApplyOutcome::Ignored;
        };
        let batch: RoaringBitmap = batch.into_iter().collect();

        let mut spawned = 0;
        let mut duplicates = 0;
        let mut returned = RoaringBitmap::new();
        for (i, &voxel) in response.voxels.iter().enumerate() {
            let Some(key) = self.key(voxel) else { continue };
            if !batch.contains(key) {
                debug!(client = %self.id, %voxel, "Voxel outside the request batch skipped");
                continue;
            }
            returned.insert(key);

            if population.contains_voxel(voxel) {
                duplicates += 1;
            } else {
                let template = factory.build(voxel, &response.derived_for(i));
                population.spawn(voxel, template.position, template.baseline_color, template.rate_source);
                spawned += 1;
            }
        }

        let missing = &batch - &returned;
        self.requested -= &batch;
        self.present |= &returned;
        self.absent |= &missing;

        let absent = missing.len() as usize;
        self.diagnostics.voxels_returned += returned.len();
        self.diagnostics.voxels_absent += missing.len();
        debug!(
            client = %self.id,
            request = response.request_id.0,
            spawned,
            duplicates,
            absent,
            "Response applied"
        );

        ApplyOutcome::Applied {
            spawned,
            duplicates,
            absent,
        }
    }

    /// Record a voxel populated outside of streaming.
    pub fn mark_present(&mut self, voxel: VoxelCoord) {
        if let Some(key) = self.key(voxel) {
            self.absent.remove(key);
            self.present.insert(key);
        }
    }

    /// Allow a voxel whose neuron was removed to be streamed again.
    pub fn forget(&mut self, voxel: VoxelCoord) {
        if let Some(key) = self.key(voxel) {
            self.present.remove(key);
            self.absent.remove(key);
        }
    }

    /// Drop all local voxel state, including stale requests.
    pub fn reset(&mut self) {
        let stale = self.requested.len();
        self.requested.clear();
        self.present.clear();
        self.absent.clear();
        self.pending.clear();
        info!(client = %self.id, stale_voxels = stale, "Streaming client reset");
    }

    pub fn is_requested(&self, voxel: VoxelCoord) -> bool {
        self.key(voxel).map_or(false, |k| self.requested.contains(k))
    }

    pub fn is_present(&self, voxel: VoxelCoord) -> bool {
        self.key(voxel).map_or(false, |k| self.present.contains(k))
    }

    pub fn is_absent(&self, voxel: VoxelCoord) -> bool {
        self.key(voxel).map_or(false, |k| self.absent.contains(k))
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn diagnostics(&self) -> StreamingDiagnostics {
        StreamingDiagnostics {
            outstanding_voxels: self.requested.len(),
            ..self.diagnostics
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::NeuronTemplate;
    use crate::messages::DerivedColumn;
    use probesim_spiking::{RateSource, SpikeVisuals};

    fn client() -> StreamingClient {
        StreamingClient::new(ClientId(1), GridDims::new(528, 320, 456))
    }

    fn flat(_: VoxelCoord, derived: &[f32]) -> NeuronTemplate {
        NeuronTemplate {
            position: [derived.first().copied().unwrap_or(0.0), 0.0, 0.0],
            baseline_color: [0.5; 4],
            rate_source: Some(RateSource::Flat(1.0)),
        }
    }

    fn respond(request: &StreamingRequest, keep: impl Fn(&VoxelCoord) -> bool) -> StreamingResponse {
        let voxels: Vec<VoxelCoord> = request.voxels.iter().copied().filter(|v| keep(v)).collect();
        StreamingResponse {
            client: request.client,
            request_id: request.request_id,
            derived: vec![DerivedColumn {
                dataset: "rf_x".into(),
                values: vec![7.0; voxels.len()],
            }],
            voxels,
        }
    }

    #[test]
    fn test_radius_one_requests_27_voxels() {
        let mut c = client();
        let request = c.request_neighborhood(VoxelCoord::new(10, 10, 10), 1).unwrap();
        assert_eq!(request.voxels.len(), 27);
        assert_eq!(c.state(), ClientState::AwaitingResponse);
        assert!(request.voxels.iter().all(|&v| c.is_requested(v)));
    }

    #[test]
    fn test_repeat_request_is_elided() {
        let mut c = client();
        let tip = VoxelCoord::new(10, 10, 10);
        assert!(c.request_neighborhood(tip, 1).is_some());
        assert!(c.request_neighborhood(tip, 1).is_none());

        let diag = c.diagnostics();
        assert_eq!(diag.requests_sent, 1);
        assert_eq!(diag.requests_elided, 1);
        assert_eq!(diag.outstanding_voxels, 27);
    }

    #[test]
    fn test_overlapping_neighborhood_only_asks_for_new_voxels() {
        let mut c = client();
        c.request_neighborhood(VoxelCoord::new(10, 10, 10), 1).unwrap();
        let next = c.request_neighborhood(VoxelCoord::new(11, 10, 10), 1).unwrap();
        assert_eq!(next.voxels.len(), 9);
        assert!(next.voxels.iter().all(|v| v.ap == 12));
        assert_eq!(c.pending_requests(), 2);
    }

    #[test]
    fn test_corner_neighborhood_is_clipped() {
        let mut c = client();
        let request = c.request_neighborhood(VoxelCoord::new(0, 0, 0), 1).unwrap();
        assert_eq!(request.voxels.len(), 8);
        assert!(c.request_neighborhood(VoxelCoord::new(-50, 0, 0), 1).is_none());
    }

    #[test]
    fn test_voxels_beyond_u32_index_space_are_never_tracked() {
        // 2^33 voxels: every lr = 1 voxel has a linear index above u32::MAX
        let mut c = StreamingClient::new(ClientId(1), GridDims::new(1 << 16, 1 << 16, 2));
        let low = VoxelCoord::new(5, 5, 0);
        let high = VoxelCoord::new(5, 5, 1);

        assert_eq!(c.request_neighborhood(low, 0).unwrap().voxels, vec![low]);
        // Would alias `low` if the index were truncated
        assert!(c.request_neighborhood(high, 0).is_none());
        assert!(c.is_requested(low));
        assert!(!c.is_requested(high));
        c.mark_present(high);
        assert!(!c.is_present(high));
    }

    #[test]
    fn test_tip_at_coordinate_limits_requests_nothing() {
        let mut c = client();
        assert!(c.request_neighborhood(VoxelCoord::new(i32::MAX, 10, 10), 1).is_none());
        assert!(c.request_neighborhood(VoxelCoord::new(10, i32::MIN, 10), 3).is_none());
        assert_eq!(c.diagnostics().requests_elided, 2);
        assert_eq!(c.state(), ClientState::Idle);
    }

    #[test]
    fn test_response_resolves_whole_batch() {
        let mut c = client();
        let mut pop = SpikingPopulation::new(SpikeVisuals::default(), 1);
        let request = c.request_neighborhood(VoxelCoord::new(10, 10, 10), 1).unwrap();
        let response = respond(&request, |v| v.lr == 10);

        let outcome = c.apply_response(response, &mut pop, &flat);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                spawned: 9,
                duplicates: 0,
                absent: 18
            }
        );
        assert_eq!(c.state(), ClientState::Idle);
        assert_eq!(pop.len(), 9);
        assert!(pop.records().iter().all(|r| r.position[0] == 7.0));

        assert!(c.is_present(VoxelCoord::new(10, 10, 10)));
        assert!(c.is_absent(VoxelCoord::new(10, 10, 9)));
        assert!(!c.is_requested(VoxelCoord::new(10, 10, 9)));

        let diag = c.diagnostics();
        assert_eq!(diag.voxels_returned, 9);
        assert_eq!(diag.voxels_absent, 18);
        assert_eq!(diag.outstanding_voxels, 0);

        // Absent voxels are not asked for again
        assert!(c.request_neighborhood(VoxelCoord::new(10, 10, 10), 1).is_none());
    }

    #[test]
    fn test_lost_response_leaks_until_reset() {
        let mut c = client();
        let tip = VoxelCoord::new(50, 50, 50);
        c.request_neighborhood(tip, 2).unwrap();

        // No response ever arrives: the neighborhood stays skipped
        for _ in 0..3 {
            assert!(c.request_neighborhood(tip, 2).is_none());
        }
        assert_eq!(c.state(), ClientState::AwaitingResponse);
        assert_eq!(c.diagnostics().outstanding_voxels, 125);

        c.reset();
        assert_eq!(c.state(), ClientState::Idle);
        assert_eq!(c.diagnostics().outstanding_voxels, 0);
        assert_eq!(c.request_neighborhood(tip, 2).unwrap().voxels.len(), 125);
    }

    #[test]
    fn test_foreign_and_unknown_responses_ignored() {
        let mut c = client();
        let mut pop = SpikingPopulation::new(SpikeVisuals::default(), 1);
        let request = c.request_neighborhood(VoxelCoord::new(5, 5, 5), 0).unwrap();

        let mut foreign = respond(&request, |_| true);
        foreign.client = ClientId(2);
        assert_eq!(c.apply_response(foreign, &mut pop, &flat), ApplyOutcome::Ignored);

        let mut unknown = respond(&request, |_| true);
        unknown.request_id = RequestId(999);
        assert_eq!(c.apply_response(unknown, &mut pop, &flat), ApplyOutcome::Ignored);

        assert!(pop.is_empty());
        assert_eq!(c.diagnostics().ignored_responses, 2);
        assert_eq!(c.state(), ClientState::AwaitingResponse);

        // Replaying the same response twice only applies once
        let response = respond(&request, |_| true);
        assert!(matches!(
            c.apply_response(response.clone(), &mut pop, &flat),
            ApplyOutcome::Applied { spawned: 1, .. }
        ));
        assert_eq!(c.apply_response(response, &mut pop, &flat), ApplyOutcome::Ignored);
        assert_eq!(pop.len(), 1);
    }

    #[test]
    fn test_voxels_outside_batch_are_not_spawned() {
        let mut c = client();
        let mut pop = SpikingPopulation::new(SpikeVisuals::default(), 1);
        let request = c.request_neighborhood(VoxelCoord::new(5, 5, 5), 0).unwrap();
        let mut response = respond(&request, |_| true);
        response.voxels.push(VoxelCoord::new(100, 100, 100));
        response.derived[0].values.push(0.0);

        c.apply_response(response, &mut pop, &flat);
        assert_eq!(pop.len(), 1);
        assert!(!pop.contains_voxel(VoxelCoord::new(100, 100, 100)));
    }

    #[test]
    fn test_bulk_loaded_voxel_is_not_requested() {
        let mut c = client();
        let mut pop = SpikingPopulation::new(SpikeVisuals::default(), 1);
        let v = VoxelCoord::new(5, 5, 5);
        c.mark_present(v);
        assert!(c.request_neighborhood(v, 0).is_none());

        c.forget(v);
        let request = c.request_neighborhood(v, 0).unwrap();
        pop.spawn(v, [0.0; 3], [1.0; 4], None);
        let outcome = c.apply_response(respond(&request, |_| true), &mut pop, &flat);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                spawned: 0,
                duplicates: 1,
                absent: 0
            }
        );
    }
}
