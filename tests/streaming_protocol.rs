// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the neighborhood streaming protocol
//!
//! Client and server are exercised together, both directly and through the
//! in-process transport thread.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use probesim::atlas::{GridDims, VoxelCoord};
use probesim::spiking::{SpikeVisuals, SpikingPopulation};
use probesim::streaming::{
    ApplyOutcome, ClientId, ClientState, GlmNeuronFactory, RequestId, StreamingClient, StreamingHub,
    StreamingRequest,
};

fn factory() -> GlmNeuronFactory {
    GlmNeuronFactory {
        origin: [0.0; 3],
        voxel_size_um: 25.0,
        baseline_color: [0.5, 0.5, 0.5, 1.0],
        weights: Default::default(),
    }
}

// ============================================================================
// Neighborhood requests
// ============================================================================

#[test]
fn test_full_density_radius_one_returns_27_voxels() {
    let dims = GridDims::new(528, 320, 456);
    let server = common::server(dims, 42, 1.0);
    let rx = server.connect(ClientId(1), 8);
    let mut client = StreamingClient::new(ClientId(1), dims);

    let request = client
        .request_neighborhood(VoxelCoord::new(10, 10, 10), 1)
        .expect("fresh neighborhood must produce a request");
    assert_eq!(request.voxels.len(), 27);

    assert_eq!(server.handle_request(request).unwrap(), 27);
    let response = rx.try_recv().unwrap();
    assert_eq!(response.voxels.len(), 27);
}

#[test]
fn test_repeated_request_without_response_is_elided() {
    let dims = GridDims::new(528, 320, 456);
    let mut client = StreamingClient::new(ClientId(1), dims);
    let tip = VoxelCoord::new(10, 10, 10);

    assert!(client.request_neighborhood(tip, 1).is_some());
    assert!(client.request_neighborhood(tip, 1).is_none());
    assert_eq!(client.diagnostics().requests_sent, 1);
    assert_eq!(client.diagnostics().requests_elided, 1);
}

// ============================================================================
// Existence gating
// ============================================================================

#[test]
fn test_response_contains_exactly_the_existing_voxels() {
    let dims = GridDims::new(32, 32, 32);
    let server = common::server(dims, 1234, 0.25);
    let hub = StreamingHub::start(Arc::clone(&server), 8, 8).unwrap();
    let link = hub.connect(ClientId(5));

    let mut client = StreamingClient::new(ClientId(5), dims);
    let mut population = SpikingPopulation::new(SpikeVisuals::default(), 1);

    let request = client.request_neighborhood(VoxelCoord::new(16, 16, 16), 3).unwrap();
    let requested = request.voxels.clone();
    link.send(request).unwrap();
    let response = link.recv_timeout(Duration::from_secs(5)).unwrap();

    let existing: Vec<VoxelCoord> = requested
        .iter()
        .copied()
        .filter(|&v| server.oracle().exists(v))
        .collect();
    assert!(!existing.is_empty(), "seeded oracle should place some neurons");
    assert!(existing.len() < requested.len(), "seeded oracle should leave gaps");
    assert_eq!(response.voxels, existing);

    let outcome = client.apply_response(response, &mut population, &factory());
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            spawned: existing.len(),
            duplicates: 0,
            absent: requested.len() - existing.len(),
        }
    );
    assert_eq!(client.state(), ClientState::Idle);
    for v in requested {
        assert_eq!(population.contains_voxel(v), server.oracle().exists(v));
        assert!(!client.is_requested(v));
    }
}

// ============================================================================
// Lost responses
// ============================================================================

#[test]
fn test_lost_response_keeps_neighborhood_skipped_until_reset() {
    let dims = GridDims::new(32, 32, 32);
    let server = common::server(dims, 9, 1.0);
    let hub = StreamingHub::start(Arc::clone(&server), 8, 8).unwrap();
    let link = hub.connect(ClientId(2));
    let mut client = StreamingClient::new(ClientId(2), dims);
    let tip = VoxelCoord::new(8, 8, 8);

    // The route disappears before the server answers
    assert!(hub.disconnect(ClientId(2)));
    let request = client.request_neighborhood(tip, 1).unwrap();
    link.send(request).unwrap();
    assert!(link.recv_timeout(Duration::from_millis(200)).is_err());

    assert_eq!(client.state(), ClientState::AwaitingResponse);
    assert_eq!(client.diagnostics().outstanding_voxels, 27);
    assert!(client.request_neighborhood(tip, 1).is_none());
    assert!(client.request_neighborhood(tip, 1).is_none());
    assert_eq!(client.diagnostics().requests_elided, 2);

    client.reset();
    assert_eq!(client.diagnostics().outstanding_voxels, 0);
    assert_eq!(client.request_neighborhood(tip, 1).unwrap().voxels.len(), 27);
}

// ============================================================================
// Multiple clients
// ============================================================================

#[test]
fn test_responses_are_unicast() {
    let dims = GridDims::new(32, 32, 32);
    let server = common::server(dims, 3, 1.0);
    let hub = StreamingHub::start(Arc::clone(&server), 8, 8).unwrap();
    let link_a = hub.connect(ClientId(1));
    let link_b = hub.connect(ClientId(2));

    let mut client_a = StreamingClient::new(ClientId(1), dims);
    link_a
        .send(client_a.request_neighborhood(VoxelCoord::new(4, 4, 4), 1).unwrap())
        .unwrap();

    let response = link_a.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(response.client, ClientId(1));
    assert!(link_b.recv_timeout(Duration::from_millis(100)).is_err());
    assert!(link_b.drain().is_empty());
}

#[test]
fn test_concurrent_sessions_never_share_a_claim() {
    let dims = GridDims::new(16, 16, 16);
    let server = common::server(dims, 11, 1.0);
    let voxels = dims.neighborhood(VoxelCoord::new(8, 8, 8), 3);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (1..=2u32)
        .map(|client| {
            let server = Arc::clone(&server);
            let barrier = Arc::clone(&barrier);
            let mut voxels = voxels.clone();
            if client == 2 {
                voxels.reverse();
            }
            thread::spawn(move || {
                barrier.wait();
                server.build_response(&StreamingRequest {
                    client: ClientId(client),
                    request_id: RequestId(0),
                    voxels,
                })
            })
        })
        .collect();
    let responses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let a: HashSet<VoxelCoord> = responses[0].voxels.iter().copied().collect();
    let b: HashSet<VoxelCoord> = responses[1].voxels.iter().copied().collect();
    assert!(a.is_disjoint(&b));
    assert_eq!(a.len() + b.len(), voxels.len());
    assert_eq!(server.diagnostics().voxels_dropped_claimed as usize, voxels.len());

    for response in &responses {
        server.release_claims(response);
    }
    assert_eq!(server.oracle().table().claimed_count(), 0);
}
