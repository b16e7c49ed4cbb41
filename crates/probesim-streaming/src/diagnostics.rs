// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator-visible counters for the streaming path.
//!
//! `outstanding_voxels` is the stale-request signal: it only shrinks when a
//! response arrives or the client is reset.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Client-side snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingDiagnostics {
    pub requests_sent: u64,
    /// Neighborhood requests that had nothing new to ask for
    pub requests_elided: u64,
    pub voxels_requested: u64,
    pub voxels_returned: u64,
    pub voxels_absent: u64,
    /// Voxels still flagged "requested" with no response yet
    pub outstanding_voxels: u64,
    /// Responses with an unknown request id or another client's id
    pub ignored_responses: u64,
}

/// Server-side snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDiagnostics {
    pub requests_handled: u64,
    pub voxels_dropped_absent: u64,
    pub voxels_dropped_claimed: u64,
    pub unknown_dataset_lookups: u64,
    pub undeliverable_responses: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ServerCounters {
    pub requests_handled: AtomicU64,
    pub voxels_dropped_absent: AtomicU64,
    pub voxels_dropped_claimed: AtomicU64,
    pub unknown_dataset_lookups: AtomicU64,
    pub undeliverable_responses: AtomicU64,
}

impl ServerCounters {
    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ServerDiagnostics {
        ServerDiagnostics {
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            voxels_dropped_absent: self.voxels_dropped_absent.load(Ordering::Relaxed),
            voxels_dropped_claimed: self.voxels_dropped_claimed.load(Ordering::Relaxed),
            unknown_dataset_lookups: self.unknown_dataset_lookups.load(Ordering::Relaxed),
            undeliverable_responses: self.undeliverable_responses.load(Ordering::Relaxed),
        }
    }
}
