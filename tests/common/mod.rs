// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use probesim::atlas::GridDims;
use probesim::config::ProbesimConfig;
use probesim::streaming::{NeuronPopulationOracle, OracleBuilder, StreamingServer};
use probesim::{ProbeRuntime, ProbeSession, SessionTick};

/// Config for a small grid with no datasets or derived values.
pub fn small_config(dims: [usize; 3]) -> ProbesimConfig {
    let mut config = ProbesimConfig::default();
    config.volume.dims = dims;
    config.oracle.derived_datasets.clear();
    config
}

pub fn oracle(dims: GridDims, seed: u64, density: f64) -> NeuronPopulationOracle {
    OracleBuilder::new(dims)
        .initialize(seed, density)
        .expect("oracle init")
}

pub fn server(dims: GridDims, seed: u64, density: f64) -> Arc<StreamingServer> {
    Arc::new(StreamingServer::new(Arc::new(oracle(dims, seed, density)), vec![]))
}

pub fn runtime(dims: [usize; 3], seed: u64, density: f64) -> ProbeRuntime {
    let config = small_config(dims);
    let oracle = oracle(GridDims::from(dims), seed, density);
    ProbeRuntime::with_oracle(config, oracle).expect("runtime")
}

/// Tick until a response has been applied, or fail after five seconds.
pub fn tick_until_applied(session: &mut ProbeSession) -> SessionTick {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let tick = session.tick();
        if tick.responses_applied > 0 {
            return tick;
        }
        assert!(Instant::now() < deadline, "no response within 5s");
        thread::sleep(Duration::from_millis(2));
    }
}
