// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ProbeSim Streaming
//!
//! On-demand population of neurons around a moving electrode tip.
//!
//! ```text
//! StreamingClient ──StreamingRequest──▶ StreamingServer ──exists?──▶ NeuronPopulationOracle
//!        ▲                                     │
//!        └────────StreamingResponse────────────┘  (unicast to the requesting client)
//! ```
//!
//! The oracle decides once, at startup, which voxels hold a neuron. Clients
//! never ask twice for the same voxel; the server never returns a voxel
//! that does not exist or that another in-flight request has claimed.

pub mod claims;
pub mod client;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod messages;
pub mod oracle;
pub mod server;
pub mod transport;

pub use client::{ApplyOutcome, ClientState, StreamingClient};
pub use diagnostics::{ServerDiagnostics, StreamingDiagnostics};
pub use error::{OracleError, StreamingError};
pub use factory::{GlmNeuronFactory, NeuronFactory, NeuronTemplate};
pub use messages::{ClientId, DerivedColumn, RequestId, StreamingRequest, StreamingResponse};
pub use oracle::{NeuronPopulationOracle, OracleBuilder, PopulationExistenceTable};
pub use server::StreamingServer;
pub use transport::{ClientLink, QueueWorker, StreamingHub};
