// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # probesim-observability
//!
//! Logging setup shared by every probesim crate, with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log file with daily rotation next to the console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known probesim crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "probesim",
    "probesim-config",
    "probesim-atlas",
    "probesim-spiking",
    "probesim-streaming",
];
