// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # probesim Configuration System
//!
//! Type-safe configuration loader for the probe simulator with support for:
//! - TOML file parsing
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use probesim_config::{load_config, ProbesimConfig};
//!
//! // Load configuration with automatic file discovery and overrides
//! let config = load_config(None, None).expect("Failed to load config");
//!
//! println!("Grid: {:?}", config.volume.dims);
//! println!("Oracle density: {}", config.oracle.density);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError, MAX_STREAMING_RADIUS};

/// Re-export for convenience
pub use serde;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_types_compile() {
        let config = ProbesimConfig::default();
        assert_eq!(config.volume.dims, [528, 320, 456]);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = ProbesimConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: ProbesimConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.oracle.density, config.oracle.density);
        assert_eq!(parsed.spiking.spike_window_ticks, config.spiking.spike_window_ticks);
    }
}
