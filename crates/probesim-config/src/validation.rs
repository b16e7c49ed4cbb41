// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges and consistent with
//! each other. All violations are collected and reported together.

use crate::{ConfigError, ConfigResult, ProbesimConfig};
use std::collections::HashSet;

/// Largest streaming radius; a request covers at most (2r+1)^3 voxels
pub const MAX_STREAMING_RADIUS: u32 = 64;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    DuplicateDataset { name: String },
    UnknownDerivedDataset { name: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::DuplicateDataset { name } => {
                write!(f, "Dataset '{}' is declared more than once", name)
            }
            Self::UnknownDerivedDataset { name } => {
                write!(f, "oracle.derived_datasets references undeclared dataset '{}'", name)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &ProbesimConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_volume(config, &mut errors);
    validate_value_ranges(config, &mut errors);
    validate_datasets(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_volume(config: &ProbesimConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.volume.dims.iter().any(|&d| d == 0) {
        errors.push(invalid("volume.dims", "every dimension must be non-zero"));
    }
    // Linear voxel indices are stored as u32
    let total = config.volume.dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d as u64));
    if total.map_or(true, |t| t > u32::MAX as u64) {
        errors.push(invalid("volume.dims", "total voxel count must fit in u32"));
    }
    if config.volume.voxel_size_um <= 0.0 {
        errors.push(invalid("volume.voxel_size_um", "must be positive"));
    }
}

fn validate_value_ranges(config: &ProbesimConfig, errors: &mut Vec<ConfigValidationError>) {
    if !(0.0..=1.0).contains(&config.oracle.density) {
        errors.push(invalid("oracle.density", "must be between 0.0 and 1.0"));
    }

    let spiking = &config.spiking;
    if !(spiking.decay_factor > 0.0 && spiking.decay_factor < 1.0) {
        errors.push(invalid("spiking.decay_factor", "must be strictly between 0.0 and 1.0"));
    }
    if spiking.spike_scale_multiple < 1.0 {
        errors.push(invalid("spiking.spike_scale_multiple", "must be >= 1.0"));
    }
    if spiking.spike_window_ticks == 0 {
        errors.push(invalid("spiking.spike_window_ticks", "must be > 0"));
    }
    if spiking.baseline_scale <= 0.0 {
        errors.push(invalid("spiking.baseline_scale", "must be positive"));
    }
    if spiking.tick_hz <= 0.0 {
        errors.push(invalid("spiking.tick_hz", "must be positive"));
    }

    if config.streaming.radius > MAX_STREAMING_RADIUS {
        errors.push(invalid(
            "streaming.radius",
            &format!("must be <= {}", MAX_STREAMING_RADIUS),
        ));
    }
    if config.streaming.request_queue_capacity == 0 {
        errors.push(invalid("streaming.request_queue_capacity", "must be > 0"));
    }
    if config.streaming.response_queue_capacity == 0 {
        errors.push(invalid("streaming.response_queue_capacity", "must be > 0"));
    }
}

fn validate_datasets(config: &ProbesimConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for (i, dataset) in config.datasets.iter().enumerate() {
        if dataset.name.is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("datasets[{}].name", i),
            });
        } else if !seen.insert(dataset.name.as_str()) {
            errors.push(ConfigValidationError::DuplicateDataset {
                name: dataset.name.clone(),
            });
        }
        if ![1, 2, 4].contains(&dataset.value_width) {
            errors.push(invalid(
                &format!("datasets[{}].value_width", i),
                "must be 1, 2 or 4",
            ));
        }
    }

    // Without declared datasets the derived list is served as sentinels
    if config.datasets.is_empty() {
        return;
    }
    for name in &config.oracle.derived_datasets {
        if !seen.contains(name.as_str()) {
            errors.push(ConfigValidationError::UnknownDerivedDataset { name: name.clone() });
        }
    }
}
