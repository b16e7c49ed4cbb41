// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, ProbesimConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "probesim_configuration.toml";

/// Find the probesim configuration file
///
/// Search order:
/// 1. `PROBESIM_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("PROBESIM_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by PROBESIM_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet PROBESIM_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<ProbesimConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: ProbesimConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PROBESIM_DATA_DIR` -> `system.data_dir`
/// - `PROBESIM_LOG_LEVEL` -> `system.log_level`
/// - `PROBESIM_MAX_CORES` -> `system.max_cores`
/// - `PROBESIM_ORACLE_SEED` -> `oracle.seed`
/// - `PROBESIM_ORACLE_DENSITY` -> `oracle.density`
/// - `PROBESIM_STREAMING_RADIUS` -> `streaming.radius`
/// - `PROBESIM_TICK_HZ` -> `spiking.tick_hz`
pub fn apply_environment_overrides(config: &mut ProbesimConfig) {
    if let Ok(value) = env::var("PROBESIM_DATA_DIR") {
        config.system.data_dir = PathBuf::from(value);
    }
    if let Ok(value) = env::var("PROBESIM_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("PROBESIM_MAX_CORES") {
        if let Ok(cores) = value.parse::<usize>() {
            config.system.max_cores = cores;
        }
    }
    if let Ok(value) = env::var("PROBESIM_ORACLE_SEED") {
        if let Ok(seed) = value.parse::<u64>() {
            config.oracle.seed = seed;
        }
    }
    if let Ok(value) = env::var("PROBESIM_ORACLE_DENSITY") {
        if let Ok(density) = value.parse::<f64>() {
            config.oracle.density = density;
        }
    }
    if let Ok(value) = env::var("PROBESIM_STREAMING_RADIUS") {
        if let Ok(radius) = value.parse::<u32>() {
            config.streaming.radius = radius;
        }
    }
    if let Ok(value) = env::var("PROBESIM_TICK_HZ") {
        if let Ok(hz) = value.parse::<f32>() {
            config.spiking.tick_hz = hz;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"seed": "3", "radius": "4"}`)
pub fn apply_cli_overrides(config: &mut ProbesimConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("data_dir") {
        config.system.data_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("seed") {
        if let Ok(seed) = value.parse::<u64>() {
            config.oracle.seed = seed;
        }
    }
    if let Some(value) = cli_args.get("density") {
        if let Ok(density) = value.parse::<f64>() {
            config.oracle.density = density;
        }
    }
    if let Some(value) = cli_args.get("radius") {
        if let Ok(radius) = value.parse::<u32>() {
            config.streaming.radius = radius;
        }
    }
    if let Some(value) = cli_args.get("tick_hz") {
        if let Ok(hz) = value.parse::<f32>() {
            config.spiking.tick_hz = hz;
        }
    }
}
