// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `probesim_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbesimConfig {
    pub system: SystemConfig,
    pub volume: VolumeConfig,
    pub oracle: OracleConfig,
    pub streaming: StreamingConfig,
    pub spiking: SpikingConfig,
    pub glm: GlmConfig,
    pub datasets: Vec<DatasetConfig>,
}

/// System-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub max_cores: usize,
    pub log_level: String,
    pub data_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_cores: 0, // 0 = rayon default
            log_level: "info".to_string(),
            data_dir: PathBuf::from(""),
        }
    }
}

/// Volumetric grid geometry
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Grid dimensions (ap, dv, lr)
    pub dims: [usize; 3],
    pub voxel_size_um: f32,
    /// Bregma in voxel units; positions are reported relative to it
    pub origin_voxel: [f32; 3],
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            dims: [528, 320, 456],
            voxel_size_um: 25.0,
            origin_voxel: [216.0, 18.0, 228.0],
        }
    }
}

/// How the values of a dataset are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Area ids (u32)
    Categorical,
    /// Continuous parameters (f32)
    Continuous,
}

/// Element type of a remap table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemapKind {
    U32,
    F32,
}

/// One volumetric dataset on disk. Paths are relative to `system.data_dir`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub name: String,
    pub kind: DatasetKind,
    pub bitmap: PathBuf,
    pub values: PathBuf,
    #[serde(default = "default_value_width")]
    pub value_width: u8,
    #[serde(default)]
    pub remap: Option<PathBuf>,
    #[serde(default = "default_remap_kind")]
    pub remap_kind: RemapKind,
}

fn default_value_width() -> u8 {
    1
}

fn default_remap_kind() -> RemapKind {
    RemapKind::F32
}

/// Server-side population oracle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    pub seed: u64,
    /// Probability that a voxel holds a neuron
    pub density: f64,
    /// Datasets sampled for every streamed voxel, in response order
    pub derived_datasets: Vec<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            density: 0.125,
            derived_datasets: vec!["rf_x".to_string(), "rf_y".to_string()],
        }
    }
}

/// Neighborhood streaming settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chebyshev radius around the electrode tip, in voxels
    pub radius: u32,
    pub request_queue_capacity: usize,
    pub response_queue_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            request_queue_capacity: 256,
            response_queue_capacity: 256,
        }
    }
}

/// Spike visualization and tick settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikingConfig {
    /// Per-tick multiplicative scale decay after a spike
    pub decay_factor: f32,
    /// Scale on spike onset, as a multiple of the baseline scale
    pub spike_scale_multiple: f32,
    /// Ticks the active color is held after a spike
    pub spike_window_ticks: u16,
    pub active_color: [f32; 4],
    pub baseline_color: [f32; 4],
    pub baseline_scale: f32,
    pub tick_hz: f32,
    pub seed: u64,
}

impl Default for SpikingConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.9,
            spike_scale_multiple: 2.0,
            spike_window_ticks: 5,
            active_color: [1.0, 1.0, 1.0, 1.0],
            baseline_color: [0.45, 0.45, 0.45, 1.0],
            baseline_scale: 1.0,
            tick_hz: 60.0,
            seed: 7,
        }
    }
}

/// Default GLM weights for streamed neurons
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlmConfig {
    pub baseline: f32,
    pub wheel_velocity: f32,
    pub stim_left: f32,
    pub stim_right: f32,
    pub feedback: f32,
}

impl Default for GlmConfig {
    fn default() -> Self {
        Self {
            baseline: 2.0,
            wheel_velocity: 0.5,
            stim_left: 8.0,
            stim_right: 8.0,
            feedback: 4.0,
        }
    }
}

impl SpikingConfig {
    /// Seconds per tick
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }
}
