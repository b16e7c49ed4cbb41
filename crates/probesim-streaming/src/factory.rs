// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Turning a streamed voxel into a spawnable neuron.

use probesim_atlas::VoxelCoord;
use probesim_spiking::{GlmWeights, RateSource, Rgba};

/// Everything `SpikingPopulation::spawn` needs besides the voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuronTemplate {
    pub position: [f32; 3],
    pub baseline_color: Rgba,
    pub rate_source: Option<RateSource>,
}

pub trait NeuronFactory {
    /// `derived` holds one value per configured derived dataset, in order.
    fn build(&self, voxel: VoxelCoord, derived: &[f32]) -> NeuronTemplate;
}

impl<F> NeuronFactory for F
where
    F: Fn(VoxelCoord, &[f32]) -> NeuronTemplate,
{
    fn build(&self, voxel: VoxelCoord, derived: &[f32]) -> NeuronTemplate {
        self(voxel, derived)
    }
}

/// Gives every streamed neuron a GLM rate source.
///
/// When the first derived value (receptive-field azimuth) is available, the
/// neuron only responds to stimuli on the side of its receptive field:
/// negative azimuth keeps `stim_left`, positive keeps `stim_right`.
#[derive(Debug, Clone)]
pub struct GlmNeuronFactory {
    pub origin: [f32; 3],
    pub voxel_size_um: f32,
    pub baseline_color: Rgba,
    pub weights: GlmWeights,
}

impl GlmNeuronFactory {
    fn weights_for(&self, derived: &[f32]) -> GlmWeights {
        let mut weights = self.weights;
        match derived.first().copied() {
            Some(azimuth) if azimuth < 0.0 => weights.stim_right = 0.0,
            Some(azimuth) if azimuth > 0.0 => weights.stim_left = 0.0,
            _ => {}
        }
        weights
    }
}

impl NeuronFactory for GlmNeuronFactory {
    fn build(&self, voxel: VoxelCoord, derived: &[f32]) -> NeuronTemplate {
        NeuronTemplate {
            position: voxel.to_position(self.origin, self.voxel_size_um),
            baseline_color: self.baseline_color,
            rate_source: Some(RateSource::Glm(self.weights_for(derived))),
        }
    }
}
