// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Firing-Rate Sources
//!
//! A neuron's instantaneous firing rate (spikes/s) comes from one of three
//! interchangeable sources, chosen per neuron at spawn time:
//!
//! ```text
//! Glm:          r = max(b, b + w_wheel·wheel + w_stim·[stim on side] + w_fb·feedback)
//! EventAverage: r = curve[(now - trial_start) / bin]      (clamped to the curve ends)
//! Flat:         r = constant
//! ```
//!
//! The per-tick spike probability is `r · dt`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Side on which the current stimulus is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StimSide {
    Left,
    #[default]
    None,
    Right,
}

impl StimSide {
    /// -1 = left, 0 = none, 1 = right; anything else is treated as none.
    pub fn from_sign(sign: i8) -> Self {
        match sign {
            -1 => StimSide::Left,
            1 => StimSide::Right,
            _ => StimSide::None,
        }
    }
}

/// Trial outcome signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Feedback {
    Incorrect,
    #[default]
    None,
    Correct,
}

impl Feedback {
    pub fn from_sign(sign: i8) -> Self {
        match sign {
            -1 => Feedback::Incorrect,
            1 => Feedback::Correct,
            _ => Feedback::None,
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Feedback::Incorrect => -1.0,
            Feedback::None => 0.0,
            Feedback::Correct => 1.0,
        }
    }
}

/// External behavioral signals, replaced wholesale on each update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSignals {
    pub wheel_velocity: f32,
    pub stim_on_side: StimSide,
    pub feedback: Feedback,
    /// Simulation time (s) at which the current trial started
    pub trial_start: f64,
}

/// Linear behavioral model weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlmWeights {
    /// Floor and intercept of the rate
    pub baseline: f32,
    pub wheel_velocity: f32,
    pub stim_left: f32,
    pub stim_right: f32,
    pub feedback: f32,
}

impl GlmWeights {
    pub fn rate(&self, signals: &BehaviorSignals) -> f32 {
        let stim = match signals.stim_on_side {
            StimSide::Left => self.stim_left,
            StimSide::Right => self.stim_right,
            StimSide::None => 0.0,
        };
        let drive = self.baseline
            + self.wheel_velocity * signals.wheel_velocity
            + stim
            + self.feedback * signals.feedback.sign();
        drive.max(self.baseline)
    }
}

/// Precomputed trial-aligned average rate, binned in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCurve {
    pub bins: Vec<f32>,
    pub bin_seconds: f32,
}

impl EventCurve {
    pub fn new(bins: Vec<f32>, bin_seconds: f32) -> Self {
        Self { bins, bin_seconds }
    }

    /// Rate at `t` seconds after trial start; times before the first bin use
    /// the first bin, times past the end use the last one.
    pub fn rate_at(&self, t: f64) -> f32 {
        let Some(last) = self.bins.len().checked_sub(1) else {
            return 0.0;
        };
        if t <= 0.0 || self.bin_seconds <= 0.0 {
            return self.bins[0];
        }
        let idx = (t / self.bin_seconds as f64).floor() as usize;
        self.bins[idx.min(last)]
    }
}

/// Where a neuron's rate comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateSource {
    Glm(GlmWeights),
    /// Curves are shared between neurons of one bulk dataset
    EventAverage(Arc<EventCurve>),
    Flat(f32),
}

impl RateSource {
    /// Instantaneous rate in spikes/s, never negative.
    pub fn rate(&self, now: f64, signals: &BehaviorSignals) -> f32 {
        let r = match self {
            RateSource::Glm(weights) => weights.rate(signals),
            RateSource::EventAverage(curve) => curve.rate_at(now - signals.trial_start),
            RateSource::Flat(rate) => *rate,
        };
        r.max(0.0)
    }
}
