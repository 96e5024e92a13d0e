// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Confidence calibration
//!
//! Adjusts a model's raw confidence with a static multiplicative rule table:
//! a per-model reliability multiplier, then feature-conditioned factors for
//! sensational language and credibility phrasing. The result never exceeds
//! the configured cap.

use crate::features::FeatureVector;
use crate::predictor::ModelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Calibration rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Reliability multiplier per model; missing models use 1.0
    pub model_multipliers: BTreeMap<ModelId, f64>,
    /// Sensationalism score above which `sensational_factor` applies
    pub sensational_threshold: f64,
    pub sensational_factor: f64,
    /// Applied when any credibility phrase is present
    pub credibility_factor: f64,
    /// Upper bound on any calibrated confidence
    pub cap: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            model_multipliers: BTreeMap::from([(ModelId::Deberta, 1.05), (ModelId::Bert, 0.95)]),
            sensational_threshold: 2.0,
            sensational_factor: 0.8,
            credibility_factor: 1.1,
            cap: 0.95,
        }
    }
}

impl CalibrationConfig {
    /// No adjustments; only the cap applies
    pub fn identity() -> Self {
        Self {
            model_multipliers: BTreeMap::new(),
            sensational_factor: 1.0,
            credibility_factor: 1.0,
            ..Self::default()
        }
    }
}

/// Applies the calibration rule table
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn identity() -> Self {
        Self::new(CalibrationConfig::identity())
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrated confidence in `[0, cap]`
    pub fn calibrate(&self, raw_confidence: f64, model: ModelId, features: &FeatureVector) -> f64 {
        if !raw_confidence.is_finite() {
            return 0.0;
        }

        let mut calibrated = raw_confidence;
        calibrated *= self.config.model_multipliers.get(&model).copied().unwrap_or(1.0);

        if features.sensationalism_score > self.config.sensational_threshold {
            calibrated *= self.config.sensational_factor;
        }
        if features.credibility_indicators > 0.0 {
            calibrated *= self.config.credibility_factor;
        }

        // cap is not validated here, so no clamp
        calibrated.min(self.config.cap).max(0.0)
    }
}
