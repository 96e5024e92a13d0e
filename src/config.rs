// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Verifier configuration
//!
//! Every section has defaults, so a config file only needs the values it
//! changes.

use crate::calibration::CalibrationConfig;
use crate::ensemble::EnsembleConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::knowledge::{default_fact_patterns, FactRule};
use crate::predictor::FallbackRules;
use crate::provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Configuration for the verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub ensemble: EnsembleConfig,
    pub calibration: CalibrationConfig,
    /// Phrase rules used when a model is unavailable
    pub fallback: FallbackRules,
    pub provider: ProviderConfig,
    pub knowledge_patterns: Vec<FactRule>,
    /// Longest accepted claim, in characters
    pub max_input_chars: usize,
    /// JSONL history file; `None` disables history
    pub history_path: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            ensemble: EnsembleConfig::default(),
            calibration: CalibrationConfig::default(),
            fallback: FallbackRules::default(),
            provider: ProviderConfig::default(),
            knowledge_patterns: default_fact_patterns(),
            max_input_chars: 1000,
            history_path: None,
        }
    }
}

fn unit_interval(name: &str, value: f64) -> VerifyResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(VerifyError::Config(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

fn non_negative(name: &str, value: f64) -> VerifyResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(VerifyError::Config(format!("{} must be a non-negative number, got {}", name, value)))
    }
}

impl VerifierConfig {
    pub fn from_json(json: &str) -> VerifyResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VerifyError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> VerifyResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| VerifyError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_json(&json)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> VerifyResult<()> {
        let ensemble = &self.ensemble;
        let mut seen = BTreeSet::new();
        for w in &ensemble.weights {
            non_negative(&format!("weight of {}", w.model), w.weight)?;
            if !seen.insert(w.model) {
                return Err(VerifyError::Config(format!("model {} is weighted twice", w.model)));
            }
        }
        unit_interval("ensemble.threshold", ensemble.threshold)?;
        unit_interval("ensemble.fallback_confidence", ensemble.fallback_confidence)?;
        unit_interval("ensemble.confidence_cap", ensemble.confidence_cap)?;

        let calibration = &self.calibration;
        for (model, multiplier) in &calibration.model_multipliers {
            non_negative(&format!("calibration multiplier of {}", model), *multiplier)?;
        }
        non_negative("calibration.sensational_factor", calibration.sensational_factor)?;
        non_negative("calibration.credibility_factor", calibration.credibility_factor)?;
        unit_interval("calibration.cap", calibration.cap)?;

        for rule in &self.fallback.rules {
            unit_interval(&format!("fallback confidence for {}", rule.verdict), rule.confidence)?;
            if rule.phrases.is_empty() {
                return Err(VerifyError::Config(format!("fallback rule for {} has no phrases", rule.verdict)));
            }
            if rule.phrases.iter().any(|phrase| phrase.trim().is_empty()) {
                return Err(VerifyError::Config(format!("fallback rule for {} has a blank phrase", rule.verdict)));
            }
        }
        unit_interval("fallback.default_confidence", self.fallback.default_confidence)?;

        for pattern in &self.knowledge_patterns {
            unit_interval(&format!("knowledge pattern {}", pattern.name), pattern.confidence)?;
        }

        if self.max_input_chars == 0 {
            return Err(VerifyError::Config("max_input_chars must be positive".to_string()));
        }
        if self.provider.max_input_chars == 0 {
            return Err(VerifyError::Config("provider.max_input_chars must be positive".to_string()));
        }
        if self.provider.timeout_secs == 0 {
            return Err(VerifyError::Config("provider.timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}
