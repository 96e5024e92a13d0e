// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Weighted ensemble of per-model predictors
//!
//! For each verdict the ensemble accumulates
//! `probability[verdict] * weight * calibrated_confidence` over all members.
//! The largest total wins. Totals below `threshold` are replaced by an
//! `unverifiable` verdict at `fallback_confidence`, and the final confidence
//! never exceeds `confidence_cap`.
//!
//! [`aggregate`] is the pure arithmetic step; [`Ensemble::predict`] runs the
//! predictors and the calibrator first.

use crate::calibration::Calibrator;
use crate::claims::{Distribution, Verdict};
use crate::features::FeatureVector;
use crate::predictor::{
    FallbackPredictor, FallbackRules, ModelId, ModelPredictor, ModelVerdict, PredictionSource, Predictor,
    UsageMetrics,
};
use crate::provider::ModelProvider;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What to do with a configured model that failed to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailablePolicy {
    /// Substitute the fallback rule predictor
    #[default]
    Fallback,
    /// Leave the model out of the vote
    Skip,
}

/// Static weight of one ensemble member
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    pub model: ModelId,
    pub weight: f64,
}

/// Ensemble voting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub weights: Vec<ModelWeight>,
    /// Winning totals strictly below this become `unverifiable`
    pub threshold: f64,
    /// Confidence reported when the threshold override fires
    pub fallback_confidence: f64,
    pub confidence_cap: f64,
    pub unavailable_policy: UnavailablePolicy,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            weights: vec![
                ModelWeight { model: ModelId::Deberta, weight: 0.35 },
                ModelWeight { model: ModelId::Roberta, weight: 0.30 },
                ModelWeight { model: ModelId::Electra, weight: 0.25 },
                ModelWeight { model: ModelId::Bert, weight: 0.10 },
            ],
            threshold: 0.6,
            fallback_confidence: 0.5,
            confidence_cap: 0.95,
            unavailable_policy: UnavailablePolicy::Fallback,
        }
    }
}

/// One member's input to the vote
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub weight: f64,
    pub prediction: ModelVerdict,
    pub calibrated_confidence: f64,
}

/// Per-model line of an ensemble result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBreakdown {
    pub model: ModelId,
    pub verdict: Verdict,
    pub confidence: f64,
    pub calibrated_confidence: f64,
    pub weight: f64,
    pub source: PredictionSource,
}

/// Combined verdict of the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub verdict: Verdict,
    /// In `[0, confidence_cap]`
    pub confidence: f64,
    /// Whether the low-confidence override replaced the winning verdict
    pub overridden: bool,
    /// Accumulated weighted votes per verdict
    pub label_totals: Distribution,
    /// Each contributing model's probability distribution
    pub probabilities: BTreeMap<ModelId, Distribution>,
    pub breakdown: Vec<ModelBreakdown>,
}

impl EnsembleResult {
    /// Models that took part in the vote, in voting order
    pub fn contributing_models(&self) -> Vec<ModelId> {
        self.breakdown.iter().map(|b| b.model).collect()
    }
}

/// Combine contributions into a single verdict
pub fn aggregate(contributions: &[Contribution], config: &EnsembleConfig) -> EnsembleResult {
    let mut totals = Distribution::zero();
    for contribution in contributions {
        for (verdict, p) in contribution.prediction.distribution.iter() {
            totals.add(verdict, p * contribution.weight * contribution.calibrated_confidence);
        }
    }

    let (candidate, candidate_confidence) = totals.argmax();
    let overridden = candidate_confidence < config.threshold;
    let (verdict, confidence) = if overridden {
        (Verdict::Unverifiable, config.fallback_confidence)
    } else {
        (candidate, candidate_confidence)
    };

    EnsembleResult {
        verdict,
        confidence: confidence.min(config.confidence_cap),
        overridden,
        label_totals: totals,
        probabilities: contributions
            .iter()
            .map(|c| (c.prediction.model, c.prediction.distribution))
            .collect(),
        breakdown: contributions
            .iter()
            .map(|c| ModelBreakdown {
                model: c.prediction.model,
                verdict: c.prediction.verdict,
                confidence: c.prediction.confidence,
                calibrated_confidence: c.calibrated_confidence,
                weight: c.weight,
                source: c.prediction.source,
            })
            .collect(),
    }
}

/// A weighted predictor taking part in the vote
pub struct Member {
    pub weight: f64,
    pub predictor: Box<dyn Predictor>,
}

/// Load state of one configured model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub model: ModelId,
    pub weight: f64,
    /// `active` when served by a model, `fallback` when rules stand in
    pub status: String,
}

/// The configured ensemble of predictors
pub struct Ensemble {
    config: EnsembleConfig,
    calibrator: Calibrator,
    members: Vec<Member>,
}

impl Ensemble {
    /// Load every configured model through `provider`, applying the unavailable policy
    pub fn load(
        config: EnsembleConfig,
        calibrator: Calibrator,
        fallback_rules: Arc<FallbackRules>,
        provider: Arc<dyn ModelProvider>,
        max_input_chars: usize,
    ) -> Self {
        let mut members = Vec::new();

        for ModelWeight { model, weight } in &config.weights {
            match provider.load(*model) {
                Ok(handle) => {
                    tracing::info!("Model {} loaded ({})", model, handle.name);
                    members.push(Member {
                        weight: *weight,
                        predictor: Box::new(ModelPredictor::new(
                            handle,
                            Arc::clone(&provider),
                            Arc::clone(&fallback_rules),
                            max_input_chars,
                        )),
                    });
                }
                Err(e) => match config.unavailable_policy {
                    UnavailablePolicy::Fallback => {
                        tracing::warn!("Model {} unavailable ({}); using fallback rules", model, e);
                        members.push(Member {
                            weight: *weight,
                            predictor: Box::new(FallbackPredictor::new(*model, Arc::clone(&fallback_rules))),
                        });
                    }
                    UnavailablePolicy::Skip => {
                        tracing::warn!("Model {} unavailable ({}); excluded from the vote", model, e);
                    }
                },
            }
        }

        if members.is_empty() {
            tracing::warn!("No models available; every verdict will be unverifiable");
        }

        Self::from_members(config, calibrator, members)
    }

    /// Build from already constructed predictors
    pub fn from_members(config: EnsembleConfig, calibrator: Calibrator, members: Vec<Member>) -> Self {
        Self {
            config,
            calibrator,
            members,
        }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn status(&self) -> Vec<MemberStatus> {
        self.members
            .iter()
            .map(|m| MemberStatus {
                model: m.predictor.model(),
                weight: m.weight,
                status: if m.predictor.is_model_backed() { "active" } else { "fallback" }.to_string(),
            })
            .collect()
    }

    /// Run every member, calibrate, and aggregate; usage is recorded into `usage`
    pub fn predict(&self, text: &str, features: &FeatureVector, usage: &mut UsageMetrics) -> EnsembleResult {
        let now = Utc::now();
        let contributions: Vec<Contribution> = self
            .members
            .iter()
            .map(|member| {
                let prediction = member.predictor.predict(text);
                usage.record(&prediction, now);
                let calibrated_confidence =
                    self.calibrator
                        .calibrate(prediction.confidence, prediction.model, features);
                tracing::debug!(
                    "{}: {} ({:.3}, calibrated {:.3})",
                    prediction.model,
                    prediction.verdict,
                    prediction.confidence,
                    calibrated_confidence
                );
                Contribution {
                    weight: member.weight,
                    prediction,
                    calibrated_confidence,
                }
            })
            .collect();
        usage.total_runs += 1;

        aggregate(&contributions, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationConfig;
    use crate::features::extract;
    use crate::provider::{ExternalModels, NoModels};

    fn contribution(model: ModelId, distribution: Distribution, weight: f64, calibrated: f64) -> Contribution {
        let (verdict, confidence) = distribution.argmax();
        Contribution {
            weight,
            prediction: ModelVerdict {
                model,
                verdict,
                confidence,
                distribution,
                source: PredictionSource::Model,
            },
            calibrated_confidence: calibrated,
        }
    }

    fn certain(verdict: Verdict) -> Distribution {
        let mut dist = Distribution::zero();
        dist.set(verdict, 1.0);
        dist
    }

    #[test]
    fn test_no_contributions() {
        let result = aggregate(&[], &EnsembleConfig::default());
        assert_eq!(result.verdict, Verdict::Unverifiable);
        assert_eq!(result.confidence, 0.5);
        assert!(result.overridden);
        assert!(result.contributing_models().is_empty());
    }

    #[test]
    fn test_single_model_wins() {
        let dist = Distribution::peaked(Verdict::True, 0.9);
        let result = aggregate(
            &[contribution(ModelId::Roberta, dist, 1.0, 0.9)],
            &EnsembleConfig::default(),
        );
        assert_eq!(result.verdict, Verdict::True);
        assert!((result.confidence - 0.81).abs() < 1e-12);
        assert!(!result.overridden);
        assert_eq!(result.contributing_models(), vec![ModelId::Roberta]);
    }

    #[test]
    fn test_confidence_cap() {
        let result = aggregate(
            &[
                contribution(ModelId::Deberta, certain(Verdict::False), 1.0, 0.95),
                contribution(ModelId::Roberta, certain(Verdict::False), 1.0, 0.95),
            ],
            &EnsembleConfig::default(),
        );
        assert_eq!(result.verdict, Verdict::False);
        assert_eq!(result.confidence, 0.95);
        assert!((result.label_totals.get(Verdict::False) - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_boundary() {
        let config = EnsembleConfig::default();

        let below = aggregate(&[contribution(ModelId::Bert, certain(Verdict::True), 1.0, 0.599999)], &config);
        assert_eq!(below.verdict, Verdict::Unverifiable);
        assert_eq!(below.confidence, 0.5);

        let at = aggregate(&[contribution(ModelId::Bert, certain(Verdict::True), 1.0, 0.6)], &config);
        assert_eq!(at.verdict, Verdict::True);
        assert_eq!(at.confidence, 0.6);
        assert!(!at.overridden);
    }

    #[test]
    fn test_weighted_voting_not_majority() {
        // two light models say misleading, one heavy model says false
        let result = aggregate(
            &[
                contribution(ModelId::Deberta, certain(Verdict::False), 0.7, 0.95),
                contribution(ModelId::Electra, certain(Verdict::Misleading), 0.15, 0.95),
                contribution(ModelId::Bert, certain(Verdict::Misleading), 0.15, 0.95),
            ],
            &EnsembleConfig::default(),
        );
        assert_eq!(result.verdict, Verdict::False);
        assert!((result.confidence - 0.665).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let contributions = vec![
            contribution(ModelId::Deberta, Distribution::from_class_probs([0.1, 0.7, 0.1, 0.1]), 0.35, 0.73),
            contribution(ModelId::Roberta, Distribution::from_class_probs([0.2, 0.5, 0.2, 0.1]), 0.30, 0.5),
        ];
        let config = EnsembleConfig::default();
        let first = aggregate(&contributions, &config);
        let second = aggregate(&contributions, &config);
        assert_eq!(first, second);
        assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
    }

    #[test]
    fn test_flat_earth_through_fallback() {
        let config = EnsembleConfig {
            weights: vec![ModelWeight { model: ModelId::Deberta, weight: 1.0 }],
            ..Default::default()
        };
        let ensemble = Ensemble::load(
            config,
            Calibrator::identity(),
            Arc::new(FallbackRules::default()),
            Arc::new(NoModels),
            512,
        );
        let text = "The earth is flat";
        let mut usage = UsageMetrics::new();
        let result = ensemble.predict(text, &extract(text), &mut usage);

        let line = &result.breakdown[0];
        assert_eq!(line.verdict, Verdict::False);
        assert_eq!(line.confidence, 0.92);
        assert_eq!(line.calibrated_confidence, 0.92);

        // probability 0.92 x weight 1.0 x calibrated 0.92
        assert_eq!(result.verdict, Verdict::False);
        assert!((result.confidence - 0.92 * 0.92).abs() < 1e-12);
        assert!(!result.overridden);
        assert_eq!(usage.get(ModelId::Deberta).unwrap().total_predictions, 1);
        assert_eq!(usage.total_runs, 1);
    }

    #[test]
    fn test_default_ensemble_on_fallback_rules() {
        // false vote = 0.92 * (0.35*0.95 + 0.30*0.92 + 0.25*0.92 + 0.10*0.874)
        let ensemble = Ensemble::load(
            EnsembleConfig::default(),
            Calibrator::new(CalibrationConfig::default()),
            Arc::new(FallbackRules::default()),
            Arc::new(NoModels),
            512,
        );
        let text = "The earth is flat";
        let mut usage = UsageMetrics::new();
        let result = ensemble.predict(text, &extract(text), &mut usage);

        assert_eq!(result.breakdown.len(), 4);
        assert_eq!(result.verdict, Verdict::False);
        assert!((result.confidence - 0.851828).abs() < 1e-9);
        assert!(result.breakdown.iter().all(|b| b.source == PredictionSource::Fallback));
        assert!(ensemble.status().iter().all(|s| s.status == "fallback"));
    }

    #[test]
    fn test_skip_policy_with_no_models() {
        let config = EnsembleConfig {
            unavailable_policy: UnavailablePolicy::Skip,
            ..Default::default()
        };
        let ensemble = Ensemble::load(
            config,
            Calibrator::default(),
            Arc::new(FallbackRules::default()),
            Arc::new(NoModels),
            512,
        );
        assert!(ensemble.members().is_empty());

        let mut usage = UsageMetrics::new();
        let result = ensemble.predict("The earth is flat", &FeatureVector::default(), &mut usage);
        assert_eq!(result.verdict, Verdict::Unverifiable);
        assert_eq!(result.confidence, 0.5);
        assert!(usage.models.is_empty());
    }

    #[test]
    fn test_model_backed_members() {
        let provider = Arc::new(ExternalModels::new(ModelId::ALL.to_vec(), |_, _| {
            // strongly "true" in head order
            Ok([-4.0, 6.0, -4.0, -4.0])
        }));
        let ensemble = Ensemble::load(
            EnsembleConfig::default(),
            Calibrator::default(),
            Arc::new(FallbackRules::default()),
            provider,
            512,
        );
        assert!(ensemble.status().iter().all(|s| s.status == "active"));

        let mut usage = UsageMetrics::new();
        let result = ensemble.predict("Water boils at 100 degrees at sea level", &FeatureVector::default(), &mut usage);
        assert_eq!(result.verdict, Verdict::True);
        assert!(result.confidence >= 0.6 && result.confidence <= 0.95);
        assert!(result.breakdown.iter().all(|b| b.source == PredictionSource::Model));
    }
}
