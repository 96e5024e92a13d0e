// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-model predictors
//!
//! Implements:
//! - Model-backed prediction (provider logits + softmax + argmax)
//! - Deterministic phrase-rule fallback used when a model is unavailable
//! - Per-model usage counters, owned by the caller
//!
//! A predictor never fails: inference errors degrade to the fallback rules.

use crate::claims::{Distribution, Verdict};
use crate::provider::{Logits, ModelHandle, ModelProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a configured classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    Deberta,
    Roberta,
    Electra,
    Bert,
}

impl ModelId {
    pub const ALL: [ModelId; 4] = [ModelId::Deberta, ModelId::Roberta, ModelId::Electra, ModelId::Bert];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Deberta => "deberta",
            ModelId::Roberta => "roberta",
            ModelId::Electra => "electra",
            ModelId::Bert => "bert",
        }
    }

    /// Pretrained checkpoint served by the model provider
    pub fn hub_name(&self) -> &'static str {
        match self {
            ModelId::Deberta => "microsoft/deberta-v3-base",
            ModelId::Roberta => "roberta-base",
            ModelId::Electra => "google/electra-base-discriminator",
            ModelId::Bert => "bert-base-uncased",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Fallback,
}

/// Output of a single predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVerdict {
    pub model: ModelId,
    pub verdict: Verdict,
    /// Probability of the chosen verdict
    pub confidence: f64,
    pub distribution: Distribution,
    pub source: PredictionSource,
}

/// Trait for all per-model predictors
pub trait Predictor: Send + Sync {
    /// Model this predictor stands for
    fn model(&self) -> ModelId;

    /// Classify text; never fails
    fn predict(&self, text: &str) -> ModelVerdict;

    /// Whether predictions come from a loaded model rather than rules
    fn is_model_backed(&self) -> bool {
        false
    }
}

/// A phrase list mapped to a fixed verdict and confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseRule {
    pub verdict: Verdict,
    pub confidence: f64,
    pub phrases: Vec<String>,
}

impl PhraseRule {
    fn new(verdict: Verdict, confidence: f64, phrases: &[&str]) -> Self {
        Self {
            verdict,
            confidence,
            phrases: phrases.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Ordered rule table for the fallback predictor; the first matching rule wins
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackRules {
    pub rules: Vec<PhraseRule>,
    pub default_verdict: Verdict,
    pub default_confidence: f64,
}

impl Default for FallbackRules {
    fn default() -> Self {
        Self {
            rules: vec![
                PhraseRule::new(
                    Verdict::False,
                    0.92,
                    &["earth is flat", "moon landing fake", "vaccines cause autism"],
                ),
                PhraseRule::new(
                    Verdict::True,
                    0.88,
                    &["earth is round", "climate change is real", "vaccines work"],
                ),
                PhraseRule::new(
                    Verdict::Misleading,
                    0.75,
                    &["breaking", "urgent", "secret", "shocking"],
                ),
            ],
            default_verdict: Verdict::Unverifiable,
            default_confidence: 0.65,
        }
    }
}

impl FallbackRules {
    /// First rule whose phrase occurs in the lower-cased text
    pub fn evaluate(&self, text: &str) -> (Verdict, f64) {
        let text_lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.phrases.iter().any(|p| text_lower.contains(&p.to_lowercase())))
            .map(|rule| (rule.verdict, rule.confidence))
            .unwrap_or((self.default_verdict, self.default_confidence))
    }
}

/// Deterministic rule-based stand-in for an unavailable model
#[derive(Debug, Clone)]
pub struct FallbackPredictor {
    model: ModelId,
    rules: Arc<FallbackRules>,
}

impl FallbackPredictor {
    pub fn new(model: ModelId, rules: Arc<FallbackRules>) -> Self {
        Self { model, rules }
    }
}

impl Predictor for FallbackPredictor {
    fn model(&self) -> ModelId {
        self.model
    }

    fn predict(&self, text: &str) -> ModelVerdict {
        let (verdict, confidence) = self.rules.evaluate(text);
        ModelVerdict {
            model: self.model,
            verdict,
            confidence,
            distribution: Distribution::peaked(verdict, confidence),
            source: PredictionSource::Fallback,
        }
    }
}

/// Numerically stable softmax; `None` when any logit is not finite
pub fn softmax(logits: &Logits) -> Option<[f64; 4]> {
    if logits.iter().any(|l| !l.is_finite()) {
        return None;
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut probs = [0.0; 4];
    for (p, l) in probs.iter_mut().zip(logits.iter()) {
        *p = (l - max).exp();
    }
    let total: f64 = probs.iter().sum();
    for p in probs.iter_mut() {
        *p /= total;
    }
    Some(probs)
}

/// Collapse whitespace and truncate to `max_chars` characters
pub fn preprocess(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

/// Predictor backed by a model loaded through a [`ModelProvider`]
pub struct ModelPredictor {
    handle: ModelHandle,
    provider: Arc<dyn ModelProvider>,
    fallback: FallbackPredictor,
    max_input_chars: usize,
}

impl ModelPredictor {
    pub fn new(
        handle: ModelHandle,
        provider: Arc<dyn ModelProvider>,
        fallback_rules: Arc<FallbackRules>,
        max_input_chars: usize,
    ) -> Self {
        let fallback = FallbackPredictor::new(handle.model, fallback_rules);
        Self {
            handle,
            provider,
            fallback,
            max_input_chars,
        }
    }

    fn infer(&self, text: &str) -> Result<ModelVerdict, String> {
        let input = preprocess(text, self.max_input_chars);
        let logits = self
            .provider
            .run(&self.handle, &input)
            .map_err(|e| e.to_string())?;
        let probs = softmax(&logits).ok_or_else(|| format!("non-finite logits {:?}", logits))?;

        let mut best = 0;
        for (index, p) in probs.iter().enumerate().skip(1) {
            if *p > probs[best] {
                best = index;
            }
        }

        Ok(ModelVerdict {
            model: self.handle.model,
            verdict: Verdict::from_class_index(best),
            confidence: probs[best],
            distribution: Distribution::from_class_probs(probs),
            source: PredictionSource::Model,
        })
    }
}

impl Predictor for ModelPredictor {
    fn model(&self) -> ModelId {
        self.handle.model
    }

    fn predict(&self, text: &str) -> ModelVerdict {
        match self.infer(text) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("Prediction failed for {}: {}; using fallback rules", self.handle.model, e);
                self.fallback.predict(text)
            }
        }
    }

    fn is_model_backed(&self) -> bool {
        true
    }
}

/// Usage counters for one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub total_predictions: u64,
    /// Running mean of reported confidence
    pub avg_confidence: f64,
    pub fallback_predictions: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Per-model usage counters, owned by the caller and passed into each prediction run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub models: BTreeMap<ModelId, ModelUsage>,
    pub total_runs: u64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one prediction
    pub fn record(&mut self, prediction: &ModelVerdict, at: DateTime<Utc>) {
        let usage = self.models.entry(prediction.model).or_default();
        usage.total_predictions += 1;
        usage.avg_confidence +=
            (prediction.confidence - usage.avg_confidence) / usage.total_predictions as f64;
        if prediction.source == PredictionSource::Fallback {
            usage.fallback_predictions += 1;
        }
        usage.last_used = Some(at);
    }

    pub fn get(&self, model: ModelId) -> Option<&ModelUsage> {
        self.models.get(&model)
    }

    /// Fold another set of counters into this one
    pub fn merge(&mut self, other: &UsageMetrics) {
        self.total_runs += other.total_runs;
        for (model, theirs) in &other.models {
            let ours = self.models.entry(*model).or_default();
            let total = ours.total_predictions + theirs.total_predictions;
            if total > 0 {
                ours.avg_confidence = (ours.avg_confidence * ours.total_predictions as f64
                    + theirs.avg_confidence * theirs.total_predictions as f64)
                    / total as f64;
            }
            ours.total_predictions = total;
            ours.fallback_predictions += theirs.fallback_predictions;
            ours.last_used = ours.last_used.max(theirs.last_used);
        }
    }
}
