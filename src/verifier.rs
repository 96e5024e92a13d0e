// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Top-level claim verification
//!
//! Ties together feature extraction, the ensemble vote, explanations,
//! knowledge rules, evidence sources and history.

use crate::calibration::Calibrator;
use crate::claims::Claim;
use crate::config::VerifierConfig;
use crate::ensemble::{Ensemble, EnsembleResult, MemberStatus};
use crate::error::VerifyResult;
use crate::explainability::{explain, Explanation};
use crate::features::{extract, FeatureVector};
use crate::history::{AnalysisRecord, HistorySink, JsonlHistory};
use crate::knowledge::{KnowledgeBase, KnowledgeEvidence};
use crate::predictor::UsageMetrics;
use crate::provider::{self, ModelProvider};
use crate::sources::{MultiSourceReport, MultiSourceVerifier};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Identifier recorded for ensemble verdicts
pub const MODEL_IDENTIFIER: &str = "weighted-ensemble";

/// Which optional stages to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    pub knowledge: bool,
    pub multi_source: bool,
    pub explain: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            knowledge: true,
            multi_source: true,
            explain: true,
        }
    }
}

/// Full result of one verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub claim: String,
    pub fingerprint: String,
    pub verified_at: DateTime<Utc>,
    pub ensemble: EnsembleResult,
    pub features: FeatureVector,
    pub explanation: Option<Explanation>,
    pub knowledge: Option<KnowledgeEvidence>,
    pub sources: Option<MultiSourceReport>,
    pub processing_time_ms: f64,
    pub model_used: String,
}

/// Claim verifier
pub struct Verifier {
    ensemble: Ensemble,
    knowledge: KnowledgeBase,
    sources: MultiSourceVerifier,
    history: Option<Arc<dyn HistorySink>>,
    usage: Mutex<UsageMetrics>,
    max_input_chars: usize,
}

impl Verifier {
    /// Build from configuration, connecting the configured model provider and history file
    pub fn from_config(config: &VerifierConfig) -> VerifyResult<Self> {
        config.validate()?;
        let provider = provider::from_config(&config.provider)?;
        let mut verifier = Self::with_provider(config, provider)?;

        if let Some(path) = &config.history_path {
            verifier.history = Some(Arc::new(JsonlHistory::open(path)?));
            tracing::info!("Recording history to {}", path);
        }
        Ok(verifier)
    }

    /// Build with an explicit model provider and no history
    pub fn with_provider(config: &VerifierConfig, provider: Arc<dyn ModelProvider>) -> VerifyResult<Self> {
        let ensemble = Ensemble::load(
            config.ensemble.clone(),
            Calibrator::new(config.calibration.clone()),
            Arc::new(config.fallback.clone()),
            provider,
            config.provider.max_input_chars,
        );

        Ok(Self {
            ensemble,
            knowledge: KnowledgeBase::with_patterns(config.knowledge_patterns.clone())?,
            sources: MultiSourceVerifier::default(),
            history: None,
            usage: Mutex::new(UsageMetrics::new()),
            max_input_chars: config.max_input_chars,
        })
    }

    /// Rules-only verifier with default settings
    pub fn offline() -> Self {
        let config = VerifierConfig::default();
        Self {
            ensemble: Ensemble::load(
                config.ensemble,
                Calibrator::new(config.calibration),
                Arc::new(config.fallback),
                Arc::new(provider::NoModels),
                config.provider.max_input_chars,
            ),
            knowledge: KnowledgeBase::new(),
            sources: MultiSourceVerifier::default(),
            history: None,
            usage: Mutex::new(UsageMetrics::new()),
            max_input_chars: config.max_input_chars,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_sources(mut self, sources: MultiSourceVerifier) -> Self {
        self.sources = sources;
        self
    }

    pub fn verify(&self, claim: &Claim, options: &VerifyOptions) -> VerifyResult<VerificationReport> {
        claim.validate(self.max_input_chars)?;
        let start = Instant::now();
        let text = claim.text();

        let features = extract(text);
        let mut run_usage = UsageMetrics::new();
        let ensemble = self.ensemble.predict(text, &features, &mut run_usage);
        self.usage.lock().merge(&run_usage);

        let knowledge = options.knowledge.then(|| self.knowledge.verify(text));
        let sources = options.multi_source.then(|| self.sources.verify(text));

        let explanation = options.explain.then(|| {
            let mut explanation = explain(&ensemble, &features, claim);
            let mut evidence = Vec::new();
            if let Some(k) = &knowledge {
                evidence.extend(k.to_evidence());
            }
            if let Some(s) = &sources {
                evidence.extend(s.to_evidence());
            }
            if !evidence.is_empty() {
                explanation.extend_evidence(evidence);
            }
            explanation
        });

        let verified_at = claim.submitted_at().unwrap_or_else(Utc::now);
        let report = VerificationReport {
            claim: text.to_string(),
            fingerprint: claim.fingerprint(),
            verified_at,
            ensemble,
            features,
            explanation,
            knowledge,
            sources,
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            model_used: MODEL_IDENTIFIER.to_string(),
        };

        tracing::info!(
            "Verified claim {}: {} ({:.1}%)",
            &report.fingerprint[..12],
            report.ensemble.verdict,
            report.ensemble.confidence * 100.0
        );

        if let Some(history) = &self.history {
            let record = AnalysisRecord {
                timestamp: verified_at,
                statement: report.claim.clone(),
                verdict: report.ensemble.verdict,
                confidence: report.ensemble.confidence,
                model_used: report.model_used.clone(),
                fingerprint: report.fingerprint.clone(),
            };
            if let Err(e) = history.record(&record) {
                tracing::warn!("Failed to record history: {}", e);
            }
        }

        Ok(report)
    }

    /// Copy of the accumulated per-model usage counters
    pub fn usage(&self) -> UsageMetrics {
        self.usage.lock().clone()
    }

    /// Load state of each configured model
    pub fn model_status(&self) -> Vec<MemberStatus> {
        self.ensemble.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Verdict;
    use crate::error::VerifyError;
    use crate::history::MemoryHistory;
    use crate::predictor::ModelId;
    use crate::provider::ExternalModels;

    #[test]
    fn test_rejects_invalid_input() {
        let verifier = Verifier::offline();
        let options = VerifyOptions::default();

        assert!(matches!(
            verifier.verify(&Claim::new("   "), &options),
            Err(VerifyError::InvalidInput(_))
        ));
        assert!(matches!(
            verifier.verify(&Claim::new("a".repeat(1001)), &options),
            Err(VerifyError::InvalidInput(_))
        ));
        assert!(verifier.verify(&Claim::new("a".repeat(1000)), &options).is_ok());
    }

    #[test]
    fn test_offline_flat_earth() {
        let history = Arc::new(MemoryHistory::new());
        let verifier = Verifier::offline().with_history(history.clone());

        let report = verifier
            .verify(&Claim::new("The earth is flat"), &VerifyOptions::default())
            .unwrap();

        assert_eq!(report.ensemble.verdict, Verdict::False);
        assert_eq!(report.model_used, "weighted-ensemble");
        assert_eq!(report.fingerprint.len(), 64);

        let knowledge = report.knowledge.as_ref().unwrap();
        assert_eq!(knowledge.suggested_verdict(), Some(Verdict::False));
        assert!(report.sources.is_some());

        let explanation = report.explanation.as_ref().unwrap();
        assert!(explanation.evidence.len() >= 3);
        assert!(explanation.summary.contains("Key evidence"));

        let records = history.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verdict, Verdict::False);
        assert_eq!(records[0].fingerprint, report.fingerprint);
    }

    #[test]
    fn test_optional_stages_disabled() {
        let verifier = Verifier::offline();
        let options = VerifyOptions {
            knowledge: false,
            multi_source: false,
            explain: false,
        };
        let report = verifier.verify(&Claim::new("Cats sleep a lot"), &options).unwrap();
        assert!(report.knowledge.is_none());
        assert!(report.sources.is_none());
        assert!(report.explanation.is_none());
    }

    #[test]
    fn test_evidence_does_not_change_verdict() {
        let verifier = Verifier::offline();
        let claim = Claim::new("Vaccines cause autism, a secret they hide");
        let with = verifier.verify(&claim, &VerifyOptions::default()).unwrap();
        let without = verifier
            .verify(
                &claim,
                &VerifyOptions {
                    knowledge: false,
                    multi_source: false,
                    explain: true,
                },
            )
            .unwrap();
        assert_eq!(with.ensemble, without.ensemble);
    }

    #[test]
    fn test_usage_accumulates() {
        let verifier = Verifier::offline();
        let options = VerifyOptions::default();
        verifier.verify(&Claim::new("the earth is flat"), &options).unwrap();
        verifier.verify(&Claim::new("vaccines work"), &options).unwrap();

        let usage = verifier.usage();
        assert_eq!(usage.total_runs, 2);
        for model in ModelId::ALL {
            let m = usage.get(model).unwrap();
            assert_eq!(m.total_predictions, 2);
            assert_eq!(m.fallback_predictions, 2);
        }
        assert!(verifier.model_status().iter().all(|s| s.status == "fallback"));
    }

    #[test]
    fn test_concurrent_verifications_overlap() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use std::time::Duration;

        let arrived = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let provider = {
            let arrived = arrived.clone();
            let overlapped = overlapped.clone();
            Arc::new(ExternalModels::new(vec![ModelId::Deberta], move |_, _| {
                arrived.fetch_add(1, Ordering::SeqCst);
                let deadline = Instant::now() + Duration::from_secs(2);
                while Instant::now() < deadline {
                    if arrived.load(Ordering::SeqCst) >= 2 {
                        overlapped.store(true, Ordering::SeqCst);
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok([5.0, 0.0, 0.0, 0.0])
            }))
        };

        let mut config = VerifierConfig::default();
        config.ensemble.unavailable_policy = crate::ensemble::UnavailablePolicy::Skip;
        let verifier = Verifier::with_provider(&config, provider).unwrap();
        let options = VerifyOptions::default();

        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| verifier.verify(&Claim::new("Some claim"), &options).unwrap());
            }
        });

        // both inference calls were in flight at once
        assert!(overlapped.load(Ordering::SeqCst));
        let usage = verifier.usage();
        assert_eq!(usage.total_runs, 2);
        assert_eq!(usage.get(ModelId::Deberta).unwrap().total_predictions, 2);
    }

    #[test]
    fn test_with_provider_and_skip_policy() {
        let mut config = VerifierConfig::default();
        config.ensemble.unavailable_policy = crate::ensemble::UnavailablePolicy::Skip;
        let provider = Arc::new(ExternalModels::new(vec![ModelId::Roberta], |_, _| Ok([5.0, 0.0, 0.0, 0.0])));

        let verifier = Verifier::with_provider(&config, provider).unwrap();
        assert_eq!(verifier.model_status().len(), 1);

        let report = verifier
            .verify(&Claim::new("Some claim"), &VerifyOptions::default())
            .unwrap();
        // only roberta (weight 0.30) votes, so the total stays below the threshold
        assert_eq!(report.ensemble.verdict, Verdict::Unverifiable);
        assert_eq!(report.ensemble.confidence, 0.5);
        assert_eq!(report.ensemble.contributing_models(), vec![ModelId::Roberta]);
    }

    #[test]
    fn test_from_config_with_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let config = VerifierConfig {
            history_path: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let verifier = Verifier::from_config(&config).unwrap();
        verifier
            .verify(&Claim::new("Climate change is real"), &VerifyOptions::default())
            .unwrap();

        let records = crate::history::read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_used, "weighted-ensemble");
    }
}
