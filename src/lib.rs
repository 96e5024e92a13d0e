// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Ensemble claim verification
//!
//! This crate provides:
//! - Linguistic feature extraction for claims
//! - Per-model predictors with a deterministic rule fallback
//! - Confidence calibration and weighted ensemble voting
//! - Templated explanations with counterfactuals
//! - Static knowledge rules and pluggable evidence sources
//! - Analysis history with simple analytics

pub mod batch;
pub mod calibration;
pub mod claims;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod explainability;
pub mod features;
pub mod history;
pub mod knowledge;
pub mod predictor;
pub mod provider;
pub mod sources;
pub mod verifier;

pub use calibration::{CalibrationConfig, Calibrator};
pub use claims::{Claim, Distribution, Verdict};
pub use config::VerifierConfig;
pub use ensemble::{aggregate, Contribution, Ensemble, EnsembleConfig, EnsembleResult, UnavailablePolicy};
pub use error::{VerifyError, VerifyResult};
pub use explainability::{explain, ConfidenceLevel, Evidence, EvidenceType, Explanation};
pub use features::{extract, FeatureVector};
pub use history::{AnalysisRecord, HistoryAnalytics, HistorySink, JsonlHistory, MemoryHistory};
pub use knowledge::{KnowledgeBase, KnowledgeEvidence};
pub use predictor::{FallbackPredictor, FallbackRules, ModelId, ModelVerdict, Predictor, UsageMetrics};
pub use provider::{ExternalModels, HttpModelProvider, ModelProvider, NoModels};
pub use sources::{EvidenceSource, MultiSourceReport, MultiSourceVerifier, SourceFinding};
pub use verifier::{VerificationReport, Verifier, VerifyOptions};
