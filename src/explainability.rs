// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Explanations for ensemble verdicts
//!
//! Provides:
//! - Verdict and confidence narration
//! - Per-feature interpretation and key factors
//! - Reader recommendations and counterfactual targets
//! - Evidence attached from knowledge rules and evidence sources
//!
//! Everything here is deterministic and makes no external calls.

use crate::claims::{Claim, Verdict};
use crate::ensemble::EnsembleResult;
use crate::features::{FeatureVector, CLICKBAIT_PHRASES, SENSATIONAL_WORDS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Above 0.8
    High,
    /// 0.6 to 0.8 inclusive
    Medium,
    /// Below 0.6
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.8 {
            ConfidenceLevel::High
        } else if confidence >= 0.6 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of evidence that can accompany a verdict
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    /// Sensational or clickbait wording found in the claim
    LinguisticPattern,
    /// Static fact pattern matched
    KnowledgeRule,
    /// Established fact the claim contradicts
    Contradiction,
    /// Curated fact-check entry
    FactCheck,
    /// Finding from an external evidence source
    ExternalSource,
}

/// A span of the claim text, in byte offsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A single piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub evidence_type: EvidenceType,
    /// Human-readable description
    pub description: String,
    /// Weight of this evidence (0.0 to 1.0)
    pub weight: f64,
    pub span: Option<TextSpan>,
    /// Producer of the evidence (rule table, source name, ...)
    pub source: String,
}

/// One feature with its meaning and a reading of its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInsight {
    pub feature: String,
    pub value: f64,
    pub description: String,
    pub interpretation: String,
}

/// What the claim would need to receive a different verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub target_verdict: Verdict,
    pub modification_suggestion: String,
    pub explanation: String,
}

/// Complete explanation for a verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub verdict: Verdict,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub verdict_explanation: String,
    pub reasoning: String,
    pub confidence_breakdown: Vec<String>,
    pub feature_analysis: Vec<FeatureInsight>,
    pub key_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub counterfactuals: Vec<Counterfactual>,
    pub evidence: Vec<Evidence>,
    /// Natural language summary
    pub summary: String,
}

impl Explanation {
    /// Attach evidence and refresh the summary
    pub fn add_evidence(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
        self.generate_summary();
    }

    pub fn extend_evidence(&mut self, evidence: impl IntoIterator<Item = Evidence>) {
        self.evidence.extend(evidence);
        self.generate_summary();
    }

    /// Evidence sorted by descending weight
    pub fn top_evidence(&self, n: usize) -> Vec<&Evidence> {
        let mut sorted: Vec<&Evidence> = self.evidence.iter().collect();
        sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        sorted.into_iter().take(n).collect()
    }

    /// Render the natural language summary
    pub fn generate_summary(&mut self) {
        let mut parts = vec![format!(
            "Verdict: {} ({} confidence, {:.1}%). {}",
            self.verdict,
            self.confidence_level,
            self.confidence * 100.0,
            self.reasoning
        )];

        let top = self.top_evidence(3);
        if !top.is_empty() {
            parts.push("Key evidence:".to_string());
            for ev in top {
                parts.push(format!("  • {}", ev.description));
            }
        }

        let notable: Vec<&String> = self
            .key_factors
            .iter()
            .filter(|f| f.as_str() != STANDARD_PATTERNS)
            .collect();
        if !notable.is_empty() {
            parts.push("Key factors:".to_string());
            for factor in notable {
                parts.push(format!("  • {}", factor));
            }
        }

        self.summary = parts.join("\n");
    }
}

const STANDARD_PATTERNS: &str = "Standard linguistic patterns";

fn verdict_explanation(verdict: Verdict, level: ConfidenceLevel) -> String {
    match verdict {
        Verdict::True => format!("The statement appears to be factually accurate with {} confidence.", level),
        Verdict::False => format!("The statement contains factual inaccuracies with {} confidence.", level),
        Verdict::Misleading => format!(
            "The statement is partially true but contains misleading elements with {} confidence.",
            level
        ),
        Verdict::Unverifiable => "The statement cannot be reliably verified with available information.".to_string(),
    }
}

fn reasoning(verdict: Verdict, confidence: f64, features: &FeatureVector) -> String {
    let mut parts = vec![match verdict {
        Verdict::True => "Supported by credible evidence and factual accuracy.",
        Verdict::False => "Contradicted by reliable sources and factual evidence.",
        Verdict::Misleading => "Contains elements of truth but presented deceptively.",
        Verdict::Unverifiable => "Insufficient reliable evidence for definitive assessment.",
    }];

    if confidence > 0.8 {
        parts.push("High confidence due to clear linguistic signals and model consensus.");
    } else if confidence < 0.6 {
        parts.push("Lower confidence suggests ambiguous or mixed evidence.");
    }
    if features.sensationalism_score > 2.0 {
        parts.push("Sensational language detected.");
    }
    if features.credibility_indicators > 0.0 {
        parts.push("Credible sourcing language present.");
    }

    parts.join(" ")
}

fn confidence_breakdown(confidence: f64, features: &FeatureVector) -> Vec<String> {
    let mut factors = Vec::new();

    if features.word_count < 10.0 {
        factors.push("Low confidence due to very short text length");
    }
    if features.sensationalism_score > 3.0 {
        factors.push("Reduced confidence due to sensational language");
    }
    if features.exclamation_count > 2.0 {
        factors.push("Multiple exclamation marks may indicate emotional bias");
    }
    if features.uppercase_ratio > 0.3 {
        factors.push("High uppercase ratio may indicate sensationalism");
    }
    if confidence > 0.8 {
        factors.push("High confidence due to clear linguistic patterns");
    } else if confidence < 0.5 {
        factors.push("Low confidence suggests ambiguous or contradictory information");
    }

    factors.into_iter().map(String::from).collect()
}

fn feature_description(feature: &str) -> &'static str {
    match feature {
        "text_length" => "Total character count in the text",
        "word_count" => "Total number of words",
        "sentence_count" => "Number of sentence segments",
        "avg_word_length" => "Average length of words",
        "exclamation_count" => "Number of exclamation marks",
        "question_count" => "Number of question marks",
        "uppercase_ratio" => "Share of letters that are uppercase",
        "credibility_indicators" => "Count of attribution phrases such as 'according to'",
        "sensationalism_score" => "Count of sensational words",
        "clickbait_score" => "Count of clickbait phrases",
        _ => "Unknown feature",
    }
}

fn interpret(feature: &str, value: f64) -> String {
    let reading = match feature {
        "sensationalism_score" => {
            let level = if value > 2.0 {
                "High"
            } else if value > 1.0 {
                "Medium"
            } else {
                "Low"
            };
            return format!("{} sensational language detected", level);
        }
        "word_count" if value < 15.0 => "Too short",
        "word_count" if value < 100.0 => "Adequate",
        "word_count" => "Very detailed",
        "uppercase_ratio" if value < 0.1 => "Normal",
        "uppercase_ratio" if value < 0.3 => "Elevated",
        "uppercase_ratio" => "Very high",
        "credibility_indicators" if value > 0.0 => "Attributes the claim to a source",
        "clickbait_score" if value > 0.0 => "Clickbait phrasing present",
        _ => "Within normal range",
    };
    reading.to_string()
}

fn feature_analysis(features: &FeatureVector) -> Vec<FeatureInsight> {
    features
        .as_map()
        .into_iter()
        .map(|(name, value)| FeatureInsight {
            feature: name.to_string(),
            value,
            description: feature_description(name).to_string(),
            interpretation: interpret(name, value),
        })
        .collect()
}

fn key_factors(features: &FeatureVector) -> Vec<String> {
    let mut factors = Vec::new();

    if features.sensationalism_score >= 2.0 {
        factors.push("Sensational language usage");
    }
    if features.exclamation_count >= 2.0 {
        factors.push("Multiple exclamation marks");
    }
    if features.word_count < 10.0 {
        factors.push("Very short statement length");
    }
    if features.uppercase_ratio > 0.2 {
        factors.push("High uppercase letter ratio");
    }
    if factors.is_empty() {
        factors.push(STANDARD_PATTERNS);
    }

    factors.into_iter().map(String::from).collect()
}

fn recommendations(verdict: Verdict, confidence: f64, features: &FeatureVector) -> Vec<String> {
    let mut recs = Vec::new();

    if confidence < 0.7 {
        recs.push("Verify with additional reliable sources");
    }
    if matches!(verdict, Verdict::False | Verdict::Misleading) {
        recs.push("Be cautious about sharing this information");
        recs.push("Check official sources for confirmation");
    }
    if features.sensationalism_score > 2.0 {
        recs.push("Sensational language often indicates unreliable claims");
    }
    recs.push("Consider the source and context of the information");

    recs.into_iter().map(String::from).collect()
}

fn modification_for(target: Verdict) -> &'static str {
    match target {
        Verdict::True => {
            "More specific, verifiable details and credible sources. Include factual evidence and remove sensational language."
        }
        Verdict::False => {
            "Removal of sensational language, exaggeration, and unverified claims. Add specific factual inaccuracies."
        }
        Verdict::Misleading => {
            "Clearer context, less ambiguous wording, and balanced presentation of facts without omission of key information."
        }
        Verdict::Unverifiable => {
            "More specific claims that can be checked against reliable sources, or removal of speculative elements."
        }
    }
}

/// The first two other verdicts in enumeration order
fn counterfactuals(verdict: Verdict) -> Vec<Counterfactual> {
    Verdict::ALL
        .iter()
        .filter(|v| **v != verdict)
        .take(2)
        .map(|target| Counterfactual {
            target_verdict: *target,
            modification_suggestion: modification_for(*target).to_string(),
            explanation: format!("To be considered {}, the statement might need:", target),
        })
        .collect()
}

/// Locate sensational and clickbait wording in the claim
fn linguistic_evidence(text: &str) -> Vec<Evidence> {
    // ASCII lowering keeps byte offsets aligned with the original text
    let lowered = text.to_ascii_lowercase();
    let mut evidence = Vec::new();

    let patterns = SENSATIONAL_WORDS
        .iter()
        .map(|w| (*w, "Sensational wording", 0.6))
        .chain(CLICKBAIT_PHRASES.iter().map(|p| (*p, "Clickbait phrasing", 0.5)));

    for (phrase, kind, weight) in patterns {
        if let Some(start) = lowered.find(phrase) {
            let end = start + phrase.len();
            let matched = &text[start..end];
            evidence.push(Evidence {
                evidence_type: EvidenceType::LinguisticPattern,
                description: format!("{}: '{}'", kind, matched),
                weight,
                span: Some(TextSpan {
                    start,
                    end,
                    text: matched.to_string(),
                }),
                source: "linguistic_analyzer".to_string(),
            });
        }
    }

    evidence
}

/// Build the explanation for an ensemble result
pub fn explain(result: &EnsembleResult, features: &FeatureVector, claim: &Claim) -> Explanation {
    let level = ConfidenceLevel::from_confidence(result.confidence);
    let mut explanation = Explanation {
        verdict: result.verdict,
        confidence: result.confidence,
        confidence_level: level,
        verdict_explanation: verdict_explanation(result.verdict, level),
        reasoning: reasoning(result.verdict, result.confidence, features),
        confidence_breakdown: confidence_breakdown(result.confidence, features),
        feature_analysis: feature_analysis(features),
        key_factors: key_factors(features),
        recommendations: recommendations(result.verdict, result.confidence, features),
        counterfactuals: counterfactuals(result.verdict),
        evidence: linguistic_evidence(claim.text()),
        summary: String::new(),
    };
    explanation.generate_summary();
    explanation
}
