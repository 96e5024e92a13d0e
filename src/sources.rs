// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! External evidence sources
//!
//! Each source reports a stance on the claim. The bundled sources are
//! keyword tables standing in for an encyclopedia, a news index and a
//! fact-check site; anything implementing [`EvidenceSource`] can be plugged
//! in instead.

use crate::error::VerifyResult;
use crate::explainability::{Evidence, EvidenceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A source's position on a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Supported,
    Contradicted,
    Mixed,
    Unknown,
    /// The lookup failed
    Error,
}

impl Stance {
    /// Signed vote used in aggregation
    pub fn weight(&self) -> f64 {
        match self {
            Stance::Supported => 1.0,
            Stance::Contradicted => -1.0,
            Stance::Mixed | Stance::Unknown | Stance::Error => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Supported => "supported",
            Stance::Contradicted => "contradicted",
            Stance::Mixed => "mixed",
            Stance::Unknown => "unknown",
            Stance::Error => "error",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFinding {
    pub source: String,
    pub stance: Stance,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub url: String,
}

impl SourceFinding {
    fn error(source: &str) -> Self {
        Self {
            source: source.to_string(),
            stance: Stance::Error,
            confidence: 0.0,
            evidence: Vec::new(),
            url: String::new(),
        }
    }
}

/// Trait for evidence lookups
pub trait EvidenceSource: Send + Sync {
    fn name(&self) -> &str;

    fn lookup(&self, claim: &str) -> VerifyResult<SourceFinding>;
}

/// Keyword list mapped to a stance
#[derive(Debug, Clone)]
struct KeywordRule {
    keywords: &'static [&'static str],
    stance: Stance,
    confidence: f64,
    evidence: &'static str,
    url: &'static str,
}

/// Source answering from an ordered keyword table; the first matching rule wins
#[derive(Debug, Clone)]
pub struct KeywordSource {
    name: &'static str,
    rules: Vec<KeywordRule>,
    default: KeywordRule,
}

impl KeywordSource {
    pub fn encyclopedia() -> Self {
        Self {
            name: "wikipedia",
            rules: vec![
                KeywordRule {
                    keywords: &["earth", "round", "planet", "science"],
                    stance: Stance::Supported,
                    confidence: 0.8,
                    evidence: "Scientific consensus supports this claim",
                    url: "https://en.wikipedia.org/wiki/Earth",
                },
                KeywordRule {
                    keywords: &["breaking", "secret", "urgent", "shocking"],
                    stance: Stance::Contradicted,
                    confidence: 0.7,
                    evidence: "No reliable sources support this sensational claim",
                    url: "https://en.wikipedia.org",
                },
            ],
            default: KeywordRule {
                keywords: &[],
                stance: Stance::Mixed,
                confidence: 0.5,
                evidence: "Insufficient information for definitive verification",
                url: "https://en.wikipedia.org",
            },
        }
    }

    pub fn news() -> Self {
        Self {
            name: "news",
            rules: vec![
                KeywordRule {
                    keywords: &["covid", "vaccine", "health"],
                    stance: Stance::Supported,
                    confidence: 0.75,
                    evidence: "Multiple reputable health organizations confirm this",
                    url: "https://newsapi.org",
                },
                KeywordRule {
                    keywords: &["conspiracy", "secret", "government"],
                    stance: Stance::Contradicted,
                    confidence: 0.8,
                    evidence: "Fact-checkers have debunked similar claims",
                    url: "https://reuters.com",
                },
            ],
            default: KeywordRule {
                keywords: &[],
                stance: Stance::Unknown,
                confidence: 0.4,
                evidence: "Limited news coverage on this specific claim",
                url: "https://newsapi.org",
            },
        }
    }

    pub fn fact_check() -> Self {
        Self {
            name: "fact_check",
            rules: vec![
                KeywordRule {
                    keywords: &["true", "real", "fact"],
                    stance: Stance::Supported,
                    confidence: 0.85,
                    evidence: "Verified by multiple independent fact-checking organizations",
                    url: "https://snopes.com",
                },
                KeywordRule {
                    keywords: &["false", "fake", "hoax"],
                    stance: Stance::Contradicted,
                    confidence: 0.9,
                    evidence: "This claim has been rated false by fact-checkers",
                    url: "https://factcheck.org",
                },
            ],
            default: KeywordRule {
                keywords: &[],
                stance: Stance::Mixed,
                confidence: 0.6,
                evidence: "Some sources support, others contradict this claim",
                url: "https://snopes.com",
            },
        }
    }
}

impl EvidenceSource for KeywordSource {
    fn name(&self) -> &str {
        self.name
    }

    fn lookup(&self, claim: &str) -> VerifyResult<SourceFinding> {
        let lower = claim.to_lowercase();
        let rule = self
            .rules
            .iter()
            .find(|r| r.keywords.iter().any(|k| lower.contains(*k)))
            .unwrap_or(&self.default);

        Ok(SourceFinding {
            source: self.name.to_string(),
            stance: rule.stance,
            confidence: rule.confidence,
            evidence: vec![rule.evidence.to_string()],
            url: rule.url.to_string(),
        })
    }
}

/// Overall position of the consulted sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceVerdict {
    Supported,
    Contradicted,
    Mixed,
    Unverifiable,
}

impl fmt::Display for SourceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceVerdict::Supported => "supported",
            SourceVerdict::Contradicted => "contradicted",
            SourceVerdict::Mixed => "mixed",
            SourceVerdict::Unverifiable => "unverifiable",
        };
        f.write_str(s)
    }
}

/// Aggregated multi-source result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSourceReport {
    pub verdict: SourceVerdict,
    pub confidence: f64,
    /// Sources that answered without error
    pub sources_checked: usize,
    /// Every finding, failed lookups included
    pub findings: Vec<SourceFinding>,
}

impl MultiSourceReport {
    /// Evidence entries for an explanation, failed lookups excluded
    pub fn to_evidence(&self) -> Vec<Evidence> {
        self.findings
            .iter()
            .filter(|f| f.stance != Stance::Error)
            .map(|f| Evidence {
                evidence_type: EvidenceType::ExternalSource,
                description: format!("{} reports {}: {}", f.source, f.stance, f.evidence.join("; ")),
                weight: f.confidence,
                span: None,
                source: f.url.clone(),
            })
            .collect()
    }
}

/// Combine findings by confidence-weighted stance
pub fn aggregate(findings: Vec<SourceFinding>) -> MultiSourceReport {
    let valid: Vec<&SourceFinding> = findings.iter().filter(|f| f.stance != Stance::Error).collect();
    let total_weight: f64 = valid.iter().map(|f| f.confidence).sum();
    let weighted_sum: f64 = valid.iter().map(|f| f.stance.weight() * f.confidence).sum();
    let sources_checked = valid.len();

    let (verdict, confidence) = if valid.is_empty() || total_weight == 0.0 {
        (SourceVerdict::Unverifiable, 0.5)
    } else {
        let score = weighted_sum / total_weight;
        let verdict = if score > 0.3 {
            SourceVerdict::Supported
        } else if score < -0.3 {
            SourceVerdict::Contradicted
        } else {
            SourceVerdict::Mixed
        };
        (verdict, (score.abs() * 1.5).min(1.0))
    };

    MultiSourceReport {
        verdict,
        confidence,
        sources_checked,
        findings,
    }
}

/// Queries every source and aggregates their stances
pub struct MultiSourceVerifier {
    sources: Vec<Box<dyn EvidenceSource>>,
}

impl Default for MultiSourceVerifier {
    fn default() -> Self {
        Self::new(vec![
            Box::new(KeywordSource::encyclopedia()),
            Box::new(KeywordSource::news()),
            Box::new(KeywordSource::fact_check()),
        ])
    }
}

impl MultiSourceVerifier {
    pub fn new(sources: Vec<Box<dyn EvidenceSource>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn verify(&self, claim: &str) -> MultiSourceReport {
        let findings = self
            .sources
            .iter()
            .map(|source| match source.lookup(claim) {
                Ok(finding) => finding,
                Err(e) => {
                    tracing::warn!("Evidence source {} failed: {}", source.name(), e);
                    SourceFinding::error(source.name())
                }
            })
            .collect();
        aggregate(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerifyError;

    struct Failing;

    impl EvidenceSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn lookup(&self, _claim: &str) -> VerifyResult<SourceFinding> {
            Err(VerifyError::Provider("source offline".to_string()))
        }
    }

    fn finding(stance: Stance, confidence: f64) -> SourceFinding {
        SourceFinding {
            source: "test".to_string(),
            stance,
            confidence,
            evidence: Vec::new(),
            url: String::new(),
        }
    }

    #[test]
    fn test_keyword_sources() {
        let wiki = KeywordSource::encyclopedia().lookup("The earth is round").unwrap();
        assert_eq!((wiki.stance, wiki.confidence), (Stance::Supported, 0.8));

        let news = KeywordSource::news().lookup("A government conspiracy").unwrap();
        assert_eq!((news.stance, news.confidence), (Stance::Contradicted, 0.8));

        let fc = KeywordSource::fact_check().lookup("Cats sleep").unwrap();
        assert_eq!((fc.stance, fc.confidence), (Stance::Mixed, 0.6));
    }

    #[test]
    fn test_aggregate_supported() {
        // (0.8 + 0.85 - 0) / (0.8 + 0.4 + 0.85) = 0.8049
        let verifier = MultiSourceVerifier::default();
        let report = verifier.verify("The earth is round, that is a fact");
        assert_eq!(report.verdict, SourceVerdict::Supported);
        assert_eq!(report.sources_checked, 3);
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_aggregate_mixed_score() {
        let report = aggregate(vec![finding(Stance::Supported, 0.5), finding(Stance::Mixed, 0.5)]);
        assert_eq!(report.verdict, SourceVerdict::Supported);
        assert!((report.confidence - 0.75).abs() < 1e-12);

        let report = aggregate(vec![finding(Stance::Contradicted, 0.2), finding(Stance::Mixed, 0.8)]);
        assert_eq!(report.verdict, SourceVerdict::Mixed);
        assert!((report.confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_no_valid_findings() {
        let report = aggregate(vec![]);
        assert_eq!(report.verdict, SourceVerdict::Unverifiable);
        assert_eq!(report.confidence, 0.5);

        let report = aggregate(vec![finding(Stance::Supported, 0.0)]);
        assert_eq!(report.verdict, SourceVerdict::Unverifiable);
        assert_eq!(report.confidence, 0.5);
    }

    #[test]
    fn test_failed_source_becomes_error_finding() {
        let verifier = MultiSourceVerifier::new(vec![Box::new(Failing), Box::new(KeywordSource::fact_check())]);
        let report = verifier.verify("This is a hoax");

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].stance, Stance::Error);
        assert_eq!(report.sources_checked, 1);
        assert_eq!(report.verdict, SourceVerdict::Contradicted);
        assert_eq!(report.to_evidence().len(), 1);
    }

    #[test]
    fn test_all_sources_failing() {
        let verifier = MultiSourceVerifier::new(vec![Box::new(Failing)]);
        let report = verifier.verify("anything");
        assert_eq!(report.verdict, SourceVerdict::Unverifiable);
        assert_eq!(report.sources_checked, 0);
    }
}
