// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Static knowledge rules
//!
//! A small table of regex fact patterns, a list of well-known contradictions,
//! curated fact checks, and simple text heuristics (credibility score,
//! topical domain, entity extraction). The result is reported alongside the
//! ensemble verdict; it does not feed the vote.

use crate::claims::Verdict;
use crate::error::{VerifyError, VerifyResult};
use crate::explainability::{Evidence, EvidenceType};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Uncompiled fact pattern, as stored in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRule {
    pub category: String,
    pub name: String,
    pub pattern: String,
    pub verdict: Verdict,
    pub confidence: f64,
}

impl FactRule {
    fn new(category: &str, name: &str, pattern: &str, verdict: Verdict, confidence: f64) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            pattern: pattern.to_string(),
            verdict,
            confidence,
        }
    }
}

/// Built-in fact patterns
pub fn default_fact_patterns() -> Vec<FactRule> {
    vec![
        FactRule::new("scientific", "earth_shape", r"earth.*flat|flat.*earth", Verdict::False, 0.95),
        FactRule::new(
            "scientific",
            "climate_change",
            r"climate change.*real|global warming.*real",
            Verdict::True,
            0.98,
        ),
        FactRule::new("scientific", "moon_landing", r"moon landing.*fake|never.*moon", Verdict::False, 0.99),
        FactRule::new("scientific", "vaccines", r"vaccines.*autism|vaccine.*cause", Verdict::False, 0.97),
        FactRule::new("historical", "ww2_end", r"world war.*ended.*1945", Verdict::True, 0.99),
        FactRule::new("historical", "holocaust", r"holocaust.*fake|never.*happened", Verdict::False, 0.99),
        FactRule::new("health", "covid_masks", r"masks.*don't work.*covid", Verdict::False, 0.90),
        FactRule::new("health", "vitamin_c", r"vitamin c.*cure.*covid", Verdict::False, 0.85),
    ]
}

#[derive(Debug, Clone)]
struct FactPattern {
    rule: FactRule,
    regex: Regex,
}

impl FactPattern {
    fn compile(rule: FactRule) -> VerifyResult<Self> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| VerifyError::Config(format!("fact pattern '{}' is invalid: {}", rule.name, e)))?;
        Ok(Self { rule, regex })
    }
}

static BUILTIN_PATTERNS: LazyLock<Vec<FactPattern>> = LazyLock::new(|| {
    default_fact_patterns()
        .into_iter()
        .map(|rule| FactPattern::compile(rule).expect("builtin fact pattern is valid"))
        .collect()
});

/// Well-known misinformation and the established fact it contradicts
static CONTRADICTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)flat.*earth").unwrap(),
            "The Earth is an oblate spheroid, not flat",
        ),
        (
            Regex::new(r"(?i)moon.*landing.*fake").unwrap(),
            "The Apollo moon landings are well-documented historical events",
        ),
        (
            Regex::new(r"(?i)vaccin.*autism").unwrap(),
            "Numerous studies have found no link between vaccines and autism",
        ),
    ]
});

/// Terms that count as entities even when lower-cased
const DOMAIN_TERMS: &[&str] = &[
    "covid",
    "vaccine",
    "climate",
    "earth",
    "moon",
    "nasa",
    "government",
    "study",
    "research",
    "scientists",
    "doctor",
    "expert",
    "university",
    "virus",
    "mask",
    "lockdown",
    "wuhan",
    "who",
    "cdc",
];

const INSIGNIFICANT_ENTITIES: &[&str] = &["The", "This", "That", "These", "Those", "There"];

const DOMAINS: &[(&str, &[&str])] = &[
    ("health", &["covid", "virus", "vaccine", "mask", "pandemic"]),
    ("environment", &["climate", "warming", "environment", "carbon"]),
    ("science", &["earth", "moon", "space", "nasa", "planet"]),
    ("politics", &["government", "politic", "election", "law"]),
];

/// A fact pattern that matched the claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub category: String,
    pub fact: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub explanation: String,
}

/// Curated fact-check entry that applies to the claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheck {
    pub claim: String,
    pub verdict: Verdict,
    pub explanation: String,
    pub sources: Vec<String>,
    pub confidence: f64,
}

/// Topical domains the claim touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    pub domains: Vec<String>,
    /// First matching domain, or `general`
    pub primary_domain: String,
}

/// Everything the knowledge rules found for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEvidence {
    pub supporting_facts: Vec<String>,
    pub contradicting_facts: Vec<String>,
    pub related_entities: Vec<String>,
    /// In `[0.1, 0.95]`
    pub confidence: f64,
    pub sources: Vec<String>,
    pub pattern_matches: Vec<PatternMatch>,
    pub fact_checks: Vec<FactCheck>,
    pub credibility_score: f64,
    pub domain: DomainAnalysis,
}

impl KnowledgeEvidence {
    /// Verdict of the most confident pattern match, if any
    pub fn suggested_verdict(&self) -> Option<Verdict> {
        self.pattern_matches
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|m| m.verdict)
    }

    /// Evidence entries for an explanation
    pub fn to_evidence(&self) -> Vec<Evidence> {
        let mut evidence = Vec::new();

        for m in &self.pattern_matches {
            evidence.push(Evidence {
                evidence_type: EvidenceType::KnowledgeRule,
                description: format!("{} ({}: {})", m.explanation, m.fact, m.verdict),
                weight: m.confidence,
                span: None,
                source: "knowledge_base".to_string(),
            });
        }
        for fact in &self.contradicting_facts {
            evidence.push(Evidence {
                evidence_type: EvidenceType::Contradiction,
                description: format!("Contradicts established fact: {}", fact),
                weight: 0.9,
                span: None,
                source: "knowledge_base".to_string(),
            });
        }
        for check in &self.fact_checks {
            evidence.push(Evidence {
                evidence_type: EvidenceType::FactCheck,
                description: format!("Fact check '{}' rated {}: {}", check.claim, check.verdict, check.explanation),
                weight: check.confidence,
                span: None,
                source: check.sources.join(", "),
            });
        }

        evidence
    }
}

/// Static fact-pattern knowledge base
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    patterns: Vec<FactPattern>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    /// Knowledge base with the built-in patterns
    pub fn new() -> Self {
        Self {
            patterns: BUILTIN_PATTERNS.clone(),
        }
    }

    /// Knowledge base with a custom pattern table
    pub fn with_patterns(rules: Vec<FactRule>) -> VerifyResult<Self> {
        let patterns = rules
            .into_iter()
            .map(FactPattern::compile)
            .collect::<VerifyResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Fact patterns matching the claim, in table order
    pub fn match_patterns(&self, text: &str) -> Vec<PatternMatch> {
        self.patterns
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| PatternMatch {
                category: p.rule.category.clone(),
                fact: p.rule.name.clone(),
                verdict: p.rule.verdict,
                confidence: p.rule.confidence,
                explanation: format!("Matches known {} fact pattern", p.rule.category),
            })
            .collect()
    }

    /// Verify a claim against the rules
    pub fn verify(&self, text: &str) -> KnowledgeEvidence {
        let pattern_matches = self.match_patterns(text);
        let contradicting_facts = contradictions(text);
        let fact_checks = fact_checks(text);

        let confidence = match pattern_matches.iter().map(|m| m.confidence).reduce(f64::max) {
            Some(best) => best,
            None => 0.5 - 0.15 * contradicting_facts.len() as f64,
        };

        let supporting_facts = pattern_matches
            .iter()
            .filter(|m| m.verdict == Verdict::True)
            .map(|m| format!("Consistent with established {} fact: {}", m.category, m.fact))
            .take(3)
            .collect();

        let mut sources: Vec<String> = Vec::new();
        for source in fact_checks.iter().flat_map(|c| c.sources.iter()) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources.truncate(3);

        tracing::debug!(
            "Knowledge rules: {} pattern matches, {} contradictions",
            pattern_matches.len(),
            contradicting_facts.len()
        );

        KnowledgeEvidence {
            supporting_facts,
            contradicting_facts: contradicting_facts.into_iter().take(3).collect(),
            related_entities: extract_entities(text).into_iter().take(5).collect(),
            confidence: confidence.clamp(0.1, 0.95),
            sources,
            pattern_matches,
            fact_checks,
            credibility_score: credibility_score(text),
            domain: analyze_domain(text),
        }
    }
}

fn contradictions(text: &str) -> Vec<String> {
    CONTRADICTIONS
        .iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, fact)| fact.to_string())
        .collect()
}

fn fact_checks(text: &str) -> Vec<FactCheck> {
    let lower = text.to_lowercase();
    let has = |term: &str| lower.contains(term);
    let check = |claim: &str, explanation: &str, sources: &[&str], confidence: f64| FactCheck {
        claim: claim.to_string(),
        verdict: Verdict::False,
        explanation: explanation.to_string(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        confidence,
    };

    let mut checks = Vec::new();
    if has("earth") && has("flat") {
        checks.push(check(
            "Earth is flat",
            "Overwhelming scientific evidence shows Earth is spherical",
            &["NASA", "NOAA", "Scientific consensus"],
            0.99,
        ));
    }
    if has("vaccin") && has("autism") {
        checks.push(check(
            "Vaccines cause autism",
            "Multiple large-scale studies found no link between vaccines and autism",
            &["CDC", "WHO", "The Lancet (retracted original study)"],
            0.98,
        ));
    }
    if has("moon") && has("landing") && has("fake") {
        checks.push(check(
            "Moon landing was faked",
            "Multiple lines of evidence confirm the Apollo moon landings",
            &["NASA", "Independent scientists", "Lunar laser ranging"],
            0.99,
        ));
    }
    checks
}

/// Heuristic source-quality score in `[0.1, 1.0]`
pub fn credibility_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    let mut score = 0.5;
    if any(&["according to study", "research shows", "scientists found"]) {
        score += 0.3;
    }
    if any(&["peer-reviewed", "journal", "university"]) {
        score += 0.2;
    }
    if any(&["breaking", "urgent", "secret", "they don't want you to know"]) {
        score -= 0.3;
    }
    if lower.matches('!').count() > 2 {
        score -= 0.1;
    }
    f64::clamp(score, 0.1, 1.0)
}

pub fn analyze_domain(text: &str) -> DomainAnalysis {
    let lower = text.to_lowercase();
    let domains: Vec<String> = DOMAINS
        .iter()
        .filter(|(_, terms)| terms.iter().any(|t| lower.contains(t)))
        .map(|(name, _)| name.to_string())
        .collect();
    let primary_domain = domains.first().cloned().unwrap_or_else(|| "general".to_string());
    DomainAnalysis {
        domains,
        primary_domain,
    }
}

fn flush_entity(current: &mut Vec<&str>, entities: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let entity = current.join(" ");
    current.clear();
    let significant = entity.chars().count() > 2 && !INSIGNIFICANT_ENTITIES.contains(&entity.as_str());
    if significant && !entities.contains(&entity) {
        entities.push(entity);
    }
}

/// Runs of capitalised words or domain terms, deduplicated in order of appearance
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        let cleaned = word
            .trim_matches(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '"' | '(' | ')'))
            .to_lowercase();
        let capitalised = word.chars().next().is_some_and(char::is_uppercase) && word.chars().count() > 1;
        if capitalised || DOMAIN_TERMS.contains(&cleaned.as_str()) {
            current.push(word);
        } else {
            flush_entity(&mut current, &mut entities);
        }
    }
    flush_entity(&mut current, &mut entities);

    entities
}
