// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Linguistic feature extraction for claims
//!
//! Features are computed once per claim and shared by the calibrator and
//! the explanation generator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Phrases that attribute a claim to a study or authority
pub const CREDIBILITY_PHRASES: &[&str] = &[
    "according to",
    "study shows",
    "research indicates",
    "scientists say",
];

/// Words typical of sensationalist headlines
pub const SENSATIONAL_WORDS: &[&str] = &["breaking", "urgent", "secret", "shocking", "unbelievable"];

/// Clickbait phrasing
pub const CLICKBAIT_PHRASES: &[&str] = &[
    "you won't believe",
    "what happened next",
    "everyone is talking about",
];

/// Numeric features derived from a claim's text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Total character count
    pub text_length: f64,
    /// Whitespace-separated word count
    pub word_count: f64,
    /// Segments separated by runs of `.`, `!` or `?`
    pub sentence_count: f64,
    pub avg_word_length: f64,
    pub exclamation_count: f64,
    pub question_count: f64,
    /// Uppercase letters over alphabetic letters
    pub uppercase_ratio: f64,
    /// Distinct credibility phrases present
    pub credibility_indicators: f64,
    /// Distinct sensational words present
    pub sensationalism_score: f64,
    /// Distinct clickbait phrases present
    pub clickbait_score: f64,
}

impl FeatureVector {
    /// Named view of every feature, sorted by name
    pub fn as_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("text_length", self.text_length),
            ("word_count", self.word_count),
            ("sentence_count", self.sentence_count),
            ("avg_word_length", self.avg_word_length),
            ("exclamation_count", self.exclamation_count),
            ("question_count", self.question_count),
            ("uppercase_ratio", self.uppercase_ratio),
            ("credibility_indicators", self.credibility_indicators),
            ("sensationalism_score", self.sensationalism_score),
            ("clickbait_score", self.clickbait_score),
        ])
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.as_map().get(name).copied()
    }
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence boundary pattern is valid"))
}

/// Count how many of `phrases` occur in already lower-cased `text`
fn count_present(text_lower: &str, phrases: &[&str]) -> f64 {
    phrases.iter().filter(|p| text_lower.contains(*p)).count() as f64
}

/// Extract the feature vector for a claim
pub fn extract(text: &str) -> FeatureVector {
    let text_lower = text.to_lowercase();
    let words: Vec<&str> = text.split_whitespace().collect();

    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let uppercase = text.chars().filter(|c| c.is_uppercase()).count();
    let uppercase_ratio = if letters == 0 {
        0.0
    } else {
        uppercase as f64 / letters as f64
    };

    let avg_word_length = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64
    };

    FeatureVector {
        text_length: text.chars().count() as f64,
        word_count: words.len() as f64,
        sentence_count: sentence_boundary().split(text).count() as f64,
        avg_word_length,
        exclamation_count: text.matches('!').count() as f64,
        question_count: text.matches('?').count() as f64,
        uppercase_ratio,
        credibility_indicators: count_present(&text_lower, CREDIBILITY_PHRASES),
        sensationalism_score: count_present(&text_lower, SENSATIONAL_WORDS),
        clickbait_score: count_present(&text_lower, CLICKBAIT_PHRASES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_counts() {
        let features = extract("The earth is flat.");
        assert_eq!(features.text_length, 18.0);
        assert_eq!(features.word_count, 4.0);
        // trailing empty segment after the final period is counted
        assert_eq!(features.sentence_count, 2.0);
        assert_eq!(features.exclamation_count, 0.0);
        assert_eq!(features.sensationalism_score, 0.0);
    }

    #[test]
    fn test_sensational_and_credibility() {
        let features = extract(
            "BREAKING: shocking secret revealed! According to insiders, scientists say it is urgent!!",
        );
        assert_eq!(features.sensationalism_score, 4.0);
        assert_eq!(features.credibility_indicators, 2.0);
        assert_eq!(features.exclamation_count, 3.0);
        assert!(features.uppercase_ratio > 0.0);
    }

    #[test]
    fn test_phrases_count_once() {
        let features = extract("breaking breaking breaking");
        assert_eq!(features.sensationalism_score, 1.0);
    }

    #[test]
    fn test_clickbait() {
        let features = extract("You won't believe what happened next");
        assert_eq!(features.clickbait_score, 2.0);
    }

    #[test]
    fn test_uppercase_ratio_without_letters() {
        let features = extract("123 456 !!!");
        assert_eq!(features.uppercase_ratio, 0.0);
        assert_eq!(features.word_count, 3.0);
    }

    #[test]
    fn test_named_lookup() {
        let features = extract("Is this real?");
        assert_eq!(features.get("question_count"), Some(1.0));
        assert_eq!(features.get("word_count"), Some(3.0));
        assert_eq!(features.get("nonexistent"), None);
        assert_eq!(features.as_map().len(), 10);
    }
}
