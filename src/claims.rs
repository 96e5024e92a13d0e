// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Verdict labels, claims and probability distributions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{VerifyError, VerifyResult};

/// Four-way verdict for a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Supported by credible evidence
    True,
    /// Contradicted by reliable sources
    False,
    /// Partially true but presented deceptively
    Misleading,
    /// Insufficient evidence for an assessment
    Unverifiable,
}

impl Verdict {
    /// Fixed enumeration order used for iteration, tie-breaking and counterfactuals
    pub const ALL: [Verdict; 4] = [
        Verdict::True,
        Verdict::False,
        Verdict::Misleading,
        Verdict::Unverifiable,
    ];

    /// Classifier head order: index 0 = false, 1 = true, 2 = misleading, 3 = unverifiable
    pub const CLASS_ORDER: [Verdict; 4] = [
        Verdict::False,
        Verdict::True,
        Verdict::Misleading,
        Verdict::Unverifiable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Misleading => "misleading",
            Verdict::Unverifiable => "unverifiable",
        }
    }

    /// Map a classifier output index to a verdict, defaulting to unverifiable
    pub fn from_class_index(index: usize) -> Self {
        Self::CLASS_ORDER
            .get(index)
            .copied()
            .unwrap_or(Verdict::Unverifiable)
    }

    /// Position in [`Verdict::ALL`]
    fn slot(&self) -> usize {
        match self {
            Verdict::True => 0,
            Verdict::False => 1,
            Verdict::Misleading => 2,
            Verdict::Unverifiable => 3,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verdict {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" => Ok(Verdict::True),
            "false" => Ok(Verdict::False),
            "misleading" => Ok(Verdict::Misleading),
            "unverifiable" => Ok(Verdict::Unverifiable),
            other => Err(VerifyError::InvalidInput(format!("unknown verdict '{}'", other))),
        }
    }
}

/// Probability mass over the four verdicts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Verdict, f64>", into = "BTreeMap<Verdict, f64>")]
pub struct Distribution {
    probs: [f64; 4],
}

impl Distribution {
    /// All mass on zero; used as the accumulator for weighted voting
    pub fn zero() -> Self {
        Self::default()
    }

    /// `confidence` on `chosen`, the residual split equally over the other three labels
    pub fn peaked(chosen: Verdict, confidence: f64) -> Self {
        let residual = (1.0 - confidence) / 3.0;
        let mut dist = Self::zero();
        for verdict in Verdict::ALL {
            let p = if verdict == chosen { confidence } else { residual };
            dist.set(verdict, p);
        }
        dist
    }

    /// Build from classifier head order (false, true, misleading, unverifiable)
    pub fn from_class_probs(probs: [f64; 4]) -> Self {
        let mut dist = Self::zero();
        for (index, p) in probs.iter().enumerate() {
            dist.set(Verdict::from_class_index(index), *p);
        }
        dist
    }

    pub fn get(&self, verdict: Verdict) -> f64 {
        self.probs[verdict.slot()]
    }

    pub fn set(&mut self, verdict: Verdict, probability: f64) {
        self.probs[verdict.slot()] = probability;
    }

    pub fn add(&mut self, verdict: Verdict, amount: f64) {
        self.probs[verdict.slot()] += amount;
    }

    pub fn total(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// Iterate in [`Verdict::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (Verdict, f64)> + '_ {
        Verdict::ALL.iter().map(move |v| (*v, self.get(*v)))
    }

    /// Largest entry; the earliest label in enumeration order wins ties
    pub fn argmax(&self) -> (Verdict, f64) {
        let mut best = (Verdict::ALL[0], self.get(Verdict::ALL[0]));
        for (verdict, p) in self.iter().skip(1) {
            if p > best.1 {
                best = (verdict, p);
            }
        }
        best
    }
}

impl From<BTreeMap<Verdict, f64>> for Distribution {
    fn from(map: BTreeMap<Verdict, f64>) -> Self {
        let mut dist = Self::zero();
        for (verdict, p) in map {
            dist.set(verdict, p);
        }
        dist
    }
}

impl From<Distribution> for BTreeMap<Verdict, f64> {
    fn from(dist: Distribution) -> Self {
        dist.iter().collect()
    }
}

/// A natural-language statement submitted for verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    text: String,
    /// Caller-supplied submission time
    submitted_at: Option<DateTime<Utc>>,
}

impl Claim {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            submitted_at: None,
        }
    }

    pub fn with_timestamp(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(submitted_at);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Reject empty or oversized input before it enters the pipeline
    pub fn validate(&self, max_chars: usize) -> VerifyResult<()> {
        if self.text.trim().is_empty() {
            return Err(VerifyError::InvalidInput("claim text is empty".to_string()));
        }
        let chars = self.text.chars().count();
        if chars > max_chars {
            return Err(VerifyError::InvalidInput(format!(
                "claim text has {} characters, maximum is {}",
                chars, max_chars
            )));
        }
        Ok(())
    }

    /// Whitespace-normalized text
    pub fn normalized(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// SHA-256 of the normalized text, hex encoded
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.normalized().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_mapping() {
        assert_eq!(Verdict::from_class_index(0), Verdict::False);
        assert_eq!(Verdict::from_class_index(1), Verdict::True);
        assert_eq!(Verdict::from_class_index(2), Verdict::Misleading);
        assert_eq!(Verdict::from_class_index(3), Verdict::Unverifiable);
        assert_eq!(Verdict::from_class_index(9), Verdict::Unverifiable);
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!("FALSE".parse::<Verdict>().unwrap(), Verdict::False);
        assert_eq!(" misleading ".parse::<Verdict>().unwrap(), Verdict::Misleading);
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_peaked_distribution_sums_to_one() {
        for verdict in Verdict::ALL {
            for confidence in [0.65, 0.75, 0.88, 0.92] {
                let dist = Distribution::peaked(verdict, confidence);
                assert!((dist.total() - 1.0).abs() < 1e-6);
                assert_eq!(dist.get(verdict), confidence);
                assert_eq!(dist.argmax().0, verdict);
            }
        }
    }

    #[test]
    fn test_argmax_tie_prefers_enumeration_order() {
        let dist = Distribution::zero();
        assert_eq!(dist.argmax(), (Verdict::True, 0.0));

        let mut dist = Distribution::zero();
        dist.set(Verdict::Misleading, 0.4);
        dist.set(Verdict::False, 0.4);
        assert_eq!(dist.argmax().0, Verdict::False);
    }

    #[test]
    fn test_distribution_serializes_as_map() {
        let dist = Distribution::from_class_probs([0.1, 0.6, 0.2, 0.1]);
        let json = serde_json::to_value(dist).unwrap();
        assert_eq!(json["true"], 0.6);
        assert_eq!(json["false"], 0.1);

        let back: Distribution = serde_json::from_value(json).unwrap();
        assert_eq!(back, dist);
    }

    #[test]
    fn test_claim_validation() {
        assert!(Claim::new("").validate(100).is_err());
        assert!(Claim::new("   \n\t").validate(100).is_err());
        assert!(Claim::new("abcdef").validate(5).is_err());
        assert!(Claim::new("The earth is round").validate(100).is_ok());
    }

    #[test]
    fn test_fingerprint_ignores_whitespace_layout() {
        let a = Claim::new("The  earth\nis round");
        let b = Claim::new(" The earth is round ");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_ne!(a.fingerprint(), Claim::new("The earth is flat").fingerprint());
    }
}
