// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Analysis history
//!
//! Every verification can be appended to a history sink. Writes are
//! fire-and-forget from the verifier's point of view: a failing sink is
//! logged and never fails the verification.

use crate::claims::Verdict;
use crate::error::{VerifyError, VerifyResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One stored verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: DateTime<Utc>,
    pub statement: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub model_used: String,
    pub fingerprint: String,
}

/// Trait for history backends
pub trait HistorySink: Send + Sync {
    /// Append one record
    fn record(&self, record: &AnalysisRecord) -> VerifyResult<()>;

    /// All stored records, oldest first
    fn records(&self) -> VerifyResult<Vec<AnalysisRecord>>;
}

/// In-memory history
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, record: &AnalysisRecord) -> VerifyResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn records(&self) -> VerifyResult<Vec<AnalysisRecord>> {
        Ok(self.records.lock().clone())
    }
}

/// History stored as one JSON object per line
#[derive(Debug)]
pub struct JsonlHistory {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonlHistory {
    /// Open for appending, creating the file and its parent directory if needed
    pub fn open(path: impl AsRef<Path>) -> VerifyResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| VerifyError::History(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VerifyError::History(format!("cannot open {}: {}", path.display(), e)))?;

        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for JsonlHistory {
    fn record(&self, record: &AnalysisRecord) -> VerifyResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self.writer.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn records(&self) -> VerifyResult<Vec<AnalysisRecord>> {
        read_jsonl(&self.path)
    }
}

/// Read a history file; unparseable lines are skipped with a warning
pub fn read_jsonl(path: &Path) -> VerifyResult<Vec<AnalysisRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VerifyError::History(format!("cannot read {}: {}", path.display(), e))),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line?;
        let parsed = std::str::from_utf8(&line)
            .map_err(|e| e.to_string())
            .and_then(|text| match text.trim() {
                "" => Ok(None),
                text => serde_json::from_str::<AnalysisRecord>(text)
                    .map(Some)
                    .map_err(|e| e.to_string()),
            });
        match parsed {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping history line {} in {}: {}", index + 1, path.display(), e),
        }
    }
    Ok(records)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictCount {
    pub verdict: Verdict,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCount {
    pub model_used: String,
    pub count: usize,
}

/// Summary statistics over the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAnalytics {
    pub total_analyses: usize,
    /// Mean confidence as a percentage, two decimals
    pub avg_confidence: f64,
    /// Most frequent verdict first
    pub verdict_distribution: Vec<VerdictCount>,
    /// Most used model first
    pub count_by_model: Vec<ModelCount>,
    /// Newest first
    pub recent: Vec<AnalysisRecord>,
}

impl HistoryAnalytics {
    pub fn from_records(records: &[AnalysisRecord], recent_limit: usize) -> Self {
        let total_analyses = records.len();
        let avg_confidence = if records.is_empty() {
            0.0
        } else {
            let mean = records.iter().map(|r| r.confidence).sum::<f64>() / total_analyses as f64;
            (mean * 100.0 * 100.0).round() / 100.0
        };

        let mut verdict_distribution: Vec<VerdictCount> = Verdict::ALL
            .iter()
            .map(|v| VerdictCount {
                verdict: *v,
                count: records.iter().filter(|r| r.verdict == *v).count(),
            })
            .filter(|vc| vc.count > 0)
            .collect();
        // stable sort keeps enumeration order among equal counts
        verdict_distribution.sort_by(|a, b| b.count.cmp(&a.count));

        let mut by_model: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records {
            *by_model.entry(record.model_used.as_str()).or_default() += 1;
        }
        let mut count_by_model: Vec<ModelCount> = by_model
            .into_iter()
            .map(|(model_used, count)| ModelCount {
                model_used: model_used.to_string(),
                count,
            })
            .collect();
        count_by_model.sort_by(|a, b| b.count.cmp(&a.count));

        let mut recent = records.to_vec();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(recent_limit);

        Self {
            total_analyses,
            avg_confidence,
            verdict_distribution,
            count_by_model,
            recent,
        }
    }

    /// Format as human-readable string
    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str("Analysis History\n================\n");
        out.push_str(&format!("Total analyses:      {}\n", self.total_analyses));
        out.push_str(&format!("Average confidence:  {:.2}%\n", self.avg_confidence));

        out.push_str("\nVerdict distribution:\n");
        for vc in &self.verdict_distribution {
            out.push_str(&format!("  {:<14} {}\n", vc.verdict, vc.count));
        }

        out.push_str("\nAnalyses by model:\n");
        for mc in &self.count_by_model {
            out.push_str(&format!("  {:<18} {}\n", mc.model_used, mc.count));
        }

        if !self.recent.is_empty() {
            out.push_str("\nRecent analyses:\n");
            for r in &self.recent {
                out.push_str(&format!(
                    "  {}  {:<12} {:>5.1}%  {}\n",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    r.verdict,
                    r.confidence * 100.0,
                    r.statement
                ));
            }
        }
        out
    }
}
