// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Batch input loading

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Column holding the claims in a batch file
pub const STATEMENT_COLUMN: &str = "statement";

/// Read claims from CSV with a header row
///
/// Uses the `statement` column when present, otherwise the first column.
/// Blank cells are skipped.
pub fn read_statements<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(STATEMENT_COLUMN))
        .unwrap_or(0);

    let mut statements = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record {}", idx + 1))?;
        let statement = record.get(column).unwrap_or("").trim();
        if !statement.is_empty() {
            statements.push(statement.to_string());
        }
    }

    Ok(statements)
}

pub fn read_statements_file(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open batch file: {}", path.display()))?;
    read_statements(file).with_context(|| format!("Failed to parse batch file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_column() {
        let csv = "id,statement,source\n1,The earth is flat,blog\n2,\"Vaccines work, says WHO\",news\n3,,x\n";
        let statements = read_statements(csv.as_bytes()).unwrap();
        assert_eq!(statements, vec!["The earth is flat", "Vaccines work, says WHO"]);
    }

    #[test]
    fn test_first_column_fallback() {
        let csv = "claim,notes\nClimate change is real,\nBREAKING secret cure,spam\n";
        let statements = read_statements(csv.as_bytes()).unwrap();
        assert_eq!(statements, vec!["Climate change is real", "BREAKING secret cure"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_statements_file(&dir.path().join("nope.csv")).is_err());
    }
}
