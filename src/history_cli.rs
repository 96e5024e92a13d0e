// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Analysis history viewer
//!
//! Summarises a JSONL history file written by `nexus-verify --history`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nexus_verifier::history::{read_jsonl, HistoryAnalytics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nexus-history")]
#[command(about = "Summarise recorded claim verifications")]
#[command(version)]
struct Args {
    /// History file to read
    #[arg(long, default_value = "data/analysis_history.jsonl")]
    history: PathBuf,

    /// Number of recent analyses to list
    #[arg(short, long, default_value_t = 10)]
    recent: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let records = read_jsonl(&args.history)
        .with_context(|| format!("Failed to read history: {}", args.history.display()))?;
    if records.is_empty() {
        tracing::warn!("No analyses recorded in {}", args.history.display());
    }

    let analytics = HistoryAnalytics::from_records(&records, args.recent);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analytics)?),
        OutputFormat::Text => print!("{}", analytics.format()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_is_checked_by_clap() {
        let args = Args::try_parse_from(["nexus-history", "--format", "json", "--recent", "3"]).unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.recent, 3);

        assert_eq!(Args::try_parse_from(["nexus-history"]).unwrap().format, OutputFormat::Text);
        assert!(Args::try_parse_from(["nexus-history", "--format", "yaml"]).is_err());
    }
}
