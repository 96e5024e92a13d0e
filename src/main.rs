// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Claim verification CLI
//!
//! Usage:
//!   nexus-verify "The earth is flat"
//!   nexus-verify --batch claims.csv --format json --history data/history.jsonl

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use nexus_verifier::batch::read_statements_file;
use nexus_verifier::{Claim, VerificationReport, Verifier, VerifierConfig, VerifyOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nexus-verify")]
#[command(about = "Verify claims with a weighted model ensemble")]
#[command(version)]
struct Args {
    /// Claim to verify
    claim: Option<String>,

    /// CSV file of claims (`statement` column, or the first column)
    #[arg(short, long)]
    batch: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Append results to this JSONL history file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Skip knowledge rules
    #[arg(long)]
    no_knowledge: bool,

    /// Skip evidence sources
    #[arg(long)]
    no_sources: bool,

    /// Skip explanations
    #[arg(long)]
    no_explain: bool,
}

fn print_report(report: &VerificationReport) {
    println!("\n{}", "=".repeat(70));
    println!("Claim: {}", report.claim);
    println!("{}", "=".repeat(70));
    println!(
        "Verdict: {}  (confidence {:.1}%{})",
        report.ensemble.verdict.as_str().to_uppercase(),
        report.ensemble.confidence * 100.0,
        if report.ensemble.overridden { ", below threshold" } else { "" }
    );

    println!("\nModel breakdown:");
    println!("{:-<70}", "");
    println!(
        "{:<10} {:>8} {:<14} {:>10} {:>11} {:>10}",
        "Model", "Weight", "Verdict", "Raw", "Calibrated", "Source"
    );
    for line in &report.ensemble.breakdown {
        println!(
            "{:<10} {:>8.2} {:<14} {:>10.3} {:>11.3} {:>10}",
            line.model.as_str(),
            line.weight,
            line.verdict.as_str(),
            line.confidence,
            line.calibrated_confidence,
            format!("{:?}", line.source).to_lowercase()
        );
    }
    println!("{:-<70}", "");

    if let Some(explanation) = &report.explanation {
        println!("\n{}", explanation.verdict_explanation);
        println!("{}", explanation.summary);
        if !explanation.recommendations.is_empty() {
            println!("\nRecommendations:");
            for rec in &explanation.recommendations {
                println!("  • {}", rec);
            }
        }
    }

    if let Some(knowledge) = &report.knowledge {
        println!(
            "\nKnowledge rules: {} pattern match(es), confidence {:.2}, credibility {:.2}, domain {}",
            knowledge.pattern_matches.len(),
            knowledge.confidence,
            knowledge.credibility_score,
            knowledge.domain.primary_domain
        );
    }

    if let Some(sources) = &report.sources {
        println!(
            "Evidence sources: {} ({:.2}) from {} source(s)",
            sources.verdict, sources.confidence, sources.sources_checked
        );
    }

    println!("\nProcessed in {:.1} ms", report.processing_time_ms);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => VerifierConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if let Some(history) = &args.history {
        config.history_path = Some(history.to_string_lossy().to_string());
    }

    let verifier = Verifier::from_config(&config).context("Failed to initialise verifier")?;
    let options = VerifyOptions {
        knowledge: !args.no_knowledge,
        multi_source: !args.no_sources,
        explain: !args.no_explain,
    };

    let statements = match (&args.claim, &args.batch) {
        (_, Some(path)) => read_statements_file(path)?,
        (Some(claim), None) => vec![claim.clone()],
        (None, None) => anyhow::bail!("Provide a claim or --batch FILE"),
    };
    if args.claim.is_some() && args.batch.is_some() {
        tracing::warn!("Both a claim and --batch given; verifying the batch only");
    }

    let progress = (statements.len() > 1).then(|| {
        let pb = ProgressBar::new(statements.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Verifying: [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    });

    let mut reports = Vec::with_capacity(statements.len());
    for statement in &statements {
        match verifier.verify(&Claim::new(statement.as_str()), &options) {
            Ok(report) => reports.push(report),
            Err(e) if statements.len() > 1 => tracing::warn!("Skipping claim: {}", e),
            Err(e) => return Err(e).context("Verification failed"),
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }

    match args.format {
        OutputFormat::Json => {
            let json = if reports.len() == 1 && args.batch.is_none() {
                serde_json::to_string_pretty(&reports[0])?
            } else {
                serde_json::to_string_pretty(&reports)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => {
            for report in &reports {
                print_report(report);
            }
            if reports.len() > 1 {
                println!("\n{}", "=".repeat(70));
                println!("Verified {} of {} claims", reports.len(), statements.len());
            }
        }
    }

    Ok(())
}
