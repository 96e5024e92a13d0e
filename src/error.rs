// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types for claim verification
//!
//! Only input validation and startup failures (configuration, history
//! storage) surface to callers. Model and evidence-source failures are
//! recovered where they happen.

use thiserror::Error;

/// Root error type for the verifier.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Empty, whitespace-only or oversized claim text.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration failed to parse or validate.
    #[error("config error: {0}")]
    Config(String),

    /// Model provider could not load or run a model.
    #[error("model provider error: {0}")]
    Provider(String),

    /// History store could not be opened or read.
    #[error("history error: {0}")]
    History(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
