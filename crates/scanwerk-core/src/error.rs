// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Input errors --
    #[error("document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // -- Document errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("fingerprint computation failed: {0}")]
    FingerprintError(String),

    #[error("output write failed: {0}")]
    OutputError(String),

    // -- Pipeline / job errors --
    #[error("pipeline stage failed: {0}")]
    Pipeline(String),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    // -- Configuration --
    #[error("configuration error: {0}")]
    ConfigError(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
