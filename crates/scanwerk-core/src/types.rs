// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk batch engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::ProcessingConfig;

/// Unique identifier for a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a processing job.
///
/// Transitions only follow Pending → Processing → {Completed, Failed}; a
/// terminal job never changes state again except by deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, waiting for a worker slot.
    Pending,
    /// A worker is running the pipeline.
    Processing,
    /// Pipeline finished — see job result field.
    Completed,
    /// Pipeline failed — see job error field.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (Completed or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single processing job and its mutable lifecycle record.
///
/// Jobs live only for the process lifetime, exclusively owned by the job
/// store and mutated only through its transition operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Name of the submitted document.
    pub filename: String,
    pub status: JobStatus,
    /// Progress percentage (0-100), non-decreasing within a run.
    pub progress: u8,
    /// Human-readable description of the current pipeline step.
    pub current_step: String,
    /// Final (or partial, on failure) processing outcome.
    pub result: Option<ProcessingOutcome>,
    /// Error message when the job failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Snapshot of the configuration the job runs with.
    pub config: ProcessingConfig,
}

impl Job {
    pub fn new(filename: String, config: ProcessingConfig) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            filename,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "queued for processing".into(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            config,
        }
    }
}

/// Snapshot delivered to progress subscribers on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
}

/// Which stages the pipeline actually ran for a given job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Blank removal only; the non-blank pages form one report.
    BlankRemovalOnly,
    /// Blank removal plus report segmentation, no duplicate collapse.
    Segmentation,
    /// The full pipeline: blank removal, segmentation, deduplication.
    SegmentationAndDeduplication,
}

/// Descriptor of one written output artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Path of the primary artifact (PDF file or image directory).
    pub path: PathBuf,
    pub page_count: usize,
    pub file_size_bytes: u64,
    /// Path of the metadata sidecar, when one was written.
    pub metadata_path: Option<PathBuf>,
}

/// Final result of a pipeline run.
///
/// On failure the counts reflect whatever was computed before the failing
/// stage; untouched counters stay at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub input_file: String,
    pub total_pages: usize,
    pub blank_pages: usize,
    pub reports_found: usize,
    pub duplicate_reports: usize,
    pub unique_reports: usize,
    pub artifacts: Vec<ArtifactInfo>,
    pub processing_mode: Option<ProcessingMode>,
    pub processing_time_seconds: f64,
}

impl ProcessingOutcome {
    pub fn new(input_file: impl Into<String>) -> Self {
        Self {
            input_file: input_file.into(),
            total_pages: 0,
            blank_pages: 0,
            reports_found: 0,
            duplicate_reports: 0,
            unique_reports: 0,
            artifacts: Vec::new(),
            processing_mode: None,
            processing_time_seconds: 0.0,
        }
    }
}

/// A rectangular page region in fractional coordinates.
///
/// All four values are ratios of the page dimensions in [0, 1]; `(x1, y1)`
/// is the top-left corner, `(x2, y2)` the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Region {
    /// Create a region, validating that the coordinates describe a non-empty
    /// rectangle inside the unit square.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> crate::error::Result<Self> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !(in_unit(x1) && in_unit(y1) && in_unit(x2) && in_unit(y2)) {
            return Err(crate::error::ScanwerkError::ConfigError(format!(
                "region coordinates must lie in [0, 1]: ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        if x2 <= x1 || y2 <= y1 {
            return Err(crate::error::ScanwerkError::ConfigError(format!(
                "region must be non-empty: ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// The top band of the page covering the given height fraction.
    pub fn top_band(height_fraction: f32) -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: height_fraction.clamp(0.0, 1.0),
        }
    }
}
