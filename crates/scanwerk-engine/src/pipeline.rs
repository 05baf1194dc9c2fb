// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline coordinator — runs the staged sequence for one job.
//
// Stage order: page extraction → blank filtering → (optional) segmentation
// → (optional) duplicate resolution → artifact writing, with progress bands
// 0-20 / 20-40 / 40-60 / 60-80 / 80-100. Duplicate detection only makes
// sense across distinct reports, so disabling segmentation forces it off
// regardless of its configured value.
//
// Everything here is blocking work; callers run it on a worker thread and
// pass in a `ProgressSender` for the cross-thread progress bridge.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use scanwerk_core::config::ProcessingConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ProcessingMode, ProcessingOutcome};
use scanwerk_document::analyze::BlankClassifier;
use scanwerk_document::dedup::DuplicateResolver;
use scanwerk_document::output::{ReportProvenance, ReportWriter};
use scanwerk_document::page::Page;
use scanwerk_document::segment::{BoundarySegmenter, TextExtractor};
use scanwerk_document::source::PageSource;
use tracing::{info, instrument, warn};

use crate::broadcast::ProgressSender;

/// A pipeline failure carrying the counts computed before the failing stage.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: ScanwerkError,
    pub partial: ProcessingOutcome,
}

/// Sequences the pipeline stages for one job and reports progress.
pub struct PipelineCoordinator {
    source: Arc<dyn PageSource>,
    extractor: Option<Arc<dyn TextExtractor>>,
    output_dir: PathBuf,
}

impl PipelineCoordinator {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: Option<Arc<dyn TextExtractor>>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            extractor,
            output_dir: output_dir.into(),
        }
    }

    /// Run the full pipeline for `input`.
    ///
    /// On success the outcome carries the final counts and artifact list; on
    /// failure the error is returned together with the partial outcome so
    /// the job record can preserve whatever was computed before the failure.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub fn run(
        &self,
        input: &Path,
        config: &ProcessingConfig,
        progress: &ProgressSender,
    ) -> std::result::Result<ProcessingOutcome, PipelineFailure> {
        let started = Instant::now();
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        let mut outcome = ProcessingOutcome::new(filename);
        let result = self.run_stages(input, config, progress, &mut outcome);
        outcome.processing_time_seconds = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                info!(
                    total = outcome.total_pages,
                    blank = outcome.blank_pages,
                    reports = outcome.reports_found,
                    duplicates = outcome.duplicate_reports,
                    unique = outcome.unique_reports,
                    "pipeline run complete"
                );
                Ok(outcome)
            }
            Err(error) => Err(PipelineFailure {
                error,
                partial: outcome,
            }),
        }
    }

    fn run_stages(
        &self,
        input: &Path,
        config: &ProcessingConfig,
        progress: &ProgressSender,
        outcome: &mut ProcessingOutcome,
    ) -> Result<()> {
        // Stage 1: page extraction (0-20%).
        progress.update(5, "extracting pages from document");
        let pages = self.source.render(input)?;
        outcome.total_pages = pages.len();
        progress.update(20, format!("extracted {} pages", pages.len()));

        // Stage 2: blank filtering (20-40%).
        progress.update(25, "detecting and removing blank pages");
        let classifier = BlankClassifier::new(config.blank.clone());
        let (non_blank, _kept_indices, _signals) = classifier.filter_blank(pages);
        outcome.blank_pages = outcome.total_pages - non_blank.len();
        progress.update(40, format!("removed {} blank pages", outcome.blank_pages));

        if non_blank.is_empty() {
            return Err(ScanwerkError::Pipeline(
                "no non-blank pages found in the document".into(),
            ));
        }

        // Duplicate detection requires distinct reports to compare.
        let segmentation_enabled = config.segmentation.enabled;
        let dedup_enabled = segmentation_enabled && config.duplicates.enabled;
        if config.duplicates.enabled && !segmentation_enabled {
            warn!("duplicate detection forced off: report segmentation is disabled");
        }

        let mode = match (segmentation_enabled, dedup_enabled) {
            (false, _) => ProcessingMode::BlankRemovalOnly,
            (true, false) => ProcessingMode::Segmentation,
            (true, true) => ProcessingMode::SegmentationAndDeduplication,
        };
        outcome.processing_mode = Some(mode);

        // Stage 3: segmentation (40-60%), or the whole batch as one report.
        let groups: Vec<Vec<Page>> = if segmentation_enabled {
            progress.update(45, "segmenting pages into reports");
            let segmenter =
                BoundarySegmenter::new(config.segmentation.clone(), self.extractor.clone());
            let reports = segmenter.segment(non_blank);
            progress.update(60, format!("found {} reports", reports.len()));
            reports.into_iter().map(|r| r.pages).collect()
        } else {
            vec![non_blank]
        };
        outcome.reports_found = groups.len();

        // Stage 4: duplicate resolution (60-80%).
        let survivors: Vec<Vec<Page>> = if dedup_enabled {
            progress.update(65, "detecting duplicate reports");
            let resolver = DuplicateResolver::new(config.duplicates.clone());
            let borrowed: Vec<&[Page]> = groups.iter().map(|g| g.as_slice()).collect();
            let (unique_indices, _edges) = resolver.find_duplicates(&borrowed);

            outcome.duplicate_reports = groups.len() - unique_indices.len();
            progress.update(
                80,
                format!("removed {} duplicate reports", outcome.duplicate_reports),
            );

            let unique: std::collections::HashSet<usize> =
                unique_indices.into_iter().collect();
            groups
                .into_iter()
                .enumerate()
                .filter(|(idx, _)| unique.contains(idx))
                .map(|(_, group)| group)
                .collect()
        } else {
            groups
        };
        outcome.unique_reports = survivors.len();

        // Stage 5: artifact writing (80-100%).
        progress.update(85, "writing output artifacts");
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let writer = ReportWriter::new(&self.output_dir, config.output.clone(), config.render.dpi)?;

        for (n, report_pages) in survivors.iter().enumerate() {
            let provenance = ReportProvenance {
                original_page_indices: report_pages.iter().map(|p| p.index).collect(),
                total_pages: outcome.total_pages,
                blank_pages_removed: outcome.blank_pages,
                duplicate_reports_removed: outcome.duplicate_reports,
                processing_mode: mode,
            };
            let artifact = writer.write_report(report_pages, n + 1, &provenance, &stem)?;
            outcome.artifacts.push(artifact);
        }

        progress.update(100, "processing completed successfully");
        Ok(())
    }
}
