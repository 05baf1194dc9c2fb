// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blank page classifier.
//
// Three independent indicators vote on whether a page is void of content:
// low intensity variance, high white-pixel ratio, low edge count. A page is
// blank only when at least two of the available indicators agree, so a
// single noisy signal (a faint watermark inflating variance, say) can never
// misclassify a page on its own.

use image::DynamicImage;
use scanwerk_core::config::BlankDetectionConfig;
use tracing::{debug, info};

use crate::analyze::metrics::{SignalBundle, compute_signals};
use crate::page::Page;

/// Minimum number of indicators that must agree for a blank verdict.
const BLANK_VOTE_QUORUM: usize = 2;

/// Decides per-page whether a page is blank, from its pixel signals.
pub struct BlankClassifier {
    config: BlankDetectionConfig,
}

impl BlankClassifier {
    pub fn new(config: BlankDetectionConfig) -> Self {
        Self { config }
    }

    /// Classify a single page.
    ///
    /// Returns the verdict together with the full signal bundle so callers
    /// can surface why a page was (not) dropped.
    pub fn classify(&self, image: &DynamicImage) -> (bool, SignalBundle) {
        let mut signals = compute_signals(image, &self.config);
        let (is_blank, reasons) = evaluate(&signals, &self.config);
        signals.is_blank = is_blank;
        signals.reasons = reasons;

        debug!(
            blank = is_blank,
            variance = format!("{:.2}", signals.variance),
            white_ratio = format!("{:.3}", signals.white_ratio),
            edges = ?signals.edge_count,
            "page classified"
        );

        (is_blank, signals)
    }

    /// Order-preserving blank filter over a page sequence.
    ///
    /// Returns the kept pages, the indices (within the input sequence) of the
    /// kept pages, and one signal bundle for every input page — kept or not —
    /// for diagnostics.
    pub fn filter_blank(&self, pages: Vec<Page>) -> (Vec<Page>, Vec<usize>, Vec<SignalBundle>) {
        info!(pages = pages.len(), "analyzing pages for blanks");

        let mut kept = Vec::with_capacity(pages.len());
        let mut kept_indices = Vec::with_capacity(pages.len());
        let mut all_signals = Vec::with_capacity(pages.len());

        for (idx, page) in pages.into_iter().enumerate() {
            let (is_blank, signals) = self.classify(&page.image);
            if is_blank {
                info!(page = page.index + 1, reasons = ?signals.reasons, "blank page dropped");
            } else {
                kept.push(page);
                kept_indices.push(idx);
            }
            all_signals.push(signals);
        }

        info!(
            total = all_signals.len(),
            kept = kept.len(),
            blank = all_signals.len() - kept.len(),
            "blank filtering complete"
        );

        (kept, kept_indices, all_signals)
    }

    /// Content-richness score for a page (0-100, higher is better).
    ///
    /// A simple normalised combination of variance and edge density, useful
    /// for surfacing the worst scans in a batch.
    pub fn quality_score(&self, image: &DynamicImage) -> f64 {
        let config = BlankDetectionConfig {
            use_edge_detection: true,
            ..self.config.clone()
        };
        let signals = compute_signals(image, &config);

        let variance_score = (signals.variance / 1000.0).min(1.0) * 50.0;
        let edge_score = (signals.edge_count.unwrap_or(0) as f64 / 10_000.0).min(1.0) * 50.0;
        variance_score + edge_score
    }
}

/// Apply the 2-of-N voting rule to an already-computed signal bundle.
///
/// When edge detection is disabled only two indicators exist and both must
/// fire.
pub fn evaluate(signals: &SignalBundle, config: &BlankDetectionConfig) -> (bool, Vec<String>) {
    let mut reasons = Vec::new();
    let mut fired = 0usize;

    if signals.variance < config.variance_threshold {
        reasons.push(format!("low variance ({:.2})", signals.variance));
        fired += 1;
    }

    if signals.white_ratio > config.white_ratio_threshold {
        reasons.push(format!("high white ratio ({:.1}%)", signals.white_ratio * 100.0));
        fired += 1;
    }

    if let Some(edge_count) = signals.edge_count {
        if edge_count < config.edge_threshold {
            reasons.push(format!("low edge count ({edge_count})"));
            fired += 1;
        }
    }

    let is_blank = fired >= BLANK_VOTE_QUORUM;
    if !is_blank {
        reasons = vec!["page contains content".into()];
    }

    (is_blank, reasons)
}
