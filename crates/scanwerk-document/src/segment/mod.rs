// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report boundary segmentation.
//
// Splits an ordered page sequence into contiguous report groups. Two
// strategies: text evidence (header keywords found by a text extractor in
// the top-of-page region) and a pixel-diff heuristic over consecutive header
// regions for when no extractor is available. Either way the produced
// reports partition the input with no gaps and no overlaps.

use std::sync::Arc;

use image::DynamicImage;
use scanwerk_core::config::SegmentationConfig;
use scanwerk_core::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::page::Page;

#[cfg(feature = "ocr")]
pub mod ocr;

/// Mean absolute pixel difference above which consecutive header regions are
/// taken as evidence of a new report.
const HEADER_DIFF_THRESHOLD: f64 = 30.0;

/// Which strategy produced a report's boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMethod {
    /// Header keywords found via text extraction.
    TextDetection,
    /// Pixel-diff heuristic over consecutive header regions.
    PixelHeuristic,
}

/// Metadata attached to each segmented report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// First page of the report, 1-based.
    pub start_page: usize,
    /// Last page of the report, 1-based inclusive.
    pub end_page: usize,
    pub method: BoundaryMethod,
}

/// A contiguous run of pages judged to belong to one logical document.
#[derive(Debug, Clone)]
pub struct Report {
    pub pages: Vec<Page>,
    /// Positions of this report's pages within the sequence that was
    /// segmented (not the original document; see [`Report::original_indices`]).
    pub page_indices: Vec<usize>,
    pub metadata: ReportMetadata,
}

impl Report {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The original document indices of this report's pages, as carried on
    /// each [`Page`].
    pub fn original_indices(&self) -> Vec<usize> {
        self.pages.iter().map(|p| p.index).collect()
    }
}

/// Extracts text from a page region image.
///
/// Language and minimum-confidence settings are construction-time
/// configuration of the implementation. Any error is treated by callers as
/// "no text found on this page".
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, region: &DynamicImage) -> Result<String>;
}

/// Splits a page sequence into individual reports.
pub struct BoundarySegmenter {
    config: SegmentationConfig,
    extractor: Option<Arc<dyn TextExtractor>>,
}

impl BoundarySegmenter {
    pub fn new(config: SegmentationConfig, extractor: Option<Arc<dyn TextExtractor>>) -> Self {
        if config.use_text_detection && extractor.is_none() {
            warn!("text detection requested but no extractor available, falling back to pixel heuristic");
        }
        Self { config, extractor }
    }

    /// Split `pages` into reports.
    ///
    /// The returned reports cover the full input: the first starts at index
    /// 0, each report's end equals the next report's start, and the last
    /// ends at `pages.len()`. An empty input yields no reports.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn segment(&self, pages: Vec<Page>) -> Vec<Report> {
        if pages.is_empty() {
            return Vec::new();
        }

        info!(pages = pages.len(), "segmenting pages into reports");

        let (boundaries, method) = match self.extractor {
            Some(ref extractor) if self.config.use_text_detection => (
                self.detect_boundaries_text(&pages, extractor.as_ref()),
                BoundaryMethod::TextDetection,
            ),
            _ => (
                self.detect_boundaries_heuristic(&pages),
                BoundaryMethod::PixelHeuristic,
            ),
        };

        let reports: Vec<Report> = boundaries
            .into_iter()
            .map(|(start, end)| {
                debug!(start = start + 1, end, "report assembled");
                Report {
                    pages: pages[start..end].to_vec(),
                    page_indices: (start..end).collect(),
                    metadata: ReportMetadata {
                        start_page: start + 1,
                        end_page: end,
                        method,
                    },
                }
            })
            .collect();

        info!(reports = reports.len(), ?method, "segmentation complete");
        reports
    }

    /// Find boundaries from header keywords in the top-of-page region.
    ///
    /// A page whose extracted header text contains any configured keyword
    /// (case-insensitive substring) starts a new report. Extraction errors
    /// on a page are logged and count as "no header" so one bad extraction
    /// cannot fail the whole batch.
    fn detect_boundaries_text(
        &self,
        pages: &[Page],
        extractor: &dyn TextExtractor,
    ) -> Vec<(usize, usize)> {
        let mut header_pages = Vec::new();
        for (idx, page) in pages.iter().enumerate() {
            if self.has_header(page, extractor) {
                debug!(page = idx + 1, "header detected");
                header_pages.push(idx);
            }
        }

        if header_pages.is_empty() {
            warn!("no headers detected, treating all pages as a single report");
            return vec![(0, pages.len())];
        }

        let mut boundaries = Vec::with_capacity(header_pages.len() + 1);
        for (i, &start) in header_pages.iter().enumerate() {
            let end = header_pages.get(i + 1).copied().unwrap_or(pages.len());
            boundaries.push((start, end));
        }

        // Pages before the first header form an initial report of their own.
        if header_pages[0] > 0 {
            boundaries.insert(0, (0, header_pages[0]));
        }

        boundaries
    }

    /// Find boundaries by comparing consecutive header regions pixel-wise.
    fn detect_boundaries_heuristic(&self, pages: &[Page]) -> Vec<(usize, usize)> {
        let mut starts = vec![0usize];
        for idx in 1..pages.len() {
            let prev = pages[idx - 1].crop_region(&self.config.header_region);
            let curr = pages[idx].crop_region(&self.config.header_region);
            let diff = mean_abs_diff(&prev, &curr);
            if diff > HEADER_DIFF_THRESHOLD {
                debug!(page = idx + 1, diff = format!("{diff:.1}"), "boundary detected");
                starts.push(idx);
            }
        }

        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(pages.len());
                (start, end)
            })
            .collect()
    }

    /// Whether the page's header region contains any configured keyword.
    fn has_header(&self, page: &Page, extractor: &dyn TextExtractor) -> bool {
        let region = page.crop_region(&self.config.header_region);
        match extractor.extract_text(&region) {
            Ok(text) => {
                let text = text.to_lowercase();
                self.config
                    .header_keywords
                    .iter()
                    .any(|keyword| text.contains(&keyword.to_lowercase()))
            }
            Err(err) => {
                warn!(page = page.index + 1, error = %err, "text extraction failed, treating as no header");
                false
            }
        }
    }
}

/// Mean absolute intensity difference between two images over their
/// overlapping area.
fn mean_abs_diff(a: &DynamicImage, b: &DynamicImage) -> f64 {
    let a = a.to_luma8();
    let b = b.to_luma8();
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for y in 0..height {
        for x in 0..width {
            let pa = a.get_pixel(x, y).0[0] as f64;
            let pb = b.get_pixel(x, y).0[0] as f64;
            sum += (pa - pb).abs();
        }
    }
    sum / (width as f64 * height as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use scanwerk_core::error::ScanwerkError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Extractor that replays a scripted sequence of responses, one per page.
    struct ScriptedExtractor {
        responses: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedExtractor {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
            })
        }
    }

    impl TextExtractor for ScriptedExtractor {
        fn extract_text(&self, _region: &DynamicImage) -> Result<String> {
            self.responses
                .lock()
                .expect("script lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn uniform_page(index: usize, value: u8) -> Page {
        Page::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 100, image::Rgb([value; 3]))),
            index,
        )
    }

    fn pages(n: usize) -> Vec<Page> {
        (0..n).map(|i| uniform_page(i, 255)).collect()
    }

    fn text_segmenter(extractor: Arc<dyn TextExtractor>) -> BoundarySegmenter {
        BoundarySegmenter::new(SegmentationConfig::default(), Some(extractor))
    }

    fn assert_partition(reports: &[Report], total: usize) {
        assert_eq!(reports[0].page_indices[0], 0);
        for window in reports.windows(2) {
            let end = *window[0].page_indices.last().expect("non-empty") + 1;
            assert_eq!(end, window[1].page_indices[0], "gap or overlap between reports");
        }
        let last = reports.last().expect("at least one report");
        assert_eq!(*last.page_indices.last().expect("non-empty") + 1, total);
    }

    #[test]
    fn empty_input_yields_no_reports() {
        let segmenter = text_segmenter(ScriptedExtractor::new(vec![]));
        assert!(segmenter.segment(Vec::new()).is_empty());
    }

    #[test]
    fn no_headers_collapse_to_single_report() {
        let extractor = ScriptedExtractor::new(vec![
            Ok("quarterly totals".into()),
            Ok(String::new()),
            Ok("page 2 of 2".into()),
        ]);
        let reports = text_segmenter(extractor).segment(pages(3));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].page_indices, vec![0, 1, 2]);
        assert_eq!(reports[0].metadata.start_page, 1);
        assert_eq!(reports[0].metadata.end_page, 3);
        assert_eq!(reports[0].metadata.method, BoundaryMethod::TextDetection);
    }

    #[test]
    fn headers_mid_sequence_create_initial_report() {
        // Headers on pages 2 and 4 of 6: reports [0,2), [2,4), [4,6).
        let extractor = ScriptedExtractor::new(vec![
            Ok(String::new()),
            Ok(String::new()),
            Ok("Patient Name: J. Doe".into()),
            Ok(String::new()),
            Ok("HOSPITAL discharge summary".into()),
            Ok(String::new()),
        ]);
        let reports = text_segmenter(extractor).segment(pages(6));

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].page_indices, vec![0, 1]);
        assert_eq!(reports[1].page_indices, vec![2, 3]);
        assert_eq!(reports[2].page_indices, vec![4, 5]);
        assert_partition(&reports, 6);
    }

    #[test]
    fn header_on_first_page_starts_first_report() {
        let extractor = ScriptedExtractor::new(vec![
            Ok("medical record".into()),
            Ok(String::new()),
            Ok("clinic visit".into()),
        ]);
        let reports = text_segmenter(extractor).segment(pages(3));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].page_indices, vec![0, 1]);
        assert_eq!(reports[1].page_indices, vec![2]);
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        let extractor = ScriptedExtractor::new(vec![
            Ok("...REPORT DATE: 2026-01-15...".into()),
            Ok(String::new()),
        ]);
        let reports = text_segmenter(extractor).segment(pages(2));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].metadata.start_page, 1);
    }

    #[test]
    fn extraction_errors_count_as_no_header() {
        // Page 0 errors, page 1 has a header: the error must not abort
        // segmentation, and page 0 becomes an initial report.
        let extractor = ScriptedExtractor::new(vec![
            Err(ScanwerkError::OcrError("engine crashed".into())),
            Ok("patient id 4711".into()),
        ]);
        let reports = text_segmenter(extractor).segment(pages(2));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].page_indices, vec![0]);
        assert_eq!(reports[1].page_indices, vec![1]);
    }

    #[test]
    fn heuristic_identical_pages_form_single_report() {
        let segmenter = BoundarySegmenter::new(SegmentationConfig::default(), None);
        let reports = segmenter.segment(pages(4));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].metadata.method, BoundaryMethod::PixelHeuristic);
        assert_partition(&reports, 4);
    }

    #[test]
    fn heuristic_detects_header_region_change() {
        // Pages 0-1 white, pages 2-3 dark: the header region changes sharply
        // at page 2.
        let mut input = vec![uniform_page(0, 255), uniform_page(1, 255)];
        input.push(uniform_page(2, 40));
        input.push(uniform_page(3, 40));

        let segmenter = BoundarySegmenter::new(SegmentationConfig::default(), None);
        let reports = segmenter.segment(input);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].page_indices, vec![0, 1]);
        assert_eq!(reports[1].page_indices, vec![2, 3]);
        assert_partition(&reports, 4);
    }

    #[test]
    fn text_detection_disabled_uses_heuristic_even_with_extractor() {
        let config = SegmentationConfig {
            use_text_detection: false,
            ..SegmentationConfig::default()
        };
        let extractor =
            ScriptedExtractor::new((0..3).map(|_| Ok("patient name".to_string())).collect());
        let segmenter = BoundarySegmenter::new(config, Some(extractor));
        let reports = segmenter.segment(pages(3));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].metadata.method, BoundaryMethod::PixelHeuristic);
    }

    #[test]
    fn original_indices_come_from_page_provenance() {
        // Pages carry original document indices 4, 6, 8 (blanks 5 and 7
        // were filtered out upstream).
        let input = vec![uniform_page(4, 255), uniform_page(6, 255), uniform_page(8, 255)];
        let segmenter = BoundarySegmenter::new(SegmentationConfig::default(), None);
        let reports = segmenter.segment(input);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].page_indices, vec![0, 1, 2]);
        assert_eq!(reports[0].original_indices(), vec![4, 6, 8]);
    }
}
