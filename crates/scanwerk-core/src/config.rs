// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing configuration.
//
// Every tunable of the pipeline lives here, grouped by stage. A submission
// may carry a `ConfigOverrides` whose set fields are merged over the service
// defaults; the merged snapshot is frozen onto the job record.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ScanwerkError;
use crate::types::Region;

/// Color space pages are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Rgb,
    Gray,
}

/// Intermediate raster format used when a page source re-encodes pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

/// Perceptual hash algorithm used for duplicate detection.
///
/// A closed set: unknown names are rejected when the configuration is parsed,
/// not when the first hash is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    /// DCT-based perceptual hash (pHash).
    Perceptual,
    /// Gradient/difference hash (dHash).
    Difference,
    /// Wavelet-style hash (wHash).
    Wavelet,
    /// Plain mean hash (aHash).
    Average,
}

impl FromStr for FingerprintAlgorithm {
    type Err = ScanwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "perceptual" | "phash" => Ok(Self::Perceptual),
            "difference" | "dhash" => Ok(Self::Difference),
            "wavelet" | "whash" => Ok(Self::Wavelet),
            "average" | "average_hash" => Ok(Self::Average),
            other => Err(ScanwerkError::ConfigError(format!(
                "unsupported hash algorithm: {other} (choose perceptual, difference, wavelet, or average)"
            ))),
        }
    }
}

/// Output artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One multi-page PDF per report.
    Pdf,
    /// One directory of per-page PNGs per report.
    Images,
    /// Both of the above.
    Both,
}

/// Page rendering settings (handed to the page source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Resolution for document-to-image conversion.
    pub dpi: u32,
    pub image_format: ImageFormat,
    pub color_space: ColorSpace,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            image_format: ImageFormat::Png,
            color_space: ColorSpace::Rgb,
        }
    }
}

/// Blank page detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankDetectionConfig {
    /// Pixel-intensity variance below this indicates a blank page.
    pub variance_threshold: f64,
    /// Detected edge count below this indicates a blank page.
    pub edge_threshold: u64,
    /// White-pixel ratio above this indicates a blank page.
    pub white_ratio_threshold: f64,
    /// Whether the edge-count indicator is computed at all.
    pub use_edge_detection: bool,
    /// Canny edge detection low threshold.
    pub canny_low: f32,
    /// Canny edge detection high threshold.
    pub canny_high: f32,
}

impl Default for BlankDetectionConfig {
    fn default() -> Self {
        Self {
            variance_threshold: 100.0,
            edge_threshold: 50,
            white_ratio_threshold: 0.95,
            use_edge_detection: true,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

/// Report boundary segmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Whether the page sequence is split into individual reports at all.
    /// When disabled, duplicate detection is forced off as well.
    pub enabled: bool,
    /// Prefer text-evidence boundaries over the pixel-diff heuristic.
    pub use_text_detection: bool,
    /// Language hint passed to the text extractor.
    pub ocr_language: String,
    /// Page region searched for header text.
    pub header_region: Region,
    /// Case-insensitive keywords that mark a page as a report header.
    pub header_keywords: Vec<String>,
    /// Minimum extractor confidence (0-100) for text evidence.
    pub min_confidence: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_text_detection: true,
            ocr_language: "eng".into(),
            header_region: Region::top_band(0.2),
            header_keywords: vec![
                "patient name".into(),
                "patient id".into(),
                "medical record".into(),
                "report date".into(),
                "hospital".into(),
                "clinic".into(),
            ],
            min_confidence: 60,
        }
    }
}

/// Duplicate detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConfig {
    pub enabled: bool,
    pub hash_algorithm: FingerprintAlgorithm,
    /// Hash side length; a hash of size 8 yields 64 bits.
    pub hash_size: u32,
    /// Similarity ratio (0-1) reported alongside each duplicate edge.
    pub similarity_threshold: f64,
    /// Maximum Hamming distance for a pair to count as duplicates.
    pub hamming_distance_threshold: u32,
    /// Fingerprint a report from its first page only.
    pub compare_first_page_only: bool,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hash_algorithm: FingerprintAlgorithm::Perceptual,
            hash_size: 8,
            similarity_threshold: 0.95,
            hamming_distance_threshold: 5,
            compare_first_page_only: false,
        }
    }
}

/// Output artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Write a JSON metadata sidecar next to each artifact.
    pub include_metadata: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            include_metadata: true,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub render: RenderConfig,
    pub blank: BlankDetectionConfig,
    pub segmentation: SegmentationConfig,
    pub duplicates: DuplicateConfig,
    pub output: OutputConfig,
}

/// Per-submission configuration overrides.
///
/// Every field is optional; set fields replace the corresponding default when
/// the job's config snapshot is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub dpi: Option<u32>,
    pub image_format: Option<ImageFormat>,
    pub color_space: Option<ColorSpace>,

    pub variance_threshold: Option<f64>,
    pub edge_threshold: Option<u64>,
    pub white_ratio_threshold: Option<f64>,
    pub use_edge_detection: Option<bool>,

    pub report_segmentation_enabled: Option<bool>,
    pub use_text_detection: Option<bool>,
    pub ocr_language: Option<String>,
    pub header_keywords: Option<Vec<String>>,
    pub min_ocr_confidence: Option<u32>,

    pub duplicate_detection_enabled: Option<bool>,
    pub hash_algorithm: Option<FingerprintAlgorithm>,
    pub similarity_threshold: Option<f64>,
    pub hamming_distance_threshold: Option<u32>,

    pub output_format: Option<OutputFormat>,
    pub include_metadata: Option<bool>,
}

impl ProcessingConfig {
    /// Build a new configuration with the given overrides merged over `self`.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Self {
        let mut merged = self.clone();

        if let Some(dpi) = overrides.dpi {
            merged.render.dpi = dpi;
        }
        if let Some(format) = overrides.image_format {
            merged.render.image_format = format;
        }
        if let Some(cs) = overrides.color_space {
            merged.render.color_space = cs;
        }

        if let Some(v) = overrides.variance_threshold {
            merged.blank.variance_threshold = v;
        }
        if let Some(e) = overrides.edge_threshold {
            merged.blank.edge_threshold = e;
        }
        if let Some(w) = overrides.white_ratio_threshold {
            merged.blank.white_ratio_threshold = w;
        }
        if let Some(u) = overrides.use_edge_detection {
            merged.blank.use_edge_detection = u;
        }

        if let Some(enabled) = overrides.report_segmentation_enabled {
            merged.segmentation.enabled = enabled;
        }
        if let Some(text) = overrides.use_text_detection {
            merged.segmentation.use_text_detection = text;
        }
        if let Some(ref lang) = overrides.ocr_language {
            merged.segmentation.ocr_language = lang.clone();
        }
        if let Some(ref keywords) = overrides.header_keywords {
            merged.segmentation.header_keywords = keywords.clone();
        }
        if let Some(conf) = overrides.min_ocr_confidence {
            merged.segmentation.min_confidence = conf;
        }

        if let Some(enabled) = overrides.duplicate_detection_enabled {
            merged.duplicates.enabled = enabled;
        }
        if let Some(alg) = overrides.hash_algorithm {
            merged.duplicates.hash_algorithm = alg;
        }
        if let Some(sim) = overrides.similarity_threshold {
            merged.duplicates.similarity_threshold = sim;
        }
        if let Some(dist) = overrides.hamming_distance_threshold {
            merged.duplicates.hamming_distance_threshold = dist;
        }

        if let Some(format) = overrides.output_format {
            merged.output.format = format;
        }
        if let Some(meta) = overrides.include_metadata {
            merged.output.include_metadata = meta;
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ProcessingConfig::default();
        assert_eq!(config.render.dpi, 200);
        assert_eq!(config.blank.variance_threshold, 100.0);
        assert_eq!(config.blank.edge_threshold, 50);
        assert_eq!(config.blank.white_ratio_threshold, 0.95);
        assert!(config.blank.use_edge_detection);
        assert!(!config.segmentation.enabled);
        assert!(config.duplicates.enabled);
        assert_eq!(config.duplicates.hamming_distance_threshold, 5);
        assert_eq!(config.output.format, OutputFormat::Pdf);
    }

    #[test]
    fn overrides_merge_only_set_fields() {
        let base = ProcessingConfig::default();
        let overrides = ConfigOverrides {
            variance_threshold: Some(42.0),
            report_segmentation_enabled: Some(true),
            ..ConfigOverrides::default()
        };

        let merged = base.with_overrides(&overrides);
        assert_eq!(merged.blank.variance_threshold, 42.0);
        assert!(merged.segmentation.enabled);
        // Untouched fields keep their defaults.
        assert_eq!(merged.blank.edge_threshold, 50);
        assert_eq!(merged.render.dpi, 200);
    }

    #[test]
    fn algorithm_names_parse_case_insensitively() {
        assert_eq!(
            "Perceptual".parse::<FingerprintAlgorithm>().expect("parse"),
            FingerprintAlgorithm::Perceptual
        );
        assert_eq!(
            "dhash".parse::<FingerprintAlgorithm>().expect("parse"),
            FingerprintAlgorithm::Difference
        );
    }

    #[test]
    fn unknown_algorithm_name_is_a_config_error() {
        let err = "md5".parse::<FingerprintAlgorithm>().unwrap_err();
        assert!(matches!(err, ScanwerkError::ConfigError(_)));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ProcessingConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: ProcessingConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }

    #[test]
    fn unknown_algorithm_rejected_at_parse_time() {
        let result: Result<DuplicateConfig, _> = serde_json::from_str(
            r#"{
                "enabled": true,
                "hash_algorithm": "md5",
                "hash_size": 8,
                "similarity_threshold": 0.95,
                "hamming_distance_threshold": 5,
                "compare_first_page_only": false
            }"#,
        );
        assert!(result.is_err());
    }
}
