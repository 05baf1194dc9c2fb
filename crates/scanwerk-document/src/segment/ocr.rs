// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR-backed text extraction for header detection.
//
// Wraps the `ocrs` crate, a pure-Rust OCR engine backed by neural network
// models executed via `rten`. Only available when the `ocr` feature is
// enabled:
//
// ```toml
// scanwerk-document = { path = "crates/scanwerk-document", features = ["ocr"] }
// ```
//
// The engine requires two model files:
//
// - detection model (`text-detection.rten`) — locates text regions
// - recognition model (`text-recognition.rten`) — decodes characters
//
// Both can be obtained by running the `ocrs-cli` tool once, which downloads
// them to `~/.cache/ocrs/`. Compile in release mode; debug builds of the
// inference stack are 10-100x slower.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::segment::TextExtractor;

/// Default directory for cached OCR model files.
///
/// Follows the XDG Base Directory specification: `$XDG_CACHE_HOME/ocrs`,
/// falling back to `~/.cache/ocrs` when `XDG_CACHE_HOME` is unset.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Configuration for constructing an [`OcrTextExtractor`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
    /// Language hint. The bundled models are latin-script only; the hint is
    /// recorded for diagnostics.
    pub language: String,
    /// Minimum confidence (0-100). The `ocrs` text API does not expose
    /// per-line confidence, so this is carried for extractors that can
    /// honour it and recorded for diagnostics here.
    pub min_confidence: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let dir = default_model_dir();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            language: "eng".into(),
            min_confidence: 60,
        }
    }
}

impl OcrConfig {
    /// Create a config with an explicit model directory containing
    /// `text-detection.rten` and `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            ..Self::default()
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        if !self.detection_model_path.exists() {
            return Err(ScanwerkError::OcrError(format!(
                "detection model not found at {}; run `ocrs-cli` once to download models",
                self.detection_model_path.display()
            )));
        }
        if !self.recognition_model_path.exists() {
            return Err(ScanwerkError::OcrError(format!(
                "recognition model not found at {}; run `ocrs-cli` once to download models",
                self.recognition_model_path.display()
            )));
        }
        Ok(())
    }
}

/// Text extractor backed by the `ocrs` engine.
///
/// Model loading is the expensive step — build the extractor once and reuse
/// it for every header region in a batch.
pub struct OcrTextExtractor {
    engine: OcrEngine,
}

impl OcrTextExtractor {
    /// Load the OCR models from the paths given in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::OcrError`] if model files are missing or
    /// corrupt.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("loading OCR detection model");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            ScanwerkError::OcrError(format!(
                "failed to load detection model from {}: {}",
                config.detection_model_path.display(),
                err
            ))
        })?;

        info!("loading OCR recognition model");
        let recognition_model =
            Model::load_file(&config.recognition_model_path).map_err(|err| {
                ScanwerkError::OcrError(format!(
                    "failed to load recognition model from {}: {}",
                    config.recognition_model_path.display(),
                    err
                ))
            })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            ScanwerkError::OcrError(format!("failed to initialise OCR engine: {err}"))
        })?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from the default cache directory.
    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }
}

impl TextExtractor for OcrTextExtractor {
    fn extract_text(&self, region: &DynamicImage) -> Result<String> {
        let rgb = region.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanwerkError::OcrError(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| ScanwerkError::OcrError(format!("OCR preprocessing failed: {err}")))?;

        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| ScanwerkError::OcrError(format!("OCR recognition failed: {err}")))?;

        debug!(
            chars = text.len(),
            lines = text.lines().count(),
            "header region recognised"
        );
        Ok(text)
    }
}

/// Whether OCR model files exist in the default cache location.
pub fn models_available() -> bool {
    let config = OcrConfig::default();
    config.detection_model_path.exists() && config.recognition_model_path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_to_cache_dir() {
        let config = OcrConfig::default();
        assert!(
            config
                .detection_model_path
                .to_string_lossy()
                .ends_with(DETECTION_MODEL_FILENAME)
        );
        assert!(
            config
                .recognition_model_path
                .to_string_lossy()
                .ends_with(RECOGNITION_MODEL_FILENAME)
        );
    }

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
    }

    #[test]
    fn validate_missing_models() {
        let config = OcrConfig::from_dir("/nonexistent/path/ocr-models");
        assert!(config.validate().is_err());
    }
}
