// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page pixel statistics used for blank detection.

use image::DynamicImage;
use imageproc::edges::canny;
use scanwerk_core::config::BlankDetectionConfig;
use serde::{Deserialize, Serialize};

/// Intensity above which a pixel counts as white.
pub const WHITE_THRESHOLD: u8 = 240;

/// Scalar signals computed for one page, plus the classification verdict.
///
/// `edge_count` is absent when edge detection is disabled. `reasons` lists
/// which indicators fired, in the order they were checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBundle {
    /// Pixel-intensity variance over the grayscale page.
    pub variance: f64,
    /// Fraction of pixels brighter than [`WHITE_THRESHOLD`].
    pub white_ratio: f64,
    /// Canny edge pixel count, when edge detection ran.
    pub edge_count: Option<u64>,
    pub mean: f64,
    pub stddev: f64,
    pub is_blank: bool,
    pub reasons: Vec<String>,
}

/// Compute the raw signals for a page.
///
/// Pure over pixel data and thresholds; the classification fields are left
/// at their defaults for the classifier to fill in.
pub fn compute_signals(image: &DynamicImage, config: &BlankDetectionConfig) -> SignalBundle {
    let gray = image.to_luma8();
    let total = (gray.width() as f64) * (gray.height() as f64);

    let mut sum = 0.0f64;
    let mut white_pixels = 0u64;
    for pixel in gray.pixels() {
        let value = pixel.0[0];
        sum += value as f64;
        if value > WHITE_THRESHOLD {
            white_pixels += 1;
        }
    }
    let mean = sum / total;

    let mut sum_sq_diff = 0.0f64;
    for pixel in gray.pixels() {
        let diff = pixel.0[0] as f64 - mean;
        sum_sq_diff += diff * diff;
    }
    let variance = sum_sq_diff / total;

    let edge_count = if config.use_edge_detection {
        let edges = canny(&gray, config.canny_low, config.canny_high);
        Some(edges.pixels().filter(|p| p.0[0] > 0).count() as u64)
    } else {
        None
    };

    SignalBundle {
        variance,
        white_ratio: white_pixels as f64 / total,
        edge_count,
        mean,
        stddev: variance.sqrt(),
        is_blank: false,
        reasons: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn uniform_page(value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, image::Rgb([value; 3])))
    }

    #[test]
    fn uniform_white_page_has_zero_variance_and_full_white_ratio() {
        let signals = compute_signals(&uniform_page(255), &BlankDetectionConfig::default());
        assert_eq!(signals.variance, 0.0);
        assert_eq!(signals.white_ratio, 1.0);
        assert_eq!(signals.mean, 255.0);
        assert_eq!(signals.edge_count, Some(0));
    }

    #[test]
    fn uniform_dark_page_has_zero_white_ratio() {
        let signals = compute_signals(&uniform_page(10), &BlankDetectionConfig::default());
        assert_eq!(signals.white_ratio, 0.0);
        assert_eq!(signals.mean, 10.0);
    }

    #[test]
    fn edge_count_absent_when_detection_disabled() {
        let config = BlankDetectionConfig {
            use_edge_detection: false,
            ..BlankDetectionConfig::default()
        };
        let signals = compute_signals(&uniform_page(255), &config);
        assert!(signals.edge_count.is_none());
    }

    #[test]
    fn half_black_half_white_page_has_high_variance() {
        let mut img = RgbImage::from_pixel(100, 100, image::Rgb([255; 3]));
        for y in 0..100 {
            for x in 0..50 {
                img.put_pixel(x, y, image::Rgb([0; 3]));
            }
        }
        let signals = compute_signals(
            &DynamicImage::ImageRgb8(img),
            &BlankDetectionConfig::default(),
        );
        assert!(signals.variance > 10_000.0, "variance {}", signals.variance);
        assert!((signals.white_ratio - 0.5).abs() < 0.01);
    }
}
