// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory page representation.

use image::DynamicImage;
use scanwerk_core::types::Region;

/// A single rendered page: the raster plus the 0-based index it had in the
/// source document.
///
/// The index travels with the raster so provenance survives blank filtering
/// and segmentation — a report can always report which original pages it was
/// assembled from.
#[derive(Debug, Clone)]
pub struct Page {
    pub image: DynamicImage,
    /// 0-based index of this page in the source document.
    pub index: usize,
}

impl Page {
    pub fn new(image: DynamicImage, index: usize) -> Self {
        Self { image, index }
    }

    /// Page dimensions in pixels (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Crop the fractional `region` out of this page.
    ///
    /// Coordinates are scaled to the page's pixel dimensions and clamped to
    /// its bounds; the crop is non-destructive.
    pub fn crop_region(&self, region: &Region) -> DynamicImage {
        crop_region(&self.image, region)
    }
}

/// Crop a fractional region out of an image.
pub fn crop_region(image: &DynamicImage, region: &Region) -> DynamicImage {
    let width = image.width();
    let height = image.height();

    let x1 = (width as f32 * region.x1) as u32;
    let y1 = (height as f32 * region.y1) as u32;
    let x2 = ((width as f32 * region.x2) as u32).min(width);
    let y2 = ((height as f32 * region.y2) as u32).min(height);

    image.crop_imm(x1, y1, x2.saturating_sub(x1).max(1), y2.saturating_sub(y1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn blank_page(width: u32, height: u32) -> Page {
        Page::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([255; 3]))),
            0,
        )
    }

    #[test]
    fn crop_region_scales_fractional_coordinates() {
        let page = blank_page(800, 1000);
        let header = page.crop_region(&Region::top_band(0.2));
        assert_eq!(header.width(), 800);
        assert_eq!(header.height(), 200);
    }

    #[test]
    fn crop_region_clamps_to_image_bounds() {
        let page = blank_page(10, 10);
        let region = Region::new(0.0, 0.0, 1.0, 1.0).expect("valid region");
        let cropped = page.crop_region(&region);
        assert_eq!(cropped.width(), 10);
        assert_eq!(cropped.height(), 10);
    }
}
