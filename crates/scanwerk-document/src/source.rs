// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page sources — turn a submitted document path into an ordered page list.
//
// Rasterising a PDF or driving a scanner is not this crate's business; a
// `PageSource` hands the pipeline decoded pages and nothing else. The
// directory source covers the common scanned-batch layout (one image file
// per page); the memory source serves embedders and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use scanwerk_core::config::{ColorSpace, RenderConfig};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::page::Page;

/// Produces the ordered page list for a submitted document.
pub trait PageSource: Send + Sync {
    /// Render all pages of the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::DocumentNotFound`] when the path does not
    /// exist, so callers can distinguish a bad submission from a decode
    /// failure.
    fn render(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Image file extensions recognised as page scans.
const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Page source over a directory of per-page image files.
///
/// Pages are ordered by filename, so scanner output named `page_001.png`,
/// `page_002.png`, … keeps its scan order.
pub struct DirectorySource {
    config: RenderConfig,
}

impl DirectorySource {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl PageSource for DirectorySource {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn render(&self, path: &Path) -> Result<Vec<Page>> {
        if !path.exists() {
            return Err(ScanwerkError::DocumentNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(ScanwerkError::InvalidInput(format!(
                "expected a directory of page images: {}",
                path.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        info!(pages = files.len(), "rendering pages from directory");

        let mut pages = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let img = image::open(file).map_err(|err| {
                ScanwerkError::ImageError(format!(
                    "failed to decode page {}: {}",
                    file.display(),
                    err
                ))
            })?;
            pages.push(Page::new(apply_color_space(img, self.config.color_space), index));
            debug!(index, file = %file.display(), "page decoded");
        }

        Ok(pages)
    }
}

/// In-memory page source keyed by document name.
///
/// The in-memory counterpart of the directory source, for embedders that
/// already hold decoded pages and for tests.
#[derive(Default)]
pub struct MemorySource {
    documents: Mutex<HashMap<PathBuf, Vec<DynamicImage>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under the given name.
    pub fn insert(&self, name: impl Into<PathBuf>, pages: Vec<DynamicImage>) {
        self.documents
            .lock()
            .expect("memory source lock poisoned")
            .insert(name.into(), pages);
    }
}

impl PageSource for MemorySource {
    fn render(&self, path: &Path) -> Result<Vec<Page>> {
        let documents = self.documents.lock().expect("memory source lock poisoned");
        let pages = documents
            .get(path)
            .ok_or_else(|| ScanwerkError::DocumentNotFound(path.to_path_buf()))?;
        Ok(pages
            .iter()
            .enumerate()
            .map(|(index, img)| Page::new(img.clone(), index))
            .collect())
    }
}

/// Convert a decoded image into the configured color space.
fn apply_color_space(image: DynamicImage, color_space: ColorSpace) -> DynamicImage {
    match color_space {
        ColorSpace::Rgb => match image {
            DynamicImage::ImageRgb8(_) => image,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        ColorSpace::Gray => match image {
            DynamicImage::ImageLuma8(_) => image,
            other => DynamicImage::ImageLuma8(other.to_luma8()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn white_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([255; 3])))
    }

    #[test]
    fn missing_path_is_document_not_found() {
        let source = DirectorySource::new(RenderConfig::default());
        let err = source.render(Path::new("/nonexistent/scans")).unwrap_err();
        assert!(matches!(err, ScanwerkError::DocumentNotFound(_)));
    }

    #[test]
    fn directory_source_orders_pages_by_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Written out of order on purpose.
        for name in ["page_003.png", "page_001.png", "page_002.png"] {
            white_image(20, 30)
                .save(dir.path().join(name))
                .expect("save page");
        }
        // A non-image file must be ignored.
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").expect("write");

        let source = DirectorySource::new(RenderConfig::default());
        let pages = source.render(dir.path()).expect("render");

        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn directory_source_honours_gray_color_space() {
        let dir = tempfile::tempdir().expect("tempdir");
        white_image(10, 10)
            .save(dir.path().join("page_001.png"))
            .expect("save page");

        let config = RenderConfig {
            color_space: ColorSpace::Gray,
            ..RenderConfig::default()
        };
        let pages = DirectorySource::new(config).render(dir.path()).expect("render");
        assert!(matches!(pages[0].image, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn memory_source_round_trips_pages() {
        let source = MemorySource::new();
        source.insert("scan.batch", vec![white_image(10, 10), white_image(10, 10)]);

        let pages = source.render(Path::new("scan.batch")).expect("render");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].index, 1);

        let err = source.render(Path::new("other.batch")).unwrap_err();
        assert!(matches!(err, ScanwerkError::DocumentNotFound(_)));
    }
}
