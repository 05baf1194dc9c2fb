// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report writer — encode surviving reports back into output artifacts.
//
// Each report becomes a multi-page PDF (via `printpdf` 0.8's data-oriented
// API: pages are `PdfPage` structs carrying `Vec<Op>` operation lists) and/or
// a directory of per-page PNGs, with an optional JSON metadata sidecar
// carrying the provenance the pipeline attaches.

use std::path::{Path, PathBuf};

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use scanwerk_core::config::{OutputConfig, OutputFormat};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ArtifactInfo, ProcessingMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::page::Page;

/// Provenance metadata attached to each written report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    /// Indices the report's pages had in the source document.
    pub original_page_indices: Vec<usize>,
    pub total_pages: usize,
    pub blank_pages_removed: usize,
    pub duplicate_reports_removed: usize,
    pub processing_mode: ProcessingMode,
}

/// Writes report pages to the output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
    config: OutputConfig,
    /// DPI the pages were rendered at; fixes the physical page size of PDF
    /// output.
    dpi: u32,
}

impl ReportWriter {
    /// Create a writer rooted at `output_dir`, creating the directory (and
    /// parents) if absent.
    #[instrument(skip_all, fields(output_dir = %output_dir.as_ref().display()))]
    pub fn new(output_dir: impl AsRef<Path>, config: OutputConfig, dpi: u32) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        info!(format = ?config.format, "report writer initialised");
        Ok(Self {
            output_dir,
            config,
            dpi: dpi.max(1),
        })
    }

    /// Write one report.
    ///
    /// `index` is the 1-based report number used in the artifact filename;
    /// `stem` is the sanitised submission name prefixed to it.
    #[instrument(skip(self, pages, provenance), fields(index, pages = pages.len()))]
    pub fn write_report(
        &self,
        pages: &[Page],
        index: usize,
        provenance: &ReportProvenance,
        stem: &str,
    ) -> Result<ArtifactInfo> {
        if pages.is_empty() {
            return Err(ScanwerkError::OutputError(format!(
                "report {index} has no pages"
            )));
        }

        let basename = format!("{}_report_{index:04}", sanitize_stem(stem));

        let mut pdf_path = None;
        let mut images_dir = None;

        if matches!(self.config.format, OutputFormat::Pdf | OutputFormat::Both) {
            let path = self.output_dir.join(format!("{basename}.pdf"));
            let bytes = self.encode_pdf(pages, &basename)?;
            std::fs::write(&path, &bytes)?;
            info!(path = %path.display(), pages = pages.len(), "report written as PDF");
            pdf_path = Some(path);
        }

        if matches!(self.config.format, OutputFormat::Images | OutputFormat::Both) {
            let dir = self.output_dir.join(&basename);
            std::fs::create_dir_all(&dir)?;
            for (n, page) in pages.iter().enumerate() {
                let path = dir.join(format!("page_{:03}.png", n + 1));
                page.image.save(&path).map_err(|err| {
                    ScanwerkError::OutputError(format!(
                        "failed to save {}: {}",
                        path.display(),
                        err
                    ))
                })?;
            }
            info!(dir = %dir.display(), pages = pages.len(), "report written as images");
            images_dir = Some(dir);
        }

        let metadata_path = if self.config.include_metadata {
            Some(self.write_metadata(&basename, pages, provenance)?)
        } else {
            None
        };

        // The PDF is the primary artifact when both formats were written.
        let primary = pdf_path.or(images_dir).ok_or_else(|| {
            ScanwerkError::OutputError("no output format produced an artifact".into())
        })?;
        let file_size_bytes = artifact_size(&primary)?;

        Ok(ArtifactInfo {
            path: primary,
            page_count: pages.len(),
            file_size_bytes,
            metadata_path,
        })
    }

    /// Encode report pages as a multi-page PDF, one full-bleed page per
    /// image, sized from the pixel dimensions at the configured DPI.
    fn encode_pdf(&self, pages: &[Page], title: &str) -> Result<Vec<u8>> {
        let mut doc = PdfDocument::new(title);
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for page in pages {
            let rgb = page.image.to_rgb8();
            let (px_w, px_h) = rgb.dimensions();

            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: px_w as usize,
                height: px_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let page_w = Mm(px_w as f32 / self.dpi as f32 * 25.4);
            let page_h = Mm(px_h as f32 / self.dpi as f32 * 25.4);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: Some(1.0),
                    scale_y: Some(1.0),
                    dpi: Some(self.dpi as f32),
                    rotate: None,
                },
            }];

            pdf_pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(pages = pages.len(), bytes = bytes.len(), "PDF encoded");
        Ok(bytes)
    }

    /// Write the JSON metadata sidecar for a report.
    fn write_metadata(
        &self,
        basename: &str,
        pages: &[Page],
        provenance: &ReportProvenance,
    ) -> Result<PathBuf> {
        #[derive(Serialize)]
        struct Sidecar<'a> {
            filename: &'a str,
            page_count: usize,
            processed_at: String,
            image_dimensions: Vec<[u32; 2]>,
            #[serde(flatten)]
            provenance: &'a ReportProvenance,
        }

        let path = self.output_dir.join(format!("{basename}_metadata.json"));
        let sidecar = Sidecar {
            filename: basename,
            page_count: pages.len(),
            processed_at: chrono::Utc::now().to_rfc3339(),
            image_dimensions: pages
                .iter()
                .map(|p| {
                    let (w, h) = p.dimensions();
                    [w, h]
                })
                .collect(),
            provenance,
        };
        std::fs::write(&path, serde_json::to_vec_pretty(&sidecar)?)?;
        debug!(path = %path.display(), "metadata sidecar written");
        Ok(path)
    }
}

/// Strip path separators and special characters from a submission name.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .trim_end_matches(".pdf")
        .trim_end_matches(".PDF")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "report".into()
    } else {
        cleaned
    }
}

/// Total on-disk size of an artifact (file, or directory contents).
fn artifact_size(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path)?;
    if meta.is_file() {
        return Ok(meta.len());
    }
    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        total += entry?.metadata()?.len();
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn provenance() -> ReportProvenance {
        ReportProvenance {
            original_page_indices: vec![1, 3, 5],
            total_pages: 6,
            blank_pages_removed: 3,
            duplicate_reports_removed: 0,
            processing_mode: ProcessingMode::BlankRemovalOnly,
        }
    }

    fn report_pages(n: usize) -> Vec<Page> {
        (0..n)
            .map(|i| {
                Page::new(
                    DynamicImage::ImageRgb8(RgbImage::from_pixel(
                        120,
                        160,
                        image::Rgb([200; 3]),
                    )),
                    i,
                )
            })
            .collect()
    }

    #[test]
    fn writes_pdf_with_metadata_sidecar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer =
            ReportWriter::new(dir.path().join("out"), OutputConfig::default(), 200).expect("writer");

        let artifact = writer
            .write_report(&report_pages(3), 1, &provenance(), "batch scan.pdf")
            .expect("write");

        assert!(artifact.path.exists());
        assert_eq!(
            artifact.path.file_name().and_then(|n| n.to_str()),
            Some("batch_scan_report_0001.pdf")
        );
        assert_eq!(artifact.page_count, 3);
        assert!(artifact.file_size_bytes > 0);

        let sidecar = artifact.metadata_path.expect("sidecar written");
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&sidecar).expect("read sidecar"))
                .expect("parse sidecar");
        assert_eq!(json["page_count"], 3);
        assert_eq!(json["original_page_indices"], serde_json::json!([1, 3, 5]));
        assert_eq!(json["processing_mode"], "blank_removal_only");
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("deeply/nested/out");
        ReportWriter::new(&nested, OutputConfig::default(), 200).expect("writer");
        assert!(nested.is_dir());
    }

    #[test]
    fn image_format_writes_page_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = OutputConfig {
            format: OutputFormat::Images,
            include_metadata: false,
        };
        let writer = ReportWriter::new(dir.path(), config, 200).expect("writer");

        let artifact = writer
            .write_report(&report_pages(2), 2, &provenance(), "scan")
            .expect("write");

        assert!(artifact.path.is_dir());
        assert!(artifact.path.join("page_001.png").exists());
        assert!(artifact.path.join("page_002.png").exists());
        assert!(artifact.metadata_path.is_none());
    }

    #[test]
    fn empty_report_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = ReportWriter::new(dir.path(), OutputConfig::default(), 200).expect("writer");
        assert!(writer.write_report(&[], 1, &provenance(), "scan").is_err());
    }

    #[test]
    fn stem_sanitisation_strips_separators() {
        assert_eq!(sanitize_stem("ward 7/batch#3.pdf"), "ward_7_batch_3");
        assert_eq!(sanitize_stem(""), "report");
    }
}
