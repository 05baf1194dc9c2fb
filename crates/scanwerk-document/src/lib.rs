// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Everything that touches pixels for the Scanwerk batch
// engine.
//
// Provides page sources (turning a submitted document into decoded pages),
// blank page analysis, report boundary segmentation, perceptual-hash
// deduplication, and artifact writing. OCR-backed header detection lives
// behind the "ocr" feature gate.

pub mod analyze;
pub mod dedup;
pub mod output;
pub mod page;
pub mod segment;
pub mod source;

pub use analyze::{BlankClassifier, SignalBundle};
pub use dedup::{DuplicateEdge, DuplicateResolver, Fingerprint, Fingerprinter};
pub use output::{ReportProvenance, ReportWriter};
pub use page::Page;
pub use segment::{BoundarySegmenter, Report, TextExtractor};
pub use source::{DirectorySource, MemorySource, PageSource};

#[cfg(feature = "ocr")]
pub use segment::ocr::OcrTextExtractor;
