// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Near-duplicate report resolution.
//
// Each report group gets one representative fingerprint; every unordered
// pair is compared by Hamming distance (O(n²), fine for the tens of reports
// a batch produces). Clustering is a greedy union: when pair (i, j) with
// i < j is within threshold, j is removed from the unique set. Removal is
// NOT transitively re-clustered — a removed report still serves as a
// comparison basis, so if A~B and B~C, C is removed even when A and C are
// not within threshold. Downstream consumers depend on exactly this
// behaviour; keep it when touching the loop.

pub mod fingerprint;

pub use fingerprint::{Fingerprint, Fingerprinter};

use scanwerk_core::config::DuplicateConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::page::Page;

/// A detected duplicate pair. `index_a < index_b` by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEdge {
    pub index_a: usize,
    pub index_b: usize,
    /// Similarity in [0, 1], 1 meaning identical fingerprints.
    pub similarity: f64,
}

/// Finds near-duplicate report groups and selects survivors.
pub struct DuplicateResolver {
    fingerprinter: Fingerprinter,
    config: DuplicateConfig,
}

impl DuplicateResolver {
    pub fn new(config: DuplicateConfig) -> Self {
        info!(
            algorithm = ?config.hash_algorithm,
            hash_size = config.hash_size,
            threshold = config.hamming_distance_threshold,
            "duplicate resolver initialised"
        );
        Self {
            fingerprinter: Fingerprinter::new(config.hash_algorithm, config.hash_size),
            config,
        }
    }

    /// Fingerprint one report group.
    ///
    /// With `compare_first_page_only` the first page's hash is the group
    /// fingerprint. Otherwise up to the first three pages are hashed and the
    /// first of those hashes is used.
    // TODO: combine the sampled page hashes instead of returning only the
    // first one; changing this changes which reports are judged duplicates,
    // so it has to land together with a threshold recalibration.
    pub fn group_fingerprint(&self, pages: &[Page]) -> scanwerk_core::error::Result<Fingerprint> {
        let first = pages.first().ok_or_else(|| {
            scanwerk_core::error::ScanwerkError::FingerprintError(
                "cannot fingerprint an empty report".into(),
            )
        })?;

        if self.config.compare_first_page_only {
            return self.fingerprinter.hash(&first.image);
        }

        let sample = pages.len().min(3);
        let mut hashes = Vec::with_capacity(sample);
        for page in &pages[..sample] {
            hashes.push(self.fingerprinter.hash(&page.image)?);
        }
        Ok(hashes.remove(0))
    }

    /// Find duplicates across `groups`.
    ///
    /// Returns the sorted indices of the surviving (unique) groups and every
    /// duplicate edge found. A group whose fingerprint cannot be computed is
    /// logged and excluded from all comparisons — it counts as neither
    /// duplicate nor match.
    #[instrument(skip_all, fields(groups = groups.len()))]
    pub fn find_duplicates(&self, groups: &[&[Page]]) -> (Vec<usize>, Vec<DuplicateEdge>) {
        info!(groups = groups.len(), "analyzing report groups for duplicates");

        if groups.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let hashes: Vec<Option<Fingerprint>> = groups
            .iter()
            .enumerate()
            .map(|(idx, pages)| match self.group_fingerprint(pages) {
                Ok(hash) => Some(hash),
                Err(err) => {
                    error!(group = idx, error = %err, "fingerprint failed, excluding group from comparison");
                    None
                }
            })
            .collect();

        self.resolve(&hashes)
    }

    /// Run the pairwise comparison and greedy removal over precomputed
    /// fingerprints. `None` entries are skipped entirely.
    pub fn resolve(&self, hashes: &[Option<Fingerprint>]) -> (Vec<usize>, Vec<DuplicateEdge>) {
        let mut edges = Vec::new();
        let mut unique: Vec<bool> = vec![true; hashes.len()];

        for i in 0..hashes.len() {
            let Some(ref hash_i) = hashes[i] else {
                continue;
            };
            for j in (i + 1)..hashes.len() {
                let Some(ref hash_j) = hashes[j] else {
                    continue;
                };

                let distance = match hash_i.distance(hash_j) {
                    Ok(d) => d,
                    Err(err) => {
                        error!(i, j, error = %err, "fingerprints not comparable");
                        continue;
                    }
                };
                let similarity = 1.0 - f64::from(distance) / f64::from(hash_i.bit_len());

                debug!(i, j, distance, similarity = format!("{similarity:.3}"), "pair compared");

                if distance <= self.config.hamming_distance_threshold {
                    edges.push(DuplicateEdge {
                        index_a: i,
                        index_b: j,
                        similarity,
                    });
                    if unique[j] {
                        unique[j] = false;
                        info!(
                            kept = i + 1,
                            removed = j + 1,
                            similarity = format!("{:.1}%", similarity * 100.0),
                            "duplicate pair"
                        );
                    }
                }
            }
        }

        let unique_indices: Vec<usize> = unique
            .iter()
            .enumerate()
            .filter_map(|(idx, &keep)| keep.then_some(idx))
            .collect();

        info!(
            pairs = edges.len(),
            unique = unique_indices.len(),
            "duplicate resolution complete"
        );

        (unique_indices, edges)
    }

    /// Compare two specific groups.
    pub fn compare_groups(
        &self,
        a: &[Page],
        b: &[Page],
    ) -> scanwerk_core::error::Result<(bool, f64)> {
        let hash_a = self.group_fingerprint(a)?;
        let hash_b = self.group_fingerprint(b)?;
        let distance = hash_a.distance(&hash_b)?;
        let similarity = 1.0 - f64::from(distance) / f64::from(hash_a.bit_len());
        Ok((distance <= self.config.hamming_distance_threshold, similarity))
    }

    /// Full NxN similarity matrix for diagnostics: symmetric, 1.0 on the
    /// diagonal.
    ///
    /// Unlike [`find_duplicates`](Self::find_duplicates), fingerprint
    /// failures propagate — a diagnostic matrix with silent holes would be
    /// worse than no matrix.
    pub fn similarity_matrix(
        &self,
        groups: &[&[Page]],
    ) -> scanwerk_core::error::Result<Vec<Vec<f64>>> {
        let n = groups.len();
        let mut matrix = vec![vec![0.0f64; n]; n];

        let mut hashes = Vec::with_capacity(n);
        for pages in groups {
            hashes.push(self.group_fingerprint(pages)?);
        }

        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let distance = hashes[i].distance(&hashes[j])?;
                let similarity = 1.0 - f64::from(distance) / f64::from(hashes[i].bit_len());
                matrix[i][j] = similarity;
                matrix[j][i] = similarity;
            }
        }

        Ok(matrix)
    }
}
