// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perceptual fingerprints for approximate page comparison.
//
// Hashes are fixed-width bit strings compared by Hamming distance — never
// used for exact identity. The algorithm set is closed: an unknown name is
// a configuration error at parse time, and the `img_hash` strategy is bound
// once at construction.

use image::DynamicImage;
use img_hash::{HashAlg, HasherConfig};
use scanwerk_core::config::FingerprintAlgorithm;
use scanwerk_core::error::{Result, ScanwerkError};
use serde::{Deserialize, Serialize};

/// A fixed-width perceptual hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Wrap raw hash bytes (e.g. persisted or hand-crafted values).
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total number of bits in this fingerprint.
    pub fn bit_len(&self) -> u32 {
        (self.bytes.len() * 8) as u32
    }

    /// Hamming distance to another fingerprint of the same width.
    ///
    /// # Errors
    ///
    /// Returns [`ScanwerkError::FingerprintError`] when the widths differ —
    /// fingerprints from different hash configurations are not comparable.
    pub fn distance(&self, other: &Fingerprint) -> Result<u32> {
        if self.bytes.len() != other.bytes.len() {
            return Err(ScanwerkError::FingerprintError(format!(
                "hash length mismatch: {} vs {} bytes",
                self.bytes.len(),
                other.bytes.len()
            )));
        }
        Ok(self
            .bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum())
    }
}

/// Computes perceptual fingerprints for page images.
pub struct Fingerprinter {
    hasher: img_hash::Hasher,
}

impl Fingerprinter {
    /// Bind the given algorithm and hash size into a hasher.
    ///
    /// A hash size of 8 yields a 64-bit fingerprint.
    pub fn new(algorithm: FingerprintAlgorithm, hash_size: u32) -> Self {
        let config = HasherConfig::new().hash_size(hash_size, hash_size);
        let config = match algorithm {
            FingerprintAlgorithm::Perceptual => config.hash_alg(HashAlg::Mean).preproc_dct(),
            FingerprintAlgorithm::Difference => config.hash_alg(HashAlg::Gradient),
            // img_hash has no wavelet transform; block mean is the nearest
            // available reduction.
            FingerprintAlgorithm::Wavelet => config.hash_alg(HashAlg::Blockhash),
            FingerprintAlgorithm::Average => config.hash_alg(HashAlg::Mean),
        };
        Self {
            hasher: config.to_hasher(),
        }
    }

    /// Fingerprint a single image.
    pub fn hash(&self, image: &DynamicImage) -> Result<Fingerprint> {
        let bridged = bridge_image(image)?;
        let hash = self.hasher.hash_image(&bridged);
        Ok(Fingerprint::from_bytes(hash.as_bytes()))
    }
}

/// Re-wrap pixel data for the image version `img_hash` links against.
///
/// `img_hash` 3.x re-exports its own `image` crate; handing it our buffers
/// requires rebuilding the container around the raw RGBA bytes.
fn bridge_image(image: &DynamicImage) -> Result<img_hash::image::DynamicImage> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let buffer: img_hash::image::ImageBuffer<img_hash::image::Rgba<u8>, Vec<u8>> =
        img_hash::image::ImageBuffer::from_raw(width, height, rgba.into_raw()).ok_or_else(
            || {
                ScanwerkError::FingerprintError(format!(
                    "failed to rebuild {width}x{height} image buffer for hashing"
                ))
            },
        )?;
    Ok(img_hash::image::DynamicImage::ImageRgba8(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn gradient_page() -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, _| image::Rgb([(x * 4) as u8; 3]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let fingerprinter = Fingerprinter::new(FingerprintAlgorithm::Perceptual, 8);
        let a = fingerprinter.hash(&gradient_page()).expect("hash a");
        let b = fingerprinter.hash(&gradient_page()).expect("hash b");
        assert_eq!(a.distance(&b).expect("distance"), 0);
    }

    #[test]
    fn hash_size_8_yields_64_bits() {
        let fingerprinter = Fingerprinter::new(FingerprintAlgorithm::Average, 8);
        let hash = fingerprinter.hash(&gradient_page()).expect("hash");
        assert_eq!(hash.bit_len(), 64);
    }

    #[test]
    fn distance_counts_differing_bits() {
        let a = Fingerprint::from_bytes(vec![0b0000_0000u8]);
        let b = Fingerprint::from_bytes(vec![0b0000_0111u8]);
        assert_eq!(a.distance(&b).expect("distance"), 3);
    }

    #[test]
    fn mismatched_widths_are_an_error() {
        let a = Fingerprint::from_bytes(vec![0u8; 8]);
        let b = Fingerprint::from_bytes(vec![0u8; 16]);
        assert!(a.distance(&b).is_err());
    }

    #[test]
    fn every_algorithm_produces_a_hash() {
        for algorithm in [
            FingerprintAlgorithm::Perceptual,
            FingerprintAlgorithm::Difference,
            FingerprintAlgorithm::Wavelet,
            FingerprintAlgorithm::Average,
        ] {
            let fingerprinter = Fingerprinter::new(algorithm, 8);
            let hash = fingerprinter.hash(&gradient_page()).expect("hash");
            assert!(!hash.as_bytes().is_empty(), "{algorithm:?} produced empty hash");
        }
    }
}
