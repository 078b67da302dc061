//! Stream quality metrics.
//!
//! Bias preservation is the point of this pipeline, so the metrics here
//! measure structure rather than enforce uniformity: Shannon entropy,
//! modal concentration, compressibility, and a chi-squared statistic
//! against the uniform byte distribution.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Serialize;

/// Per-value byte histogram.
pub fn byte_histogram(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

/// Shannon entropy in bits per byte (max 8.0).
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let counts = byte_histogram(data);
    let n = data.len() as f64;
    let mut h = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.log2();
        }
    }
    h
}

/// Most frequent byte value and its fraction of the sample.
pub fn dominant_fraction(data: &[u8]) -> (u8, f64) {
    if data.is_empty() {
        return (0, 0.0);
    }
    let counts = byte_histogram(data);
    let (value, count) = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .map(|(v, &c)| (v as u8, c))
        .unwrap_or((0, 0));
    (value, count as f64 / data.len() as f64)
}

/// Zlib compression ratio (compressed / original). Near 1.0 means
/// incompressible; structured streams compress well below 1.0.
pub fn compression_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap_or_default();
    let compressed = encoder.finish().unwrap_or_default();
    compressed.len() as f64 / data.len() as f64
}

/// Chi-squared statistic of the byte distribution against uniform
/// (255 degrees of freedom). The caller decides significance.
pub fn chi_squared_uniform(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let counts = byte_histogram(data);
    let expected = data.len() as f64 / 256.0;
    counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum()
}

/// Summary of one stream sample.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub samples: usize,
    pub shannon_entropy: f64,
    pub dominant_value: u8,
    pub dominant_fraction: f64,
    pub compression_ratio: f64,
    pub chi_squared: f64,
}

/// Compute the full metric set for one byte sample.
pub fn stream_report(data: &[u8]) -> StreamReport {
    let (dominant_value, dominant) = dominant_fraction(data);
    StreamReport {
        samples: data.len(),
        shannon_entropy: shannon_entropy(data),
        dominant_value,
        dominant_fraction: dominant,
        compression_ratio: compression_ratio(data),
        chi_squared: chi_squared_uniform(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ChiSquared, ContinuousCDF};

    #[test]
    fn entropy_of_constant_stream_is_zero() {
        assert_eq!(shannon_entropy(&[42u8; 1024]), 0.0);
    }

    #[test]
    fn entropy_of_all_values_is_eight_bits() {
        let data: Vec<u8> = (0..=255).collect();
        assert!((shannon_entropy(&data) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn dominant_fraction_flags_collapse() {
        let mut data = vec![7u8; 990];
        data.extend([1, 2, 3, 4, 5, 6, 8, 9, 10, 11]);
        let (value, fraction) = dominant_fraction(&data);
        assert_eq!(value, 7);
        assert!(fraction > 0.98);
    }

    #[test]
    fn constant_stream_compresses_hard() {
        assert!(compression_ratio(&[0u8; 4096]) < 0.05);
    }

    #[test]
    fn chi_squared_zero_for_exact_uniform() {
        let data: Vec<u8> = (0..=255).cycle().take(256 * 16).map(|v| v as u8).collect();
        assert!(chi_squared_uniform(&data) < 1e-9);
    }

    #[test]
    fn skewed_stream_rejects_uniformity() {
        // A jitter-like skew: values concentrated in a narrow band, the way
        // post-calibration e-bits cluster. Chi-squared p must fall below
        // 0.05 against uniform.
        let mut data = Vec::with_capacity(5000);
        for i in 0..5000u32 {
            data.push((96 + (i * 31 % 64)) as u8);
        }
        let stat = chi_squared_uniform(&data);
        let dist = ChiSquared::new(255.0).unwrap();
        let p = dist.sf(stat);
        assert!(p < 0.05, "p = {p}");
    }

    #[test]
    fn report_carries_all_metrics() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let r = stream_report(&data);
        assert_eq!(r.samples, 4096);
        assert!(r.shannon_entropy > 7.0);
        assert!(r.compression_ratio > 0.0);
        assert!(r.chi_squared > 0.0);
    }
}
