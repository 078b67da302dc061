//! Pipeline configuration.
//!
//! Every canonical constant of the jitter pipeline lives here so it can be
//! recalibrated per platform without touching pipeline logic. The defaults
//! reproduce the reference timing-noise calibration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;

/// Canonical constants for one generator instance.
///
/// Loadable from JSON via [`PipelineConfig::load`]; [`Default`] carries the
/// reference values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples absorbed in the INIT phase before ramping (first sample
    /// initializes the filter).
    pub init_steps: u32,
    /// Samples absorbed in the RAMP phase while the calibration mean
    /// accumulates.
    pub ramp_steps: u32,
    /// Narrow low-pass window length, used when the stream is stable.
    pub narrow_window: f64,
    /// Wide low-pass window length, used for outlier deltas (bursts,
    /// scheduler preemption).
    pub wide_window: f64,
    /// Lower bound of the stable-ratio band.
    pub ratio_low: f64,
    /// Upper bound of the stable-ratio band.
    pub ratio_high: f64,
    /// Target mean e-bit value for divisor calibration.
    ///
    /// Derived empirically from the reference hardware; only approximately
    /// portable to nanosecond-resolution software clocks. Treat as requiring
    /// platform-specific validation — the degenerate-stream guard is the
    /// runtime backstop when this value is wrong for the host.
    pub target_mean: f64,
    /// Quantizer divisor before calibration.
    pub initial_divisor: f64,
    /// Lower clamp for the calibrated divisor.
    pub divisor_min: f64,
    /// Upper clamp for the calibrated divisor.
    pub divisor_max: f64,
    /// 63-bit LFSR seed. Must be nonzero.
    pub lfsr_seed: u64,
    /// Bytes per assembled packet.
    pub packet_len: usize,
    /// Redundant packets assembled per e-bit.
    pub redundancy: usize,
    /// Assembled packets discarded before any byte is surfaced.
    pub warmup_packets: usize,
    /// Number of post-calibration e-bits screened by the degenerate guard.
    pub degenerate_window: usize,
    /// Modal fraction above which the screened window is considered
    /// degenerate (zero-entropy) and the generator goes fatal.
    pub degenerate_threshold: f64,
    /// Consecutive primary-sampler anomalies tolerated before the fallback
    /// producer takes over.
    pub max_anomaly_run: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            init_steps: 3,
            ramp_steps: 1000,
            narrow_window: 100.0,
            wide_window: 1000.0,
            ratio_low: 0.95,
            ratio_high: 1.05,
            target_mean: 128.0,
            initial_divisor: 33333.0,
            divisor_min: 32.0,
            divisor_max: 16384.0,
            lfsr_seed: 0x2AAA_AAAA_AAAA_AAAA,
            packet_len: 17,
            redundancy: 4,
            warmup_packets: 10,
            degenerate_window: 1000,
            degenerate_threshold: 0.99,
            max_anomaly_run: 64,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GeneratorError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
