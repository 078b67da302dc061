//! Delta quantization into byte-valued e-bits.
//!
//! Maps a raw timing delta and the current filtered value to an 8-bit value
//! while preserving the natural skew of the jitter distribution. No
//! whitening happens here.

use crate::config::PipelineConfig;

/// Quantizer with a once-calibrated divisor.
#[derive(Debug, Clone)]
pub struct Quantizer {
    divisor: f64,
    calibrated: bool,
}

impl Quantizer {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            divisor: cfg.initial_divisor,
            calibrated: false,
        }
    }

    /// Calibrate the divisor from the mean filtered value observed over the
    /// ramp. Runs exactly once per instance lifetime; a second call is a
    /// logic error upstream and is ignored with a log.
    pub fn calibrate(&mut self, mean_filtered: f64, cfg: &PipelineConfig) {
        if self.calibrated {
            log::error!("quantizer calibrate called twice, ignoring");
            return;
        }
        let divisor = mean_filtered / cfg.target_mean;
        self.divisor = divisor.clamp(cfg.divisor_min, cfg.divisor_max);
        self.calibrated = true;
        log::info!(
            "quantizer calibrated: mean_filtered={mean_filtered:.1} divisor={:.2}",
            self.divisor
        );
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Quantize one delta against the current filtered value:
    /// `e_bit = round(delta / (filtered / divisor))`, clamped to `[0, 255]`.
    pub fn quantize(&self, delta: f64, filtered: f64) -> u8 {
        let mut q_factor = filtered / self.divisor;
        if q_factor <= 0.0 {
            q_factor = 1.0;
        }
        let e = (delta / q_factor + 0.5).floor();
        e.clamp(0.0, 255.0) as u8
    }
}
