//! Adaptive first-order low-pass filter.
//!
//! Tracks the magnitude of the timing-delta stream. The window length
//! switches between a narrow and a wide constant based on a deviation-ratio
//! test: outlier deltas (bursts, scheduler preemption) are absorbed through
//! the wide window so one preempted tick cannot drag the baseline.

use crate::config::PipelineConfig;

/// First-order exponential moving average: `value += (new - value) / L`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPassFilter {
    value: f64,
}

impl LowPassFilter {
    /// Seed the filter with its first observation.
    pub fn init(&mut self, initial: f64) {
        self.value = initial;
    }

    /// Fold one observation in with window length `length`.
    pub fn feed(&mut self, new_val: f64, length: f64) -> f64 {
        self.value += (new_val - self.value) / length;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Low-pass filter with dynamically switched window length.
#[derive(Debug, Clone)]
pub struct AdaptiveFilter {
    lpf: LowPassFilter,
    narrow: f64,
    wide: f64,
    ratio_low: f64,
    ratio_high: f64,
    /// Window used by the most recent adaptive feed.
    last_window: f64,
}

impl AdaptiveFilter {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            lpf: LowPassFilter::default(),
            narrow: cfg.narrow_window,
            wide: cfg.wide_window,
            ratio_low: cfg.ratio_low,
            ratio_high: cfg.ratio_high,
            last_window: cfg.narrow_window,
        }
    }

    pub fn init(&mut self, initial: f64) {
        self.lpf.init(initial);
    }

    /// Fixed narrow-window feed, used during INIT and RAMP.
    pub fn feed_fixed(&mut self, delta: f64) -> f64 {
        self.last_window = self.narrow;
        self.lpf.feed(delta, self.narrow)
    }

    /// Adaptive feed, used during NORMAL: the window widens when the delta
    /// deviates more than the ratio band from the current filtered value.
    pub fn feed(&mut self, delta: f64) -> f64 {
        let old = self.lpf.value();
        let ratio = if old > f64::EPSILON { delta / old } else { 1.0 };
        let window = if ratio < self.ratio_low || ratio > self.ratio_high {
            self.wide
        } else {
            self.narrow
        };
        self.last_window = window;
        self.lpf.feed(delta, window)
    }

    pub fn value(&self) -> f64 {
        self.lpf.value()
    }

    pub fn last_window(&self) -> f64 {
        self.last_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AdaptiveFilter {
        let mut f = AdaptiveFilter::new(&PipelineConfig::default());
        f.init(1000.0);
        f
    }

    #[test]
    fn lpf_converges_toward_input() {
        let mut lpf = LowPassFilter::default();
        lpf.init(0.0);
        for _ in 0..10_000 {
            lpf.feed(100.0, 100.0);
        }
        assert!((lpf.value() - 100.0).abs() < 1.0);
    }

    #[test]
    fn lpf_update_matches_weighted_mean_form() {
        // value + (d - value)/L == (d + (L-1)*value)/L
        let mut lpf = LowPassFilter::default();
        lpf.init(500.0);
        let updated = lpf.feed(800.0, 100.0);
        let expected = (800.0 + 99.0 * 500.0) / 100.0;
        assert!((updated - expected).abs() < 1e-9);
    }

    #[test]
    fn stable_delta_uses_narrow_window() {
        let mut f = filter();
        f.feed(1000.0); // ratio 1.0, inside [0.95, 1.05]
        assert_eq!(f.last_window(), 100.0);
    }

    #[test]
    fn outlier_delta_uses_wide_window() {
        let mut f = filter();
        f.feed(2000.0); // ratio 2.0
        assert_eq!(f.last_window(), 1000.0);

        let mut f = filter();
        f.feed(500.0); // ratio 0.5
        assert_eq!(f.last_window(), 1000.0);
    }

    #[test]
    fn band_edges_stay_narrow() {
        let mut f = filter();
        f.feed(950.0); // ratio exactly 0.95
        assert_eq!(f.last_window(), 100.0);

        let mut f = filter();
        f.feed(1050.0); // ratio exactly 1.05
        assert_eq!(f.last_window(), 100.0);
    }

    #[test]
    fn outlier_barely_moves_baseline() {
        let mut f = filter();
        f.feed(100_000.0);
        // Wide window: one outlier shifts the baseline by (d - old)/1000.
        assert!((f.value() - 1099.0).abs() < 1.0);
    }
}
