//! Monotonic clocks and the timing sampler.
//!
//! The sampler converts successive clock reads into strictly positive
//! inter-event deltas. Clock anomalies (non-positive deltas) are discarded
//! and counted without advancing any downstream state.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A clock that never goes backwards.
///
/// Abstracted behind a trait so the pipeline can be calibrated against the
/// host's best timer and driven deterministically in tests.
pub trait MonotonicClock {
    /// Current reading in nanoseconds. The reference point is arbitrary but
    /// fixed for the lifetime of the clock.
    fn now_ns(&mut self) -> u64;
}

/// High-resolution clock backed by [`std::time::Instant`].
///
/// This is the primary producer on every supported platform.
pub struct InstantClock {
    epoch: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn now_ns(&mut self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// Coarse fallback clock backed by [`std::time::SystemTime`].
///
/// Lower resolution and not strictly monotonic under clock steps; the
/// sampler's anomaly handling absorbs regressions. Used only when the
/// primary producer stops delivering usable deltas.
pub struct CoarseClock;

impl MonotonicClock for CoarseClock {
    fn now_ns(&mut self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Anything that can feed timing deltas into the pipeline.
pub trait DeltaSource {
    /// Next strictly positive inter-event delta in nanoseconds.
    fn next_delta(&mut self) -> u64;

    /// Discarded clock anomalies so far (metric, never an error).
    fn anomalies(&self) -> u64;
}

/// Produces successive inter-event deltas from one monotonic clock.
pub struct TimingSampler<C: MonotonicClock> {
    clock: C,
    prev: u64,
    primed: bool,
    anomalies: u64,
}

impl<C: MonotonicClock> TimingSampler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            prev: 0,
            primed: false,
            anomalies: 0,
        }
    }

    /// One sampling attempt. `None` means the clock reported a non-positive
    /// delta; the sample is discarded, the anomaly counter advances, and no
    /// other state moves.
    pub fn try_delta(&mut self) -> Option<u64> {
        let now = self.clock.now_ns();
        if !self.primed {
            self.prev = now;
            self.primed = true;
            return None;
        }
        if now > self.prev {
            let delta = now - self.prev;
            self.prev = now;
            return Some(delta);
        }
        self.anomalies += 1;
        None
    }
}

impl<C: MonotonicClock> DeltaSource for TimingSampler<C> {
    fn next_delta(&mut self) -> u64 {
        loop {
            if let Some(delta) = self.try_delta() {
                return delta;
            }
            std::hint::spin_loop();
        }
    }

    fn anomalies(&self) -> u64 {
        self.anomalies
    }
}

/// Primary + fallback samplers behind one consumer.
///
/// The redesign of interleaved foreground/background callbacks: both clocks
/// are interchangeable producers, and a liveness policy (a run of
/// consecutive anomalies on the primary) selects which one feeds the
/// pipeline. The switch is one-way for the life of the set.
pub struct SamplerSet {
    primary: TimingSampler<InstantClock>,
    fallback: TimingSampler<CoarseClock>,
    max_anomaly_run: u32,
    anomaly_run: u32,
    on_fallback: bool,
}

impl SamplerSet {
    pub fn new(max_anomaly_run: u32) -> Self {
        Self {
            primary: TimingSampler::new(InstantClock::new()),
            fallback: TimingSampler::new(CoarseClock),
            max_anomaly_run,
            anomaly_run: 0,
            on_fallback: false,
        }
    }

    /// Whether the liveness policy has demoted the primary producer.
    pub fn on_fallback(&self) -> bool {
        self.on_fallback
    }
}

impl DeltaSource for SamplerSet {
    fn next_delta(&mut self) -> u64 {
        loop {
            if self.on_fallback {
                if let Some(delta) = self.fallback.try_delta() {
                    return delta;
                }
                std::hint::spin_loop();
                continue;
            }
            match self.primary.try_delta() {
                Some(delta) => {
                    self.anomaly_run = 0;
                    return delta;
                }
                None => {
                    self.anomaly_run += 1;
                    if self.anomaly_run > self.max_anomaly_run {
                        log::warn!(
                            "primary sampler stalled after {} anomalies, switching to coarse clock",
                            self.anomaly_run
                        );
                        self.on_fallback = true;
                    }
                    std::hint::spin_loop();
                }
            }
        }
    }

    fn anomalies(&self) -> u64 {
        self.primary.anomalies + self.fallback.anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock driven by a scripted sequence of readings.
    pub(crate) struct ScriptedClock {
        readings: Vec<u64>,
        pos: usize,
    }

    impl ScriptedClock {
        pub(crate) fn new(readings: Vec<u64>) -> Self {
            Self { readings, pos: 0 }
        }
    }

    impl MonotonicClock for ScriptedClock {
        fn now_ns(&mut self) -> u64 {
            let v = self.readings[self.pos.min(self.readings.len() - 1)];
            self.pos += 1;
            v
        }
    }

    #[test]
    fn instant_clock_is_monotonic() {
        let mut clock = InstantClock::new();
        let t1 = clock.now_ns();
        let t2 = clock.now_ns();
        assert!(t2 >= t1);
    }

    #[test]
    fn first_read_primes_without_output() {
        let mut sampler = TimingSampler::new(ScriptedClock::new(vec![100, 150]));
        assert_eq!(sampler.try_delta(), None);
        assert_eq!(sampler.try_delta(), Some(50));
        assert_eq!(sampler.anomalies(), 0);
    }

    #[test]
    fn zero_delta_discarded_and_counted() {
        // 100 (prime), 100 (anomaly), 100 (anomaly), 130 (delta 30)
        let mut sampler = TimingSampler::new(ScriptedClock::new(vec![100, 100, 100, 130]));
        assert_eq!(sampler.next_delta(), 30);
        assert_eq!(sampler.anomalies(), 2);
    }

    #[test]
    fn regression_discarded_and_counted() {
        let mut sampler = TimingSampler::new(ScriptedClock::new(vec![100, 90, 140]));
        assert_eq!(sampler.next_delta(), 40);
        assert_eq!(sampler.anomalies(), 1);
    }

    #[test]
    fn deltas_are_never_zero() {
        let mut sampler = TimingSampler::new(InstantClock::new());
        for _ in 0..1000 {
            assert!(sampler.next_delta() > 0);
        }
    }

    #[test]
    fn sampler_set_starts_on_primary() {
        let mut set = SamplerSet::new(64);
        assert!(!set.on_fallback());
        assert!(set.next_delta() > 0);
        assert!(!set.on_fallback());
    }
}
