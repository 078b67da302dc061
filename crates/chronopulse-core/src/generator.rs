//! Generator lifecycle: INIT → RAMP → NORMAL, plus the byte-stream facade.
//!
//! The state machine calibrates the quantizer exactly once, at the
//! RAMP→NORMAL transition, from the mean filtered value observed over the
//! ramp. NORMAL is terminal; a process restart starts cold from INIT.

use crate::clock::{DeltaSource, SamplerSet};
use crate::config::PipelineConfig;
use crate::error::GeneratorError;
use crate::filter::AdaptiveFilter;
use crate::lfsr::LfsrCorrector;
use crate::packet::PacketAssembler;
use crate::quantizer::Quantizer;

/// Lifecycle phase of a generator core. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Absorbing the first samples to establish an initial filtered value.
    Init,
    /// Filtering while the calibration mean accumulates.
    Ramp,
    /// Producing one e-bit per sample. Terminal.
    Normal,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Ramp => write!(f, "ramp"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Core state machine: consumes timing deltas, emits e-bits once NORMAL.
pub struct JitterCore {
    cfg: PipelineConfig,
    filter: AdaptiveFilter,
    quantizer: Quantizer,
    phase: Phase,
    steps_in_phase: u32,
    ramp_sum: f64,
}

impl JitterCore {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            filter: AdaptiveFilter::new(cfg),
            quantizer: Quantizer::new(cfg),
            phase: Phase::Init,
            steps_in_phase: 0,
            ramp_sum: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Process one timing delta. Returns an e-bit only in NORMAL.
    pub fn step(&mut self, delta: u64) -> Option<u8> {
        let delta = delta as f64;
        match self.phase {
            Phase::Init => {
                if self.steps_in_phase == 0 {
                    self.filter.init(delta);
                } else {
                    self.filter.feed_fixed(delta);
                }
                self.steps_in_phase += 1;
                if self.steps_in_phase >= self.cfg.init_steps {
                    self.phase = Phase::Ramp;
                    self.steps_in_phase = 0;
                }
                None
            }
            Phase::Ramp => {
                let filtered = self.filter.feed_fixed(delta);
                self.ramp_sum += filtered;
                self.steps_in_phase += 1;
                if self.steps_in_phase >= self.cfg.ramp_steps {
                    let mean = self.ramp_sum / f64::from(self.cfg.ramp_steps);
                    self.quantizer.calibrate(mean, &self.cfg);
                    self.phase = Phase::Normal;
                    self.steps_in_phase = 0;
                }
                None
            }
            Phase::Normal => {
                let filtered = self.filter.feed(delta);
                Some(self.quantizer.quantize(delta, filtered))
            }
        }
    }
}

/// Screens the first post-calibration e-bits for a collapsed distribution.
struct DegenerateGuard {
    window: usize,
    threshold: f64,
    counts: [u32; 256],
    seen: usize,
    verdict: Option<(u8, f64)>,
    done: bool,
}

impl DegenerateGuard {
    fn new(cfg: &PipelineConfig) -> Self {
        Self {
            window: cfg.degenerate_window,
            threshold: cfg.degenerate_threshold,
            counts: [0; 256],
            seen: 0,
            verdict: None,
            done: false,
        }
    }

    /// Feed one e-bit; returns the degenerate verdict once, at the end of
    /// the screening window.
    fn observe(&mut self, e_bit: u8) -> Option<(u8, f64)> {
        if self.done {
            return None;
        }
        self.counts[e_bit as usize] += 1;
        self.seen += 1;
        if self.seen < self.window {
            return None;
        }
        self.done = true;
        let (value, count) = self
            .counts
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)
            .map(|(v, &c)| (v as u8, c))
            .unwrap_or((0, 0));
        let fraction = f64::from(count) / self.seen as f64;
        if fraction > self.threshold {
            self.verdict = Some((value, fraction));
        }
        self.verdict
    }
}

/// The complete generator: sampler → filter/quantizer → LFSR → packets.
///
/// Owns all pipeline state exclusively; pass by `&mut`, never share. The
/// byte sequence is infinite and not restartable — every call advances
/// internal state irreversibly.
pub struct JitterGenerator<S: DeltaSource> {
    sampler: S,
    core: JitterCore,
    lfsr: LfsrCorrector,
    assembler: PacketAssembler,
    guard: DegenerateGuard,
    fatal: Option<(u8, f64)>,
}

impl JitterGenerator<SamplerSet> {
    /// Generator over the host's monotonic clocks.
    pub fn from_host_clock(cfg: &PipelineConfig) -> Self {
        Self::with_source(SamplerSet::new(cfg.max_anomaly_run), cfg)
    }
}

impl<S: DeltaSource> JitterGenerator<S> {
    /// Generator over an arbitrary delta source.
    pub fn with_source(sampler: S, cfg: &PipelineConfig) -> Self {
        Self {
            sampler,
            core: JitterCore::new(cfg),
            lfsr: LfsrCorrector::new(cfg.lfsr_seed),
            assembler: PacketAssembler::new(cfg),
            guard: DegenerateGuard::new(cfg),
            fatal: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    /// Discarded clock anomalies so far.
    pub fn anomalies(&self) -> u64 {
        self.sampler.anomalies()
    }

    /// Pull the next corrected byte, driving the pipeline as many samples as
    /// needed. Fatal after a degenerate-stream verdict: the instance must be
    /// discarded and recreated.
    pub fn next_byte(&mut self) -> Result<u8, GeneratorError> {
        loop {
            if let Some((value, fraction)) = self.fatal {
                return Err(GeneratorError::DegenerateStream { value, fraction });
            }
            if let Some(byte) = self.assembler.pop_byte() {
                return Ok(byte);
            }
            let delta = self.sampler.next_delta();
            if let Some(e_bit) = self.core.step(delta) {
                if let Some((value, fraction)) = self.guard.observe(e_bit) {
                    log::error!(
                        "degenerate e-bit stream: value {value} at fraction {fraction:.3}"
                    );
                    self.fatal = Some((value, fraction));
                    continue;
                }
                self.assembler.push_e_bit(e_bit, &mut self.lfsr);
            }
        }
    }

    /// Fill `buf` with corrected bytes.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<(), GeneratorError> {
        for slot in buf.iter_mut() {
            *slot = self.next_byte()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::clock::TimingSampler;

    /// Clock whose reading advances by a scripted, repeating jitter pattern.
    struct JitterClock {
        now: u64,
        pattern: Vec<u64>,
        pos: usize,
    }

    impl JitterClock {
        fn new(pattern: Vec<u64>) -> Self {
            Self {
                now: 0,
                pattern,
                pos: 0,
            }
        }
    }

    impl MonotonicClock for JitterClock {
        fn now_ns(&mut self) -> u64 {
            let step = self.pattern[self.pos % self.pattern.len()];
            self.pos += 1;
            self.now += step;
            self.now
        }
    }

    fn noisy_generator() -> JitterGenerator<TimingSampler<JitterClock>> {
        // Deltas hover around 1000 ns with visible spread.
        let pattern = vec![940, 1010, 985, 1100, 890, 1035, 960, 1200, 915, 1050];
        let cfg = PipelineConfig::default();
        JitterGenerator::with_source(TimingSampler::new(JitterClock::new(pattern)), &cfg)
    }

    fn constant_generator() -> JitterGenerator<TimingSampler<JitterClock>> {
        let cfg = PipelineConfig::default();
        JitterGenerator::with_source(TimingSampler::new(JitterClock::new(vec![1000])), &cfg)
    }

    #[test]
    fn phase_sequence_is_exact() {
        let cfg = PipelineConfig::default();
        let mut core = JitterCore::new(&cfg);
        assert_eq!(core.phase(), Phase::Init);
        for i in 0..3 {
            assert_eq!(core.phase(), Phase::Init, "sample {i}");
            assert!(core.step(1000 + i).is_none());
        }
        for i in 0..1000 {
            assert_eq!(core.phase(), Phase::Ramp, "ramp sample {i}");
            assert!(core.step(1000 + i % 7).is_none());
        }
        assert_eq!(core.phase(), Phase::Normal);
        assert!(core.step(1000).is_some());
        // Never regresses.
        for _ in 0..100 {
            core.step(50_000);
            assert_eq!(core.phase(), Phase::Normal);
        }
    }

    #[test]
    fn e_bits_always_in_byte_range() {
        let cfg = PipelineConfig::default();
        let mut core = JitterCore::new(&cfg);
        let mut produced = 0;
        for i in 0..10_000u64 {
            let delta = 500 + (i * 7919) % 2000; // rough spread
            if let Some(e) = core.step(delta) {
                let _: u8 = e;
                produced += 1;
            }
        }
        assert_eq!(produced, 10_000 - 3 - 1000);
    }

    #[test]
    fn generator_produces_bytes_after_warm_up() {
        let mut g = noisy_generator();
        let mut buf = [0u8; 256];
        g.fill(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b < 128), "packet bytes are 7-bit");
        assert_eq!(g.phase(), Phase::Normal);
    }

    #[test]
    fn constant_clock_trips_degenerate_guard() {
        // A perfectly flat delta stream quantizes every sample to the same
        // e-bit, which the guard must flag as zero-entropy.
        let mut g = constant_generator();
        let mut buf = [0u8; 4096];
        let err = loop {
            if let Err(e) = g.fill(&mut buf) {
                break e;
            }
        };
        match err {
            GeneratorError::DegenerateStream { fraction, .. } => {
                assert!(fraction > 0.99);
            }
            other => panic!("expected degenerate stream, got {other}"),
        }
    }

    #[test]
    fn fatal_generator_stays_fatal() {
        let mut g = constant_generator();
        let mut buf = [0u8; 4096];
        while g.fill(&mut buf).is_ok() {}
        assert!(g.next_byte().is_err());
        assert!(g.next_byte().is_err());
    }

    #[test]
    fn byte_stream_is_deterministic_for_identical_deltas() {
        let mut a = noisy_generator();
        let mut b = noisy_generator();
        let mut buf_a = [0u8; 128];
        let mut buf_b = [0u8; 128];
        a.fill(&mut buf_a).unwrap();
        b.fill(&mut buf_b).unwrap();
        assert_eq!(buf_a, buf_b);
    }
}
