//! Epoch identifiers, window math, and wall clocks.
//!
//! One epoch is a fixed 10-second window derived from wall-clock time.
//! Commit-before-reveal ordering is enforced purely by these deadlines, not
//! by any lock.

use serde::{Deserialize, Serialize};

/// Protocol timing and acceptance constants. Configuration, not magic
/// numbers — cross-deployment retuning happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    /// Full epoch duration in milliseconds.
    pub epoch_ms: u64,
    /// Commit deadline offset from epoch start.
    pub commit_window_ms: u64,
    /// Reveal window opening offset from epoch start.
    pub reveal_open_ms: u64,
    /// Reveal window duration; the reveal deadline is
    /// `reveal_open_ms + reveal_window_ms` (the epoch end).
    pub reveal_window_ms: u64,
    /// Entropy trace size each participant contributes per epoch.
    pub trace_len: usize,
    /// Minimum fraction of genuinely revealed contributions for a pulse to
    /// be published. Boundary-inclusive.
    pub honest_threshold: f64,
    /// Ledgers older than this many epochs behind the current one are
    /// evicted, closed or not; a long-running mixer stays bounded.
    pub retention_epochs: u64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            epoch_ms: 10_000,
            commit_window_ms: 5_000,
            reveal_open_ms: 6_000,
            reveal_window_ms: 4_000,
            trace_len: 1024,
            honest_threshold: 0.40,
            retention_epochs: 360,
        }
    }
}

/// Wall-clock-derived epoch index: `floor(now / epoch_ms)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpochId(pub u64);

impl EpochId {
    pub fn from_unix_ms(now_ms: u64, cfg: &EpochConfig) -> Self {
        Self(now_ms / cfg.epoch_ms)
    }

    /// Saturating: epoch ids arrive off the wire, and an absurd id must
    /// yield an unreachable deadline, not an overflow panic.
    pub fn start_ms(self, cfg: &EpochConfig) -> u64 {
        self.0.saturating_mul(cfg.epoch_ms)
    }

    /// Commits at or after this instant are rejected.
    pub fn commit_deadline_ms(self, cfg: &EpochConfig) -> u64 {
        self.start_ms(cfg).saturating_add(cfg.commit_window_ms)
    }

    /// Reveals before this instant are rejected.
    pub fn reveal_open_ms(self, cfg: &EpochConfig) -> u64 {
        self.start_ms(cfg).saturating_add(cfg.reveal_open_ms)
    }

    /// Reveals at or after this instant are treated as missing.
    pub fn reveal_deadline_ms(self, cfg: &EpochConfig) -> u64 {
        self.start_ms(cfg)
            .saturating_add(cfg.reveal_open_ms)
            .saturating_add(cfg.reveal_window_ms)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for EpochId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of wall-clock time in unix milliseconds.
pub trait WallClock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// System wall clock. Epoch ids in production derive from this.
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock pinned to the tokio timer, for simulations and paused-runtime
/// tests: sleeping advances it deterministically.
pub struct SimClock {
    origin_ms: u64,
    started: tokio::time::Instant,
}

impl SimClock {
    /// Must be called within a tokio runtime.
    pub fn new(origin_ms: u64) -> Self {
        Self {
            origin_ms,
            started: tokio::time::Instant::now(),
        }
    }
}

impl WallClock for SimClock {
    fn now_ms(&self) -> u64 {
        self.origin_ms + self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_id_is_floor_of_ten_seconds() {
        let cfg = EpochConfig::default();
        assert_eq!(EpochId::from_unix_ms(0, &cfg), EpochId(0));
        assert_eq!(EpochId::from_unix_ms(9_999, &cfg), EpochId(0));
        assert_eq!(EpochId::from_unix_ms(10_000, &cfg), EpochId(1));
        assert_eq!(EpochId::from_unix_ms(1_755_000_123_456, &cfg), EpochId(175_500_012));
    }

    #[test]
    fn window_layout_matches_protocol() {
        let cfg = EpochConfig::default();
        let e = EpochId(7);
        assert_eq!(e.start_ms(&cfg), 70_000);
        assert_eq!(e.commit_deadline_ms(&cfg), 75_000);
        assert_eq!(e.reveal_open_ms(&cfg), 76_000);
        assert_eq!(e.reveal_deadline_ms(&cfg), 80_000);
        assert_eq!(e.reveal_deadline_ms(&cfg), e.next().start_ms(&cfg));
    }

    #[test]
    fn absurd_epoch_id_saturates_instead_of_overflowing() {
        let cfg = EpochConfig::default();
        let e = EpochId(u64::MAX);
        assert_eq!(e.start_ms(&cfg), u64::MAX);
        assert_eq!(e.commit_deadline_ms(&cfg), u64::MAX);
        assert_eq!(e.reveal_deadline_ms(&cfg), u64::MAX);
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn sim_clock_follows_tokio_time() {
        let clock = SimClock::new(50_000);
        assert_eq!(clock.now_ms(), 50_000);
        tokio::time::sleep(std::time::Duration::from_millis(1234)).await;
        assert_eq!(clock.now_ms(), 51_234);
    }
}
