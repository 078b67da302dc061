//! Commit-reveal epoch protocol over the chronopulse byte stream.
//!
//! Time is cut into fixed 10-second epochs. Each participant hashes a fresh
//! entropy trace together with a per-epoch beacon nonce and commits to it
//! before the commit deadline, then reveals the trace once the reveal window
//! opens. The mixer substitutes a deterministic stand-in for every withheld
//! reveal and publishes a pulse only when at least 40% of contributions were
//! genuinely revealed, so a withholding minority can neither steer nor
//! starve the output.
//!
//! The crate splits along the protocol's own seams:
//!
//! - [`epoch`] — epoch ids, window deadlines, wall clocks;
//! - [`hashing`] — commitments, substitutions, reveal signatures;
//! - [`wire`] — the serde types that cross process boundaries;
//! - [`traits`] — [`Beacon`], [`MixerClient`], [`BlobStore`] seams;
//! - [`ledger`] — mixer-side acceptance policy and the pulse interleave;
//! - [`coordinator`] — the participant-side epoch driver;
//! - [`loopback`] — an in-process mixer for tests and single-operator runs.

pub mod coordinator;
pub mod epoch;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod loopback;
pub mod traits;
pub mod wire;

pub use coordinator::{Coordinator, EpochOutcome, MissReason, Participant, Phase};
pub use epoch::{EpochConfig, EpochId, SimClock, SystemClock, WallClock};
pub use error::{LedgerError, ProtocolError};
pub use ledger::{EpochLedger, MixerHub, interleave_bits};
pub use loopback::LoopbackMixer;
pub use traits::{Beacon, BlobStore, HashBeacon, MemoryBlobStore, MixerClient};
pub use wire::{CommitRequest, Pulse, RevealRequest};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
