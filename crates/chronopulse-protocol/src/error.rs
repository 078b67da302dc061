//! Error types for the commit-reveal protocol.

use thiserror::Error;

/// Mixer-side acceptance errors. Every variant maps to a definite protocol
/// outcome — the mixer never crashes on late, duplicate, or malformed
/// messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A second commit for the same `(epoch, participant)` pair.
    #[error("duplicate commit for epoch {epoch} participant {participant}")]
    DuplicateCommit { epoch: u64, participant: String },

    /// A second reveal for the same `(epoch, participant)` pair.
    #[error("duplicate reveal for epoch {epoch} participant {participant}")]
    DuplicateReveal { epoch: u64, participant: String },

    /// A reveal with no matching commit.
    #[error("reveal without commit for epoch {epoch} participant {participant}")]
    MissingCommit { epoch: u64, participant: String },

    /// Commit arrived before the epoch started. Covers clock-skewed
    /// participants and absurd wire epoch ids alike.
    #[error("commit window not yet open for epoch {epoch}")]
    CommitWindowNotOpen { epoch: u64 },

    /// Commit arrived at or after the commit deadline.
    #[error("commit window closed for epoch {epoch}")]
    CommitWindowClosed { epoch: u64 },

    /// Reveal arrived before the reveal window opened.
    #[error("reveal window not yet open for epoch {epoch}")]
    RevealWindowNotOpen { epoch: u64 },

    /// Reveal arrived at or after the reveal deadline. Treated identically
    /// to a missing reveal — the contribution will be substituted.
    #[error("reveal window closed for epoch {epoch}")]
    RevealWindowClosed { epoch: u64 },

    /// The epoch has already been closed; nothing further is accepted.
    #[error("epoch {epoch} already closed")]
    EpochClosed { epoch: u64 },

    /// Close requested before the reveal deadline has passed.
    #[error("epoch {epoch} not yet closeable")]
    NotYetCloseable { epoch: u64 },

    /// Honest-entropy fraction below threshold; no pulse published and all
    /// commits for the epoch are void. Retry at the next epoch.
    #[error("epoch {epoch} rejected: honest fraction {honest_fraction:.2}")]
    Rejected { epoch: u64, honest_fraction: f64 },

    /// A hash field was not valid 64-character hex.
    #[error("malformed hash field: {0}")]
    MalformedHash(String),

    /// No ledger exists for the requested epoch.
    #[error("unknown epoch {epoch}")]
    UnknownEpoch { epoch: u64 },
}

/// Client-side protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The beacon could not supply a nonce for the epoch.
    #[error("beacon unavailable: {0}")]
    Beacon(String),

    /// The mixer could not be reached or refused the submission.
    #[error("mixer error: {0}")]
    Mixer(String),

    /// Mixer-side acceptance failure surfaced through a loopback channel.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
