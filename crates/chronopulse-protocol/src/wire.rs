//! Wire types shared by the coordinator, the loopback hub, and the HTTP
//! mixer service. Hashes travel as lowercase hex.

use serde::{Deserialize, Serialize};

use crate::epoch::EpochId;

/// First-phase submission: the commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub epoch_id: EpochId,
    pub participant_id: String,
    /// Beacon nonce for this epoch, opaque hex.
    pub nonce: String,
    /// `SHA256(epoch_id || nonce || trace_hash)`, hex.
    pub commit_hash: String,
}

/// Second-phase submission: the reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRequest {
    pub epoch_id: EpochId,
    pub participant_id: String,
    /// Content identifier of the raw trace in the blob store.
    pub trace_reference: String,
    /// Keyed signature binding the reference to the participant.
    pub signature: String,
}

/// Published output of one accepted epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pulse {
    pub epoch_id: EpochId,
    /// Bit-interleaved aggregate of all contributions. Per-source bias is
    /// preserved — contributions alternate bit-for-bit, they are not XORed
    /// together.
    pub payload: Vec<u8>,
    /// Fraction of contributions genuinely revealed (not substituted).
    pub honest_fraction: f64,
    pub revealed: usize,
    pub substituted: usize,
}
