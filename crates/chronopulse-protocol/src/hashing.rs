//! Commitment hashing, substitution, and reveal signatures.
//!
//! All functions here are pure: identical inputs produce bit-identical
//! outputs across processes and platforms, which is what makes commitments
//! auditable after the fact.

use sha2::{Digest, Sha256};

use crate::epoch::EpochId;

/// SHA-256 of the raw trace bytes.
pub fn trace_hash(trace: &[u8]) -> [u8; 32] {
    Sha256::digest(trace).into()
}

/// Commitment: `SHA256(epoch_id_le || nonce || trace_hash)`.
///
/// Computed and sent before any other participant's reveal contents can be
/// known; the binding is to this epoch, this beacon nonce, and this trace.
pub fn commit_hash(epoch: EpochId, nonce: &str, trace_hash: &[u8; 32]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(epoch.0.to_le_bytes());
    h.update(nonce.as_bytes());
    h.update(trace_hash);
    h.finalize().into()
}

/// Stand-in contribution for a committed-but-unrevealed participant:
/// `SHA256(commit_hash)`. Deterministic but unpredictable to the withholder
/// at commit time, so silence cannot steer the aggregate.
pub fn substitute_contribution(commit_hash: &[u8; 32]) -> [u8; 32] {
    Sha256::digest(commit_hash).into()
}

/// Content identifier for a published trace: hex of its hash.
pub fn trace_reference(trace_hash: &[u8; 32]) -> String {
    encode_hex(trace_hash)
}

/// Keyed reveal signature binding a trace reference to a participant:
/// `SHA256(key || epoch_id_le || reference)`.
pub fn sign_reveal(key: &[u8; 32], epoch: EpochId, reference: &str) -> String {
    let mut h = Sha256::new();
    h.update(key);
    h.update(epoch.0.to_le_bytes());
    h.update(reference.as_bytes());
    encode_hex(&h.finalize())
}

/// Verify a reveal signature against a participant's key.
pub fn verify_reveal(key: &[u8; 32], epoch: EpochId, reference: &str, signature: &str) -> bool {
    sign_reveal(key, epoch, reference) == signature
}

/// Lowercase hex encoding.
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a 64-character hex string into a 32-byte hash.
pub fn decode_hash(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out[i] = ((hi << 4) | lo) as u8;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_hash_is_deterministic() {
        let th = trace_hash(b"some trace bytes");
        let a = commit_hash(EpochId(42), "deadbeef", &th);
        let b = commit_hash(EpochId(42), "deadbeef", &th);
        assert_eq!(a, b);
    }

    #[test]
    fn commit_hash_binds_every_field() {
        let th = trace_hash(b"trace");
        let base = commit_hash(EpochId(1), "aa", &th);
        assert_ne!(base, commit_hash(EpochId(2), "aa", &th));
        assert_ne!(base, commit_hash(EpochId(1), "ab", &th));
        assert_ne!(base, commit_hash(EpochId(1), "aa", &trace_hash(b"other")));
    }

    #[test]
    fn substitute_differs_from_commit() {
        let th = trace_hash(b"trace");
        let ch = commit_hash(EpochId(9), "ff", &th);
        assert_ne!(substitute_contribution(&ch), ch);
    }

    #[test]
    fn hex_round_trip() {
        let th = trace_hash(b"x");
        let hex = encode_hex(&th);
        assert_eq!(hex.len(), 64);
        assert_eq!(decode_hash(&hex), Some(th));
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(decode_hash("zz"), None);
        assert_eq!(decode_hash(&"g".repeat(64)), None);
        assert_eq!(decode_hash(&"ab".repeat(31)), None);
    }

    #[test]
    fn signature_verifies_only_with_matching_key() {
        let key = [7u8; 32];
        let sig = sign_reveal(&key, EpochId(3), "ref");
        assert!(verify_reveal(&key, EpochId(3), "ref", &sig));
        assert!(!verify_reveal(&[8u8; 32], EpochId(3), "ref", &sig));
        assert!(!verify_reveal(&key, EpochId(4), "ref", &sig));
    }
}
