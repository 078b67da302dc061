//! Narrow seams to the external collaborators: beacon, mixer, blob store.
//!
//! The networked drand-style beacon, the VDF proof system, and IPFS pinning
//! all live behind these traits and stay out of scope; in-memory
//! implementations back tests and single-process deployments.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::epoch::EpochId;
use crate::error::ProtocolError;
use crate::hashing;
use crate::wire::{CommitRequest, RevealRequest};

/// Per-epoch nonce provider, refreshed once per epoch by an external
/// consensus process. The nonce is an opaque hex string.
pub trait Beacon {
    fn nonce(&self, epoch: EpochId)
    -> impl Future<Output = Result<String, ProtocolError>> + Send;
}

/// Submission interface to the mixer. Both calls are idempotent per
/// `(epoch_id, participant_id)`: a second commit or reveal for the same
/// pair is rejected.
pub trait MixerClient {
    fn submit_commit(
        &self,
        req: &CommitRequest,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    fn submit_reveal(
        &self,
        req: &RevealRequest,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Content-addressed blob storage for published traces.
pub trait BlobStore {
    /// Store bytes, returning their content identifier.
    fn put(&self, bytes: &[u8]) -> String;
    /// Resolve a content identifier.
    fn get(&self, reference: &str) -> Option<Vec<u8>>;
    /// Drop a blob once consumed. Unknown references are a no-op.
    fn remove(&self, reference: &str);
}

/// In-memory content-addressed store.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> String {
        let reference = hashing::trace_reference(&hashing::trace_hash(bytes));
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .insert(reference.clone(), bytes.to_vec());
        reference
    }

    fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .get(reference)
            .cloned()
    }

    fn remove(&self, reference: &str) {
        self.blobs
            .lock()
            .expect("blob store lock poisoned")
            .remove(reference);
    }
}

/// Deterministic local beacon: `SHA256("chronopulse-beacon" || epoch)`.
///
/// A stand-in for the external per-epoch consensus nonce; useful for tests
/// and single-operator deployments.
#[derive(Clone, Default)]
pub struct HashBeacon;

impl Beacon for HashBeacon {
    async fn nonce(&self, epoch: EpochId) -> Result<String, ProtocolError> {
        use sha2::{Digest, Sha256};
        let mut h = Sha256::new();
        h.update(b"chronopulse-beacon");
        h.update(epoch.0.to_le_bytes());
        Ok(hashing::encode_hex(&h.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_store_round_trips() {
        let store = MemoryBlobStore::new();
        let reference = store.put(b"trace bytes");
        assert_eq!(store.get(&reference), Some(b"trace bytes".to_vec()));
        assert_eq!(store.get("unknown"), None);
    }

    #[test]
    fn removed_blob_no_longer_resolves() {
        let store = MemoryBlobStore::new();
        let reference = store.put(b"ephemeral");
        store.remove(&reference);
        assert_eq!(store.get(&reference), None);
        // Removing again is harmless.
        store.remove(&reference);
    }

    #[test]
    fn blob_reference_is_content_addressed() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same");
        let b = store.put(b"same");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn hash_beacon_is_per_epoch() {
        let beacon = HashBeacon;
        let a = beacon.nonce(EpochId(1)).await.unwrap();
        let b = beacon.nonce(EpochId(2)).await.unwrap();
        let a2 = beacon.nonce(EpochId(1)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }
}
