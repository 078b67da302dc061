//! In-process mixer: a `MixerClient` that routes straight into a shared
//! `MixerHub`. Single-operator deployments and tests run the full protocol
//! through this without any sockets.

use std::sync::{Arc, Mutex};

use crate::epoch::{EpochId, WallClock};
use crate::error::ProtocolError;
use crate::ledger::MixerHub;
use crate::traits::{BlobStore, MemoryBlobStore, MixerClient};
use crate::wire::{CommitRequest, Pulse, RevealRequest};

#[derive(Clone)]
pub struct LoopbackMixer {
    hub: Arc<Mutex<MixerHub>>,
    blobs: MemoryBlobStore,
    clock: Arc<dyn WallClock>,
}

impl LoopbackMixer {
    pub fn new(hub: MixerHub, clock: Arc<dyn WallClock>) -> Self {
        Self {
            hub: Arc::new(Mutex::new(hub)),
            blobs: MemoryBlobStore::new(),
            clock,
        }
    }

    /// The store participants publish traces into before revealing.
    pub fn blob_store(&self) -> MemoryBlobStore {
        self.blobs.clone()
    }

    /// Close (if needed) and fetch the pulse for an epoch.
    pub fn pulse(&self, epoch: EpochId) -> Result<Pulse, ProtocolError> {
        let now_ms = self.clock.now_ms();
        let mut hub = self.hub.lock().expect("mixer hub lock poisoned");
        hub.pulse(epoch, now_ms, &self.blobs).map_err(Into::into)
    }
}

impl MixerClient for LoopbackMixer {
    async fn submit_commit(&self, req: &CommitRequest) -> Result<(), ProtocolError> {
        let now_ms = self.clock.now_ms();
        let mut hub = self.hub.lock().expect("mixer hub lock poisoned");
        hub.commit(req, now_ms).map_err(Into::into)
    }

    async fn submit_reveal(&self, req: &RevealRequest) -> Result<(), ProtocolError> {
        let now_ms = self.clock.now_ms();
        let mut hub = self.hub.lock().expect("mixer hub lock poisoned");
        hub.reveal(req, now_ms).map_err(Into::into)
    }
}
