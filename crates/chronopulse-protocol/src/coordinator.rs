//! Participant-side epoch driver.
//!
//! One coordinator owns one participant identity and one byte stream, and
//! walks each epoch through `Idle → AwaitingNonce → Committed →
//! AwaitingRevealWindow → Revealed | Missed`. Any failure after the commit
//! lands leaves the commitment standing — the mixer substitutes for it — so
//! a miss affects this participant only and nothing is retried mid-epoch.

use std::sync::Arc;
use std::time::Duration;

use chronopulse_core::stream::ByteStreamHandle;
use log::{debug, info, warn};

use crate::epoch::{EpochConfig, EpochId, WallClock};
use crate::hashing;
use crate::traits::{Beacon, BlobStore, MixerClient};
use crate::wire::{CommitRequest, RevealRequest};

/// A participant identity: a fresh v4 uuid plus a local signing key.
#[derive(Clone)]
pub struct Participant {
    pub id: String,
    key: [u8; 32],
}

impl Participant {
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        getrandom::fill(&mut key).expect("OS CSPRNG failed");
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
        }
    }

    pub fn sign(&self, epoch: EpochId, reference: &str) -> String {
        hashing::sign_reveal(&self.key, epoch, reference)
    }
}

/// Where in the epoch the coordinator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingNonce,
    Committed,
    AwaitingRevealWindow,
    Revealed,
    Missed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::AwaitingNonce => "awaiting-nonce",
            Phase::Committed => "committed",
            Phase::AwaitingRevealWindow => "awaiting-reveal-window",
            Phase::Revealed => "revealed",
            Phase::Missed => "missed",
        };
        f.write_str(s)
    }
}

/// Why an epoch was missed.
#[derive(Debug)]
pub enum MissReason {
    /// The beacon produced no nonce for the epoch.
    Beacon(String),
    /// The generator could not supply `trace_len` bytes before the commit
    /// deadline.
    TraceTimeout,
    /// The generator stream closed; no further epochs are possible.
    StreamClosed,
    /// The mixer refused the commit.
    CommitRefused(String),
    /// The mixer refused the reveal; the standing commit will be
    /// substituted.
    RevealRefused(String),
}

/// Result of driving one epoch.
#[derive(Debug)]
pub enum EpochOutcome {
    Revealed {
        epoch: EpochId,
        trace_reference: String,
    },
    Missed {
        epoch: EpochId,
        reason: MissReason,
    },
}

impl EpochOutcome {
    pub fn epoch(&self) -> EpochId {
        match self {
            EpochOutcome::Revealed { epoch, .. } | EpochOutcome::Missed { epoch, .. } => *epoch,
        }
    }

    pub fn is_revealed(&self) -> bool {
        matches!(self, EpochOutcome::Revealed { .. })
    }
}

pub struct Coordinator<B, M, S> {
    participant: Participant,
    beacon: B,
    mixer: M,
    blobs: S,
    cfg: EpochConfig,
    clock: Arc<dyn WallClock>,
    stream: ByteStreamHandle,
    phase: Phase,
}

impl<B: Beacon, M: MixerClient, S: BlobStore> Coordinator<B, M, S> {
    pub fn new(
        participant: Participant,
        beacon: B,
        mixer: M,
        blobs: S,
        cfg: EpochConfig,
        clock: Arc<dyn WallClock>,
        stream: ByteStreamHandle,
    ) -> Self {
        Self {
            participant,
            beacon,
            mixer,
            blobs,
            cfg,
            clock,
            stream,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn participant_id(&self) -> &str {
        &self.participant.id
    }

    fn enter(&mut self, phase: Phase) {
        debug!("participant {}: {} -> {phase}", self.participant.id, self.phase);
        self.phase = phase;
    }

    async fn sleep_until(&self, target_ms: u64) {
        let now = self.clock.now_ms();
        if target_ms > now {
            tokio::time::sleep(Duration::from_millis(target_ms - now)).await;
        }
    }

    fn miss(&mut self, epoch: EpochId, reason: MissReason) -> EpochOutcome {
        warn!(
            "participant {} missed epoch {epoch}: {reason:?}",
            self.participant.id
        );
        self.enter(Phase::Missed);
        EpochOutcome::Missed { epoch, reason }
    }

    /// Drive one epoch from commit to reveal. Assumes the epoch is current
    /// when called; the trace read is bounded by the commit deadline.
    pub async fn run_epoch(&mut self, epoch: EpochId) -> EpochOutcome {
        self.enter(Phase::AwaitingNonce);
        let nonce = match self.beacon.nonce(epoch).await {
            Ok(nonce) => nonce,
            Err(err) => return self.miss(epoch, MissReason::Beacon(err.to_string())),
        };

        let deadline = epoch.commit_deadline_ms(&self.cfg);
        let budget = deadline.saturating_sub(self.clock.now_ms());
        let trace = match tokio::time::timeout(
            Duration::from_millis(budget),
            self.stream.read_exact(self.cfg.trace_len),
        )
        .await
        {
            Ok(Ok(trace)) => trace,
            Ok(Err(_)) => return self.miss(epoch, MissReason::StreamClosed),
            Err(_) => {
                warn!(
                    "participant {}: generator produced fewer than {} bytes in {budget} ms",
                    self.participant.id, self.cfg.trace_len
                );
                return self.miss(epoch, MissReason::TraceTimeout);
            }
        };

        let trace_hash = hashing::trace_hash(&trace);
        let commit = CommitRequest {
            epoch_id: epoch,
            participant_id: self.participant.id.clone(),
            nonce: nonce.clone(),
            commit_hash: hashing::encode_hex(&hashing::commit_hash(epoch, &nonce, &trace_hash)),
        };
        if let Err(err) = self.mixer.submit_commit(&commit).await {
            return self.miss(epoch, MissReason::CommitRefused(err.to_string()));
        }
        self.enter(Phase::Committed);

        self.enter(Phase::AwaitingRevealWindow);
        self.sleep_until(epoch.reveal_open_ms(&self.cfg)).await;

        let reference = self.blobs.put(&trace);
        let reveal = RevealRequest {
            epoch_id: epoch,
            participant_id: self.participant.id.clone(),
            signature: self.participant.sign(epoch, &reference),
            trace_reference: reference.clone(),
        };
        if let Err(err) = self.mixer.submit_reveal(&reveal).await {
            return self.miss(epoch, MissReason::RevealRefused(err.to_string()));
        }

        info!(
            "participant {} revealed epoch {epoch} ({reference})",
            self.participant.id
        );
        self.enter(Phase::Revealed);
        EpochOutcome::Revealed {
            epoch,
            trace_reference: reference,
        }
    }

    /// Run `count` consecutive epochs, starting at the next epoch boundary
    /// so every epoch gets its full commit window. Stops early if the
    /// generator stream closes.
    pub async fn run_epochs(&mut self, count: usize) -> Vec<EpochOutcome> {
        let mut outcomes = Vec::with_capacity(count);
        let mut epoch = EpochId::from_unix_ms(self.clock.now_ms(), &self.cfg).next();
        for _ in 0..count {
            self.enter(Phase::Idle);
            self.sleep_until(epoch.start_ms(&self.cfg)).await;
            let outcome = self.run_epoch(epoch).await;
            let stream_dead = matches!(
                outcome,
                EpochOutcome::Missed {
                    reason: MissReason::StreamClosed,
                    ..
                }
            );
            outcomes.push(outcome);
            if stream_dead {
                break;
            }
            epoch = epoch.next();
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::SimClock;
    use crate::ledger::MixerHub;
    use crate::loopback::LoopbackMixer;
    use crate::traits::HashBeacon;
    use tokio::sync::mpsc;

    /// A producer that emits one byte every `interval`; `fast` streams keep
    /// the coordinator fed, slow ones starve it past the commit deadline.
    fn paced_stream(interval: Duration, count: usize) -> ByteStreamHandle {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for i in 0..count {
                tokio::time::sleep(interval).await;
                if tx.send((i % 127) as u8).await.is_err() {
                    return;
                }
            }
        });
        ByteStreamHandle::from_receiver(rx)
    }

    fn small_cfg() -> EpochConfig {
        EpochConfig {
            trace_len: 64,
            ..EpochConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fed_coordinator_commits_and_reveals() {
        let cfg = small_cfg();
        let clock: Arc<dyn WallClock> = Arc::new(SimClock::new(0));
        let mixer = LoopbackMixer::new(MixerHub::new(cfg.clone()), Arc::clone(&clock));
        let blobs = mixer.blob_store();
        // 64 bytes at 1 ms each: well inside the 5 s commit window.
        let stream = paced_stream(Duration::from_millis(1), 10_000);
        let mut coordinator = Coordinator::new(
            Participant::generate(),
            HashBeacon,
            mixer.clone(),
            blobs,
            cfg.clone(),
            Arc::clone(&clock),
            stream,
        );

        let outcomes = coordinator.run_epochs(1).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_revealed(), "got {:?}", outcomes[0]);
        assert_eq!(coordinator.phase(), Phase::Revealed);

        // The epoch closes at its reveal deadline with one honest reveal.
        let epoch = outcomes[0].epoch();
        tokio::time::sleep(Duration::from_millis(cfg.epoch_ms)).await;
        let pulse = mixer.pulse(epoch).unwrap();
        assert_eq!(pulse.revealed, 1);
        assert_eq!(pulse.honest_fraction, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn starved_coordinator_misses_the_epoch() {
        let cfg = small_cfg();
        let clock: Arc<dyn WallClock> = Arc::new(SimClock::new(0));
        let mixer = LoopbackMixer::new(MixerHub::new(cfg.clone()), Arc::clone(&clock));
        let blobs = mixer.blob_store();
        // 400 ms per byte: even counting bytes buffered before the epoch
        // starts, 64 bytes cannot arrive inside the 5 s commit window.
        let stream = paced_stream(Duration::from_millis(400), 10_000);
        let mut coordinator = Coordinator::new(
            Participant::generate(),
            HashBeacon,
            mixer,
            blobs,
            cfg,
            Arc::clone(&clock),
            stream,
        );

        let outcomes = coordinator.run_epochs(1).await;
        assert!(matches!(
            outcomes[0],
            EpochOutcome::Missed {
                reason: MissReason::TraceTimeout,
                ..
            }
        ));
        assert_eq!(coordinator.phase(), Phase::Missed);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_stream_stops_the_epoch_loop() {
        let cfg = small_cfg();
        let clock: Arc<dyn WallClock> = Arc::new(SimClock::new(0));
        let mixer = LoopbackMixer::new(MixerHub::new(cfg.clone()), Arc::clone(&clock));
        let blobs = mixer.blob_store();
        // Producer dies after 10 bytes; the loop must stop after one miss.
        let stream = paced_stream(Duration::from_millis(1), 10);
        let mut coordinator = Coordinator::new(
            Participant::generate(),
            HashBeacon,
            mixer,
            blobs,
            cfg,
            Arc::clone(&clock),
            stream,
        );

        let outcomes = coordinator.run_epochs(5).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            EpochOutcome::Missed {
                reason: MissReason::StreamClosed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn quorum_of_coordinators_produces_a_pulse() {
        let cfg = small_cfg();
        let clock: Arc<dyn WallClock> = Arc::new(SimClock::new(0));
        let mixer = LoopbackMixer::new(MixerHub::new(cfg.clone()), Arc::clone(&clock));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let mut coordinator = Coordinator::new(
                Participant::generate(),
                HashBeacon,
                mixer.clone(),
                mixer.blob_store(),
                cfg.clone(),
                Arc::clone(&clock),
                paced_stream(Duration::from_millis(1), 10_000),
            );
            tasks.push(tokio::spawn(async move {
                coordinator.run_epochs(1).await
            }));
        }
        let mut epoch = None;
        for task in tasks {
            let outcomes = task.await.unwrap();
            assert!(outcomes[0].is_revealed());
            epoch = Some(outcomes[0].epoch());
        }

        tokio::time::sleep(Duration::from_millis(cfg.epoch_ms)).await;
        let pulse = mixer.pulse(epoch.unwrap()).unwrap();
        assert_eq!(pulse.revealed, 3);
        assert_eq!(pulse.substituted, 0);
        // Three 64-byte traces interleave into one 192-byte payload.
        assert_eq!(pulse.payload.len(), 192);
    }
}
