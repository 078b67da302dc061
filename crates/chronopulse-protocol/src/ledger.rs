//! Per-epoch bookkeeping and the acceptance rule.
//!
//! The ledger records commits and reveals in arrival order, substitutes for
//! withheld reveals at close, and publishes a pulse only when enough
//! contributions were genuinely revealed. Deadline checks take `now_ms` as a
//! parameter so the caller decides which clock is authoritative.

use std::collections::HashMap;

use log::{info, warn};

use crate::epoch::{EpochConfig, EpochId};
use crate::error::LedgerError;
use crate::hashing;
use crate::traits::BlobStore;
use crate::wire::{CommitRequest, Pulse, RevealRequest};

/// One participant's commit, plus its reveal once (if) it arrives.
#[derive(Debug, Clone)]
struct CommitRecord {
    participant: String,
    nonce: String,
    commit_hash: [u8; 32],
    reveal: Option<RevealRecord>,
}

#[derive(Debug, Clone)]
struct RevealRecord {
    reference: String,
    /// As submitted. No key registry exists mixer-side, so the signature is
    /// recorded without verification; the commitment check at close decides
    /// substitution.
    signature: String,
}

/// All state for a single epoch. Commit order is preserved; the interleave
/// at close walks contributions in that order.
pub struct EpochLedger {
    epoch: EpochId,
    commits: Vec<CommitRecord>,
    index: HashMap<String, usize>,
    outcome: Option<Result<Pulse, LedgerError>>,
}

impl EpochLedger {
    pub fn new(epoch: EpochId) -> Self {
        Self {
            epoch,
            commits: Vec::new(),
            index: HashMap::new(),
            outcome: None,
        }
    }

    pub fn epoch(&self) -> EpochId {
        self.epoch
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    /// Record a commit. Rejected after the commit deadline, after close, or
    /// when the participant already committed this epoch.
    pub fn record_commit(
        &mut self,
        req: &CommitRequest,
        cfg: &EpochConfig,
        now_ms: u64,
    ) -> Result<(), LedgerError> {
        let epoch = self.epoch.0;
        if self.outcome.is_some() {
            return Err(LedgerError::EpochClosed { epoch });
        }
        if now_ms < self.epoch.start_ms(cfg) {
            return Err(LedgerError::CommitWindowNotOpen { epoch });
        }
        if now_ms >= self.epoch.commit_deadline_ms(cfg) {
            return Err(LedgerError::CommitWindowClosed { epoch });
        }
        if self.index.contains_key(&req.participant_id) {
            return Err(LedgerError::DuplicateCommit {
                epoch,
                participant: req.participant_id.clone(),
            });
        }
        let commit_hash = hashing::decode_hash(&req.commit_hash)
            .ok_or_else(|| LedgerError::MalformedHash(req.commit_hash.clone()))?;
        self.index
            .insert(req.participant_id.clone(), self.commits.len());
        self.commits.push(CommitRecord {
            participant: req.participant_id.clone(),
            nonce: req.nonce.clone(),
            commit_hash,
            reveal: None,
        });
        Ok(())
    }

    /// Record a reveal. The trace itself is not fetched here; resolution and
    /// hash verification happen at close so a reveal pointing at a missing
    /// or mismatched blob degrades to a substitution, not an error.
    pub fn record_reveal(
        &mut self,
        req: &RevealRequest,
        cfg: &EpochConfig,
        now_ms: u64,
    ) -> Result<(), LedgerError> {
        let epoch = self.epoch.0;
        if self.outcome.is_some() {
            return Err(LedgerError::EpochClosed { epoch });
        }
        if now_ms < self.epoch.reveal_open_ms(cfg) {
            return Err(LedgerError::RevealWindowNotOpen { epoch });
        }
        if now_ms >= self.epoch.reveal_deadline_ms(cfg) {
            return Err(LedgerError::RevealWindowClosed { epoch });
        }
        let slot = *self.index.get(&req.participant_id).ok_or_else(|| {
            LedgerError::MissingCommit {
                epoch,
                participant: req.participant_id.clone(),
            }
        })?;
        let record = &mut self.commits[slot];
        if record.reveal.is_some() {
            return Err(LedgerError::DuplicateReveal {
                epoch,
                participant: req.participant_id.clone(),
            });
        }
        record.reveal = Some(RevealRecord {
            reference: req.trace_reference.clone(),
            signature: req.signature.clone(),
        });
        Ok(())
    }

    /// Close the epoch: substitute for withheld reveals, apply the
    /// honest-fraction rule, and cache the outcome. Idempotent — later calls
    /// return the cached result.
    pub fn close(
        &mut self,
        cfg: &EpochConfig,
        now_ms: u64,
        blobs: &dyn BlobStore,
    ) -> Result<Pulse, LedgerError> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let epoch = self.epoch.0;
        if now_ms < self.epoch.reveal_deadline_ms(cfg) {
            return Err(LedgerError::NotYetCloseable { epoch });
        }

        let mut contributions: Vec<Vec<u8>> = Vec::with_capacity(self.commits.len());
        let mut consumed: Vec<String> = Vec::new();
        let mut revealed = 0usize;
        let mut substituted = 0usize;
        for record in &self.commits {
            match self.resolve(record, blobs) {
                Some(trace) => {
                    revealed += 1;
                    if let Some(reveal) = &record.reveal {
                        consumed.push(reveal.reference.clone());
                    }
                    contributions.push(trace);
                }
                None => {
                    substituted += 1;
                    contributions
                        .push(hashing::substitute_contribution(&record.commit_hash).to_vec());
                }
            }
        }
        // Traces are consumed into the pulse; the blobs need not outlive it.
        for reference in consumed {
            blobs.remove(&reference);
        }

        let total = revealed + substituted;
        let honest_fraction = if total == 0 {
            0.0
        } else {
            revealed as f64 / total as f64
        };
        let outcome = if total == 0 || honest_fraction < cfg.honest_threshold {
            warn!(
                "epoch {epoch} rejected: {revealed}/{total} revealed \
                 (honest fraction {honest_fraction:.2})"
            );
            Err(LedgerError::Rejected {
                epoch,
                honest_fraction,
            })
        } else {
            info!(
                "epoch {epoch} accepted: {revealed} revealed, {substituted} substituted, \
                 honest fraction {honest_fraction:.2}"
            );
            Ok(Pulse {
                epoch_id: self.epoch,
                payload: interleave_bits(&contributions),
                honest_fraction,
                revealed,
                substituted,
            })
        };
        self.outcome = Some(outcome.clone());
        // Only the cached verdict is needed from here on.
        self.commits = Vec::new();
        self.index = HashMap::new();
        outcome
    }

    /// A reveal counts as honest only if its blob resolves and hashes back
    /// to something consistent with the commitment.
    fn resolve(&self, record: &CommitRecord, blobs: &dyn BlobStore) -> Option<Vec<u8>> {
        let reveal = record.reveal.as_ref()?;
        let trace = blobs.get(&reveal.reference)?;
        let trace_hash = hashing::trace_hash(&trace);
        if hashing::trace_reference(&trace_hash) != reveal.reference {
            warn!(
                "epoch {} participant {}: blob does not match its reference, substituting",
                self.epoch, record.participant
            );
            return None;
        }
        let expected = hashing::commit_hash(self.epoch, &record.nonce, &trace_hash);
        if expected != record.commit_hash {
            warn!(
                "epoch {} participant {}: reveal does not match commitment, substituting",
                self.epoch, record.participant
            );
            return None;
        }
        Some(trace)
    }
}

/// Round-robin bit interleave of all contributions, most significant bit
/// first within each source byte. Exhausted sources drop out and the
/// rotation continues over the remainder, so every contributed bit lands in
/// the payload exactly once.
pub fn interleave_bits(contributions: &[Vec<u8>]) -> Vec<u8> {
    let total_bits: usize = contributions.iter().map(|c| c.len() * 8).sum();
    let mut out = Vec::with_capacity(total_bits / 8 + 1);
    let mut cursors = vec![0usize; contributions.len()];
    let mut acc = 0u8;
    let mut acc_bits = 0u8;
    let mut emitted = 0usize;
    while emitted < total_bits {
        for (source, cursor) in cursors.iter_mut().enumerate() {
            let bytes = &contributions[source];
            if *cursor >= bytes.len() * 8 {
                continue;
            }
            let bit = (bytes[*cursor / 8] >> (7 - (*cursor % 8))) & 1;
            *cursor += 1;
            emitted += 1;
            acc = (acc << 1) | bit;
            acc_bits += 1;
            if acc_bits == 8 {
                out.push(acc);
                acc = 0;
                acc_bits = 0;
            }
        }
    }
    if acc_bits > 0 {
        out.push(acc << (8 - acc_bits));
    }
    out
}

/// Collection of epoch ledgers plus the shared protocol config. The
/// in-process counterpart of the HTTP mixer; the loopback client and the
/// HTTP handlers both route through it.
pub struct MixerHub {
    cfg: EpochConfig,
    ledgers: HashMap<EpochId, EpochLedger>,
}

impl MixerHub {
    pub fn new(cfg: EpochConfig) -> Self {
        Self {
            cfg,
            ledgers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EpochConfig {
        &self.cfg
    }

    pub fn commit(&mut self, req: &CommitRequest, now_ms: u64) -> Result<(), LedgerError> {
        let cfg = self.cfg.clone();
        self.prune(now_ms);
        // Window checks run before any ledger exists for the epoch, so
        // garbage commits cannot grow the map.
        let epoch = req.epoch_id;
        if now_ms < epoch.start_ms(&cfg) {
            return Err(LedgerError::CommitWindowNotOpen { epoch: epoch.0 });
        }
        if now_ms >= epoch.commit_deadline_ms(&cfg) {
            return Err(LedgerError::CommitWindowClosed { epoch: epoch.0 });
        }
        self.ledgers
            .entry(epoch)
            .or_insert_with(|| EpochLedger::new(epoch))
            .record_commit(req, &cfg, now_ms)
    }

    /// Evict ledgers older than the retention horizon, closed or not.
    fn prune(&mut self, now_ms: u64) {
        let current = EpochId::from_unix_ms(now_ms, &self.cfg);
        let horizon = current.0.saturating_sub(self.cfg.retention_epochs);
        self.ledgers.retain(|epoch, _| epoch.0 >= horizon);
    }

    pub fn reveal(&mut self, req: &RevealRequest, now_ms: u64) -> Result<(), LedgerError> {
        let cfg = self.cfg.clone();
        match self.ledgers.get_mut(&req.epoch_id) {
            Some(ledger) => ledger.record_reveal(req, &cfg, now_ms),
            None => Err(LedgerError::MissingCommit {
                epoch: req.epoch_id.0,
                participant: req.participant_id.clone(),
            }),
        }
    }

    /// Fetch (closing on first request) the pulse for an epoch.
    pub fn pulse(
        &mut self,
        epoch: EpochId,
        now_ms: u64,
        blobs: &dyn BlobStore,
    ) -> Result<Pulse, LedgerError> {
        let cfg = self.cfg.clone();
        match self.ledgers.get_mut(&epoch) {
            Some(ledger) => ledger.close(&cfg, now_ms, blobs),
            None => Err(LedgerError::UnknownEpoch { epoch: epoch.0 }),
        }
    }
}
