//! 63-bit maximal-length LFSR bit corrector.
//!
//! A decorrelator, not a whitener: each input bit is folded into the
//! feedback path so the register walk depends on the entropy stream, and the
//! corrected output keeps the source's bias signature. Taps 48/37/30/13/0
//! form a maximal-length feedback polynomial; the canonical alternating seed
//! keeps the register out of the all-zero lockup state.

/// 63-bit register mask.
const MASK63: u64 = (1 << 63) - 1;

/// Linear-feedback shift register corrector.
#[derive(Debug, Clone)]
pub struct LfsrCorrector {
    state: u64,
}

impl LfsrCorrector {
    /// Construct from a seed. The seed is truncated to 63 bits and must not
    /// be zero after truncation.
    pub fn new(seed: u64) -> Self {
        let state = seed & MASK63;
        debug_assert_ne!(state, 0, "zero LFSR seed locks the register");
        Self { state }
    }

    /// Advance one step: emit the tap parity, shift right, and insert
    /// `output ^ input` at bit 62. Returns the corrected bit
    /// `output ^ input`.
    pub fn next_bit(&mut self, input: u8) -> u8 {
        let s = self.state;
        let out = ((s >> 48) ^ (s >> 37) ^ (s >> 30) ^ (s >> 13) ^ s) & 1;
        let feedback = out ^ u64::from(input & 1);
        self.state = (s >> 1) | (feedback << 62);
        (out as u8) ^ (input & 1)
    }

    /// Current register state (63 bits). Exposed for auditability.
    pub fn state(&self) -> u64 {
        self.state
    }
}
