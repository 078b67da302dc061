//! Redundant packet assembly and warm-up discard.
//!
//! Each e-bit is folded to a single parity bit and expanded through the LFSR
//! corrector into fixed-size packets, written with a redundancy factor for
//! downstream error tolerance. The first packets assembled carry
//! pre-calibration artifacts and are discarded unconditionally.

use std::collections::VecDeque;

use crate::config::PipelineConfig;
use crate::lfsr::LfsrCorrector;

/// Fold an e-bit byte into one parity bit.
#[inline]
pub fn parity_fold(e_bit: u8) -> u8 {
    let mut x = e_bit;
    x ^= x >> 4;
    x ^= x >> 2;
    x & 1
}

/// Batches corrected bits into redundant packets and queues post-warm-up
/// bytes for consumption.
pub struct PacketAssembler {
    packet_len: usize,
    redundancy: usize,
    discard_left: usize,
    queue: VecDeque<u8>,
    assembled: u64,
}

impl PacketAssembler {
    pub fn new(cfg: &PipelineConfig) -> Self {
        Self {
            packet_len: cfg.packet_len,
            redundancy: cfg.redundancy,
            discard_left: cfg.warmup_packets,
            queue: VecDeque::new(),
            assembled: 0,
        }
    }

    /// Expand one e-bit into `redundancy` packets of `packet_len` bytes, each
    /// byte built from 7 corrected bits. Warm-up packets are dropped.
    pub fn push_e_bit(&mut self, e_bit: u8, lfsr: &mut LfsrCorrector) {
        let parity = parity_fold(e_bit);
        for _ in 0..self.redundancy {
            let mut packet = Vec::with_capacity(self.packet_len);
            for _ in 0..self.packet_len {
                let mut val = 0u8;
                for _ in 0..7 {
                    val <<= 1;
                    val |= lfsr.next_bit(parity);
                }
                packet.push(val);
            }
            self.assembled += 1;
            if self.discard_left > 0 {
                self.discard_left -= 1;
            } else {
                self.queue.extend(packet);
            }
        }
    }

    /// Pop one byte. Each byte is produced once and consumed once; there is
    /// no rewind.
    pub fn pop_byte(&mut self) -> Option<u8> {
        self.queue.pop_front()
    }

    /// Total packets assembled, including discarded warm-up packets.
    pub fn assembled(&self) -> u64 {
        self.assembled
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> (PacketAssembler, LfsrCorrector) {
        let cfg = PipelineConfig::default();
        (PacketAssembler::new(&cfg), LfsrCorrector::new(cfg.lfsr_seed))
    }

    #[test]
    fn parity_fold_is_single_bit() {
        for v in 0..=255u8 {
            assert!(parity_fold(v) <= 1);
        }
    }

    #[test]
    fn parity_fold_known_values() {
        assert_eq!(parity_fold(0x00), 0);
        assert_eq!(parity_fold(0x11), 0); // folds to zero
        assert_eq!(parity_fold(0x01), 1);
    }

    #[test]
    fn warm_up_packets_never_surface() {
        let (mut asm, mut lfsr) = assembler();
        // 2 e-bits * redundancy 4 = 8 packets, all inside the 10-packet warm-up.
        asm.push_e_bit(0xAB, &mut lfsr);
        asm.push_e_bit(0x42, &mut lfsr);
        assert_eq!(asm.assembled(), 8);
        assert_eq!(asm.pop_byte(), None);
    }

    #[test]
    fn first_surfaced_byte_is_from_packet_eleven() {
        let (mut asm, mut lfsr) = assembler();
        // 3 e-bits = 12 packets; packets 11 and 12 survive (2 * 17 bytes).
        for _ in 0..3 {
            asm.push_e_bit(0x5A, &mut lfsr);
        }
        assert_eq!(asm.assembled(), 12);
        assert_eq!(asm.queued(), 2 * 17);
    }

    #[test]
    fn bytes_consumed_exactly_once() {
        let (mut asm, mut lfsr) = assembler();
        for _ in 0..4 {
            asm.push_e_bit(0x33, &mut lfsr);
        }
        let n = asm.queued();
        let drained: Vec<u8> = std::iter::from_fn(|| asm.pop_byte()).collect();
        assert_eq!(drained.len(), n);
        assert_eq!(asm.pop_byte(), None);
    }

    #[test]
    fn packet_bytes_are_seven_bit_values() {
        let (mut asm, mut lfsr) = assembler();
        for i in 0..20 {
            asm.push_e_bit((i * 37) as u8, &mut lfsr);
        }
        while let Some(b) = asm.pop_byte() {
            assert!(b < 128, "packet byte {b} exceeds 7 bits");
        }
    }
}
