//! LF emulator state machine: Idle/Sensing/Emulating, driving
//! the modulator GPIO with a Manchester-encoded EM410x or Viking frame,
//! repeated up to `BROADCAST_MAX` times before re-sensing the coil field.

use crate::lf::{em410x, viking};
use crate::tagtypes::TagSpecific;

pub const HALF_BIT_US: u32 = 256;
pub const BROADCAST_MAX: u32 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfState {
    Idle,
    Sensing,
    Emulating,
}

/// Manchester-encodes a 64-bit frame (the only frame length this subsystem
/// produces, EM410x and Viking are both 64 bits) into 128 half-bit symbols:
/// `1 -> (high, low)` / `0 -> (low, high)` (IEEE convention).
pub fn manchester_encode(bits: &[bool; 64]) -> heapless::Vec<bool, 128> {
    let mut out = heapless::Vec::new();
    for &b in bits {
        if b {
            let _ = out.push(true);
            let _ = out.push(false);
        } else {
            let _ = out.push(false);
            let _ = out.push(true);
        }
    }
    out
}

pub enum LfPayload {
    Em410x([u8; em410x::ID_LEN]),
    Viking([u8; 4]),
}

pub struct LfEmulator {
    pub state: LfState,
    pub payload: LfPayload,
    reps_sent: u32,
}

impl LfEmulator {
    pub fn new(specific: TagSpecific, id_bytes: &[u8]) -> Self {
        let payload = match specific {
            TagSpecific::Viking => {
                let mut id = [0u8; 4];
                let n = id_bytes.len().min(4);
                id[..n].copy_from_slice(&id_bytes[..n]);
                LfPayload::Viking(id)
            }
            _ => {
                let mut id = [0u8; em410x::ID_LEN];
                let n = id_bytes.len().min(em410x::ID_LEN);
                id[..n].copy_from_slice(&id_bytes[..n]);
                LfPayload::Em410x(id)
            }
        };
        Self {
            state: LfState::Idle,
            payload,
            reps_sent: 0,
        }
    }

    pub fn on_sense(&mut self) {
        if self.state == LfState::Idle {
            self.state = LfState::Sensing;
        }
    }

    pub fn start_emulating(&mut self) {
        self.state = LfState::Emulating;
        self.reps_sent = 0;
    }

    /// Produces the next Manchester bitstream to shift onto the modulator
    /// GPIO, or `None` once `BROADCAST_MAX` repetitions are done (the
    /// caller should return to `Sensing` at that point).
    pub fn next_broadcast(&mut self) -> Option<heapless::Vec<bool, 128>> {
        if self.state != LfState::Emulating || self.reps_sent >= BROADCAST_MAX {
            self.state = LfState::Sensing;
            return None;
        }
        self.reps_sent += 1;

        let mut out = heapless::Vec::new();
        match &self.payload {
            LfPayload::Em410x(id) => {
                let frame = em410x::encode_frame(id);
                let encoded = manchester_encode(&frame);
                let _ = out.extend_from_slice(&encoded);
            }
            LfPayload::Viking(id) => {
                let frame = viking::encode_frame(id);
                let encoded = manchester_encode(&frame);
                let _ = out.extend_from_slice(&encoded);
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manchester_doubles_bit_count() {
        let bits = [true, false, true];
        let out = manchester_encode(&bits);
        assert_eq!(out.len(), 6);
        assert_eq!(&out[0..2], &[true, false]);
        assert_eq!(&out[2..4], &[false, true]);
    }

    #[test]
    fn broadcast_stops_after_max_reps() {
        let mut lf = LfEmulator::new(TagSpecific::Em410x, &em410x::DEFAULT_ID);
        lf.start_emulating();
        let mut count = 0;
        while lf.next_broadcast().is_some() {
            count += 1;
        }
        assert_eq!(count, BROADCAST_MAX);
        assert_eq!(lf.state, LfState::Sensing);
    }
}
