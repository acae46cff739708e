//! LF (125 kHz) subsystem: EM410x/Viking framing and the tag emulator.

pub mod em410x;
pub mod emulator;
pub mod viking;
