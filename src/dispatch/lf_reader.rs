//! LF reader command group (command codes 3000-3999). This device family
//! has no dedicated 125 kHz *reader* coil, only the emulator/modulator
//! path covered by `lf_emulator`; an external-card LF reader is an
//! explicit non-goal. Every code in this range answers
//! `NotImplemented` so a host probing the full command space gets a
//! well-formed reply rather than silence.

use crate::core::Core;
use crate::error::StatusCode;

use super::HandlerResult;

pub(crate) fn handle(_core: &mut Core, _cmd: u16, _data: &[u8]) -> HandlerResult {
    Err(StatusCode::NotImplemented)
}
