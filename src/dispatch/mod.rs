//! Command dispatcher: a static table of `(cmd_code, pre?,
//! handler, post?)` grouped by command-code range: device (1000-1999),
//! HF reader (2000-2999), LF reader (3000-3999), HF emulator (4000-4999),
//! LF emulator (5000-5999). Routing is a match on the range rather than a
//! literal array (heapless has no good story for storing per-entry
//! closures of varying capture), but the per-range pre/post hooks below
//! still give every handler the "always release the antenna" guarantee.

mod device;
mod hf_emulator;
mod hf_reader;
mod lf_emulator;
mod lf_reader;

use crate::core::Core;
use crate::error::StatusCode;
use crate::transport::frame::{Frame, MAX_DATA_LEN};

pub type HandlerResult = Result<heapless::Vec<u8, MAX_DATA_LEN>, StatusCode>;

pub(crate) fn empty() -> heapless::Vec<u8, MAX_DATA_LEN> {
    heapless::Vec::new()
}

/// Routes one complete frame to its handler and turns the `Result` into a
/// reply frame carrying the same `cmd` and either `Success` + payload or a
/// non-zero `StatusCode`.
pub fn dispatch(core: &mut Core, frame: Frame) -> Frame {
    let cmd = frame.cmd;
    let data: &[u8] = &frame.data;

    let result = match cmd {
        1000..=1999 => device::handle(core, cmd, data),
        2000..=2999 => hf_reader::handle_with_hooks(core, cmd, data),
        3000..=3999 => lf_reader::handle(core, cmd, data),
        4000..=4999 => hf_emulator::handle(core, cmd, data),
        5000..=5999 => lf_emulator::handle(core, cmd, data),
        _ => Err(StatusCode::InvalidCmd),
    };

    match result {
        Ok(payload) => Frame::new(cmd, StatusCode::Success.to_u16(), &payload),
        Err(status) => Frame::new(cmd, status.to_u16(), &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::mock::MockStore;
    use crate::transport::frame::{Frame, FrameParser};

    fn test_core() -> Core {
        let store: Box<dyn crate::persist::KvStore + Send> = Box::new(MockStore::default());
        Core::new(store, None)
    }

    /// `GET_APP_VERSION` round trip.
    #[test]
    fn scenario_s1_get_app_version() {
        let mut core = test_core();
        let bytes = [0x11, 0xEF, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x00];
        let mut parser = FrameParser::new();
        let mut request = None;
        for &b in &bytes {
            if let Some(f) = parser.push(b) {
                request = Some(f);
            }
        }
        let request: Frame = request.expect("S1 bytes should parse");
        let reply = dispatch(&mut core, request);
        assert_eq!(reply.cmd, 1000);
        assert_eq!(reply.status, StatusCode::Success.to_u16());
        assert_eq!(reply.data.len(), 2);
    }

    #[test]
    fn unknown_command_reports_invalid_cmd() {
        let mut core = test_core();
        let reply = dispatch(&mut core, Frame::new(9999, 0, &[]));
        assert_eq!(reply.status, StatusCode::InvalidCmd.to_u16());
    }

    #[test]
    fn get_active_slot_then_set_active_slot_round_trips() {
        let mut core = test_core();
        let reply = dispatch(&mut core, Frame::new(1018, 0, &[]));
        assert_eq!(reply.data[..], [0]);

        let reply = dispatch(&mut core, Frame::new(1003, 0, &[1]));
        assert_eq!(reply.status, StatusCode::Success.to_u16());

        let reply = dispatch(&mut core, Frame::new(1018, 0, &[]));
        assert_eq!(reply.data[..], [1]);
    }
}
