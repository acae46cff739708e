//! LF emulator command group: reads
//! and replaces the EM410x/Viking ID the active slot's LF emulator
//! broadcasts. Mirrors the HF emulator group's "mutate, then
//! `sync_lf_buf`" pattern so the change survives the next
//! `SLOT_DATA_CONFIG_SAVE`.

use crate::core::Core;
use crate::error::StatusCode;
use crate::lf::em410x;
use crate::lf::emulator::LfPayload;
use crate::lf::viking;

use super::{empty, HandlerResult};

const CMD_SET_EM410X_EMU_ID: u16 = 5000;
const CMD_GET_EM410X_EMU_ID: u16 = 5001;
const CMD_SET_VIKING_EMU_ID: u16 = 5002;
const CMD_GET_VIKING_EMU_ID: u16 = 5003;

pub(crate) fn handle(core: &mut Core, cmd: u16, data: &[u8]) -> HandlerResult {
    match cmd {
        CMD_SET_EM410X_EMU_ID => {
            if data.len() != em410x::ID_LEN {
                return Err(StatusCode::InvalidParams);
            }
            let lf = core.lf.as_mut().ok_or(StatusCode::InvalidSlotType)?;
            let LfPayload::Em410x(id) = &mut lf.payload else {
                return Err(StatusCode::InvalidSlotType);
            };
            id.copy_from_slice(data);
            core.sync_lf_buf(data);
            Ok(empty())
        }

        CMD_GET_EM410X_EMU_ID => {
            let lf = core.lf.as_ref().ok_or(StatusCode::InvalidSlotType)?;
            let LfPayload::Em410x(id) = &lf.payload else {
                return Err(StatusCode::InvalidSlotType);
            };
            let mut out = empty();
            let _ = out.extend_from_slice(id);
            Ok(out)
        }

        CMD_SET_VIKING_EMU_ID => {
            if data.len() != 4 {
                return Err(StatusCode::InvalidParams);
            }
            let lf = core.lf.as_mut().ok_or(StatusCode::InvalidSlotType)?;
            let LfPayload::Viking(id) = &mut lf.payload else {
                return Err(StatusCode::InvalidSlotType);
            };
            id.copy_from_slice(data);
            core.sync_lf_buf(data);
            Ok(empty())
        }

        CMD_GET_VIKING_EMU_ID => {
            let lf = core.lf.as_ref().ok_or(StatusCode::InvalidSlotType)?;
            let LfPayload::Viking(id) = &lf.payload else {
                return Err(StatusCode::InvalidSlotType);
            };
            let mut out = empty();
            let _ = out.extend_from_slice(id);
            Ok(out)
        }

        _ => Err(StatusCode::InvalidCmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::mock::MockStore;

    fn test_core() -> Core {
        let store: Box<dyn crate::persist::KvStore + Send> = Box::new(MockStore::default());
        Core::new(store, None)
    }

    #[test]
    fn set_then_get_em410x_emu_id_round_trips() {
        let mut core = test_core();
        let id = [0x11, 0x22, 0x33, 0x44, 0x55];
        let reply = super::handle(&mut core, CMD_SET_EM410X_EMU_ID, &id);
        assert!(reply.is_ok());
        let reply = super::handle(&mut core, CMD_GET_EM410X_EMU_ID, &[]).unwrap();
        assert_eq!(&reply[..], &id);
    }
}
