//! HF emulator command group: configures the active slot's emulated HF tag
//! body (MF1 block pokes, anti-collision override, Gen1a/Gen2 magic toggles,
//! write-mode, the MF1 detection/auth-attempt log, and MFU/NTAG page access).
//! Every mutation is followed by `Core::sync_hf_buf_from_picc` so the change
//! survives the next `SLOT_DATA_CONFIG_SAVE`.

use heapless::Vec as HVec;

use crate::core::Core;
use crate::error::StatusCode;
use crate::hf::mf1::image::WriteMode;
use crate::hf::picc::TagBody;
use crate::transport::frame::MAX_DATA_LEN;

use super::{empty, HandlerResult};

const CMD_MF1_WRITE_EMU_BLOCK_DATA: u16 = 4000;
const CMD_MF1_READ_EMU_BLOCK_DATA: u16 = 4001;
const CMD_MF1_SET_ANTI_COLLISION_DATA: u16 = 4002;
const CMD_MF1_SET_DETECTION_ENABLE: u16 = 4003;
const CMD_MF1_GET_DETECTION_ENABLE: u16 = 4004;
const CMD_MF1_GET_DETECTION_COUNT: u16 = 4005;
const CMD_MF1_GET_DETECTION_LOG: u16 = 4006;
const CMD_MF1_SET_GEN1A_MODE: u16 = 4007;
const CMD_MF1_SET_GEN2_MODE: u16 = 4008;
const CMD_MF1_SET_WRITE_MODE: u16 = 4009;
const CMD_MF1_GET_WRITE_MODE: u16 = 4010;
const CMD_MF1_GET_EMULATOR_CONFIG: u16 = 4011;
const CMD_MFU_SET_EMU_CONFIG: u16 = 4012;
const CMD_MFU_GET_EMU_CONFIG: u16 = 4013;
const CMD_MFU_READ_EMU_PAGE_DATA: u16 = 4014;
const CMD_MFU_WRITE_EMU_PAGE_DATA: u16 = 4015;

const DETECTION_LOG_ENTRY_LEN: usize = 25;

pub(crate) fn handle(core: &mut Core, cmd: u16, data: &[u8]) -> HandlerResult {
    match cmd {
        CMD_MF1_WRITE_EMU_BLOCK_DATA => {
            if data.len() < 17 {
                return Err(StatusCode::InvalidParams);
            }
            let block = data[0];
            let mut payload = [0u8; 16];
            payload.copy_from_slice(&data[1..17]);
            let TagBody::Mf1(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            *tag.image.block_mut(block as usize).ok_or(StatusCode::InvalidParams)? = payload;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_READ_EMU_BLOCK_DATA => {
            let block = data.first().copied().ok_or(StatusCode::InvalidParams)?;
            let TagBody::Mf1(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let block_data = tag.image.block(block as usize).ok_or(StatusCode::InvalidParams)?;
            let mut out = empty();
            let _ = out.extend_from_slice(block_data);
            Ok(out)
        }

        CMD_MF1_SET_ANTI_COLLISION_DATA => {
            if data.len() < 4 {
                return Err(StatusCode::InvalidParams);
            }
            let uid_len = data[0];
            let needed = 1 + uid_len as usize + 3;
            if data.len() < needed {
                return Err(StatusCode::InvalidParams);
            }
            let picc = core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?;
            picc.snapshot.uid_len = uid_len;
            picc.snapshot.uid[..uid_len as usize].copy_from_slice(&data[1..1 + uid_len as usize]);
            let off = 1 + uid_len as usize;
            let sak = data[off];
            picc.snapshot.sak = sak;
            picc.snapshot.atqa.copy_from_slice(&data[off + 1..off + 3]);
            if let TagBody::Mf1(tag) = &mut picc.body {
                tag.image.coll_res.sak = sak;
                tag.image.coll_res.atqa = picc.snapshot.atqa;
            }
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_SET_DETECTION_ENABLE => {
            let enable = data.first().copied().ok_or(StatusCode::InvalidParams)? != 0;
            let TagBody::Mf1(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            tag.image.config.detection_enable = enable;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_GET_DETECTION_ENABLE => {
            let TagBody::Mf1(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let mut out = empty();
            let _ = out.push(tag.image.config.detection_enable as u8);
            Ok(out)
        }

        CMD_MF1_GET_DETECTION_COUNT => {
            let mut out = empty();
            let _ = out.extend_from_slice(&core.auth_log.count.to_le_bytes());
            Ok(out)
        }

        CMD_MF1_GET_DETECTION_LOG => {
            if data.len() < 3 {
                return Err(StatusCode::InvalidParams);
            }
            let start = u16::from_le_bytes([data[0], data[1]]) as usize;
            let count = data[2] as usize;
            let mut out: HVec<u8, MAX_DATA_LEN> = empty();
            for entry in core.auth_log.iter().skip(start).take(count) {
                if out.len() + DETECTION_LOG_ENTRY_LEN > out.capacity() {
                    break;
                }
                let _ = out.push(entry.block);
                let _ = out.push(entry.is_key_b as u8);
                let _ = out.extend_from_slice(&entry.uid);
                let _ = out.extend_from_slice(&entry.nt.to_le_bytes());
                let _ = out.extend_from_slice(&entry.nr.to_le_bytes());
                let _ = out.extend_from_slice(&entry.ar.to_le_bytes());
                match entry.key_known {
                    Some(key) => {
                        let _ = out.push(1);
                        let _ = out.extend_from_slice(&key);
                    }
                    None => {
                        let _ = out.push(0);
                        let _ = out.extend_from_slice(&[0u8; 6]);
                    }
                }
            }
            Ok(out)
        }

        CMD_MF1_SET_GEN1A_MODE => {
            let enable = data.first().copied().ok_or(StatusCode::InvalidParams)? != 0;
            let TagBody::Mf1(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            tag.image.config.gen1a_magic = enable;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_SET_GEN2_MODE => {
            let enable = data.first().copied().ok_or(StatusCode::InvalidParams)? != 0;
            let TagBody::Mf1(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            tag.image.config.gen2_magic = enable;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_SET_WRITE_MODE => {
            let mode = data.first().copied().ok_or(StatusCode::InvalidParams)?;
            let TagBody::Mf1(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            tag.image.config.write_mode = WriteMode::from_u8(mode);
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MF1_GET_WRITE_MODE => {
            let TagBody::Mf1(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let mut out = empty();
            let _ = out.push(tag.image.config.write_mode.to_u8());
            Ok(out)
        }

        CMD_MF1_GET_EMULATOR_CONFIG => {
            let TagBody::Mf1(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let cfg = &tag.image.config;
            let mut out = empty();
            let _ = out.push(cfg.write_mode.to_u8());
            let _ = out.push(cfg.use_mf1_coll_res as u8);
            let _ = out.push(cfg.gen1a_magic as u8);
            let _ = out.push(cfg.gen2_magic as u8);
            let _ = out.push(cfg.detection_enable as u8);
            Ok(out)
        }

        CMD_MFU_SET_EMU_CONFIG => {
            let &[auth_enabled, auth_limit] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let TagBody::Mfu(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            tag.image.config.auth_enabled = auth_enabled != 0;
            tag.image.config.auth_limit = auth_limit;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        CMD_MFU_GET_EMU_CONFIG => {
            let TagBody::Mfu(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let mut out = empty();
            let _ = out.push(tag.image.config.auth_enabled as u8);
            let _ = out.push(tag.image.config.auth_limit);
            let _ = out.push(tag.image.auth_fail_count);
            Ok(out)
        }

        CMD_MFU_READ_EMU_PAGE_DATA => {
            let page = data.first().copied().ok_or(StatusCode::InvalidParams)?;
            let TagBody::Mfu(tag) = &core.picc.as_ref().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            let page_data = tag.image.page(page as usize).ok_or(StatusCode::InvalidParams)?;
            let mut out = empty();
            let _ = out.extend_from_slice(page_data);
            Ok(out)
        }

        CMD_MFU_WRITE_EMU_PAGE_DATA => {
            if data.len() < 5 {
                return Err(StatusCode::InvalidParams);
            }
            let page = data[0];
            let mut payload = [0u8; 4];
            payload.copy_from_slice(&data[1..5]);
            let TagBody::Mfu(tag) = &mut core.picc.as_mut().ok_or(StatusCode::InvalidSlotType)?.body else {
                return Err(StatusCode::InvalidSlotType);
            };
            *tag.image.page_mut(page as usize).ok_or(StatusCode::InvalidParams)? = payload;
            core.sync_hf_buf_from_picc();
            Ok(empty())
        }

        _ => Err(StatusCode::InvalidCmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::mock::MockStore;
    use crate::tagtypes::TagSpecific;

    fn mf1_core() -> Core {
        let store: Box<dyn crate::persist::KvStore + Send> = Box::new(MockStore::default());
        let mut core = Core::new(store, None);
        core.change_slot_type(1, TagSpecific::Mifare1K).unwrap();
        core.slot_set_enable(1, crate::tagtypes::SenseType::Hf, true).unwrap();
        core.change_slot(1, false).unwrap();
        core
    }

    /// S6: write slot HF block 0 then read it back unchanged.
    #[test]
    fn write_then_read_emu_block_round_trips() {
        let mut core = mf1_core();
        let mut payload = heapless::Vec::<u8, 17>::new();
        let _ = payload.push(0x00);
        let block0: [u8; 16] = [
            0xDE, 0xAD, 0xBE, 0xEF, 0x11, 0x08, 0x04, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
            0x07, 0x08,
        ];
        let _ = payload.extend_from_slice(&block0);

        handle(&mut core, CMD_MF1_WRITE_EMU_BLOCK_DATA, &payload).unwrap();
        let read = handle(&mut core, CMD_MF1_READ_EMU_BLOCK_DATA, &[0]).unwrap();
        assert_eq!(&read[..], &block0[..]);
    }

    #[test]
    fn write_mode_round_trips() {
        let mut core = mf1_core();
        handle(&mut core, CMD_MF1_SET_WRITE_MODE, &[WriteMode::Deceive.to_u8()]).unwrap();
        let out = handle(&mut core, CMD_MF1_GET_WRITE_MODE, &[]).unwrap();
        assert_eq!(out[0], WriteMode::Deceive.to_u8());
    }

    #[test]
    fn unknown_command_in_range_is_invalid() {
        let mut core = mf1_core();
        let err = handle(&mut core, 4999, &[]).unwrap_err();
        assert_eq!(err, StatusCode::InvalidCmd);
    }

    fn mfu_core() -> Core {
        let store: Box<dyn crate::persist::KvStore + Send> = Box::new(MockStore::default());
        let mut core = Core::new(store, None);
        core.change_slot_type(1, TagSpecific::Ntag213).unwrap();
        core.slot_set_enable(1, crate::tagtypes::SenseType::Hf, true).unwrap();
        core.change_slot(1, false).unwrap();
        core
    }

    #[test]
    fn gen1a_and_gen2_magic_toggles_are_reflected_in_emulator_config() {
        let mut core = mf1_core();
        handle(&mut core, CMD_MF1_SET_GEN1A_MODE, &[1]).unwrap();
        handle(&mut core, CMD_MF1_SET_GEN2_MODE, &[1]).unwrap();
        let out = handle(&mut core, CMD_MF1_GET_EMULATOR_CONFIG, &[]).unwrap();
        assert_eq!(out[2], 1); // gen1a_magic
        assert_eq!(out[3], 1); // gen2_magic
    }

    #[test]
    fn detection_enable_round_trips_and_gates_the_auth_log() {
        let mut core = mf1_core();
        handle(&mut core, CMD_MF1_SET_DETECTION_ENABLE, &[1]).unwrap();
        let out = handle(&mut core, CMD_MF1_GET_DETECTION_ENABLE, &[]).unwrap();
        assert_eq!(out[0], 1);
        let count = handle(&mut core, CMD_MF1_GET_DETECTION_COUNT, &[]).unwrap();
        assert_eq!(&count[..], &0u32.to_le_bytes());
    }

    #[test]
    fn set_anti_collision_data_overrides_uid_sak_and_atqa() {
        let mut core = mf1_core();
        let mut req = heapless::Vec::<u8, 16>::new();
        let _ = req.push(4); // uid_len
        let _ = req.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let _ = req.push(0x18); // sak
        let _ = req.extend_from_slice(&[0x00, 0x04]); // atqa
        handle(&mut core, CMD_MF1_SET_ANTI_COLLISION_DATA, &req).unwrap();
        let picc = core.picc.as_ref().unwrap();
        assert_eq!(picc.snapshot.uid(), &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(picc.snapshot.sak, 0x18);
    }

    #[test]
    fn mfu_write_then_read_emu_page_round_trips() {
        let mut core = mfu_core();
        let mut req = heapless::Vec::<u8, 5>::new();
        let _ = req.push(4);
        let _ = req.extend_from_slice(&[1, 2, 3, 4]);
        handle(&mut core, CMD_MFU_WRITE_EMU_PAGE_DATA, &req).unwrap();
        let out = handle(&mut core, CMD_MFU_READ_EMU_PAGE_DATA, &[4]).unwrap();
        assert_eq!(&out[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn mfu_set_emu_config_round_trips_through_get() {
        let mut core = mfu_core();
        handle(&mut core, CMD_MFU_SET_EMU_CONFIG, &[1, 3]).unwrap();
        let out = handle(&mut core, CMD_MFU_GET_EMU_CONFIG, &[]).unwrap();
        assert_eq!(out[0], 1);
        assert_eq!(out[1], 3);
    }

    #[test]
    fn mf1_commands_against_an_mfu_slot_report_invalid_slot_type() {
        let mut core = mfu_core();
        let err = handle(&mut core, CMD_MF1_READ_EMU_BLOCK_DATA, &[0]).unwrap_err();
        assert_eq!(err, StatusCode::InvalidSlotType);
    }
}
