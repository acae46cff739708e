//! Device command group: app
//! version/mode queries and the slot-management surface built on top of
//! `Core`'s `SlotManager` wrapper methods. A handful of device commands a
//! full BLE/OTA/button-animation firmware would carry (bootloader entry,
//! battery telemetry, button-press config, BLE MAC query, capability
//! bitmap) are explicit non-goals here and answer `NotImplemented` rather
//! than being silently absent from the table.

use heapless::Vec as HVec;

use crate::core::Core;
use crate::error::StatusCode;
use crate::mode::Mode;
use crate::tagtypes::{SenseType, TagSpecific};
use crate::transport::frame::MAX_DATA_LEN;

use super::{empty, HandlerResult};

const CMD_GET_APP_VERSION: u16 = 1000;
const CMD_CHANGE_MODE: u16 = 1001;
const CMD_GET_DEVICE_MODE: u16 = 1002;
const CMD_SET_ACTIVE_SLOT: u16 = 1003;
const CMD_SET_SLOT_TAG_TYPE: u16 = 1004;
const CMD_SET_SLOT_DATA_DEFAULT: u16 = 1005;
const CMD_SET_SLOT_ENABLE: u16 = 1006;
const CMD_SLOT_DATA_CONFIG_SAVE: u16 = 1007;
const CMD_DELETE_SLOT_INFO: u16 = 1008;
const CMD_GET_SLOT_INFO: u16 = 1009;
const CMD_WIPE_FDS: u16 = 1010;
const CMD_GET_ENABLED_SLOTS: u16 = 1011;
const CMD_GET_BATTERY_INFO: u16 = 1012;
const CMD_GET_BUTTON_CONFIG: u16 = 1013;
const CMD_SET_BUTTON_CONFIG: u16 = 1014;
const CMD_GET_BLE_ADDRESS: u16 = 1015;
const CMD_ENTER_BOOTLOADER: u16 = 1016;
const CMD_GET_DEVICE_CAPABILITIES: u16 = 1017;
const CMD_GET_ACTIVE_SLOT: u16 = 1018;

const APP_VERSION: [u8; 2] = [1, 0];

fn sense_from_u8(v: u8) -> Option<SenseType> {
    match v {
        0 => Some(SenseType::Hf),
        1 => Some(SenseType::Lf),
        _ => None,
    }
}

fn mode_from_u8(v: u8) -> Option<Mode> {
    match v {
        0 => Some(Mode::None),
        1 => Some(Mode::Reader),
        2 => Some(Mode::Tag),
        _ => None,
    }
}

fn mode_to_u8(m: Mode) -> u8 {
    match m {
        Mode::None => 0,
        Mode::Reader => 1,
        Mode::Tag => 2,
    }
}

pub(crate) fn handle(core: &mut Core, cmd: u16, data: &[u8]) -> HandlerResult {
    match cmd {
        CMD_GET_APP_VERSION => {
            let mut out = empty();
            let _ = out.extend_from_slice(&APP_VERSION);
            Ok(out)
        }

        CMD_CHANGE_MODE => {
            let requested = data.first().copied().and_then(mode_from_u8).ok_or(StatusCode::InvalidParams)?;
            let result = match requested {
                Mode::None => {
                    core.mode.enter_none();
                    Ok(())
                }
                Mode::Reader => core.mode.enter_reader(),
                Mode::Tag => core.mode.enter_tag(),
            };
            result.map_err(|_| StatusCode::DeviceModeError)?;
            Ok(empty())
        }

        CMD_GET_DEVICE_MODE => {
            let mut out = empty();
            let _ = out.push(mode_to_u8(core.mode.current()));
            Ok(out)
        }

        CMD_SET_ACTIVE_SLOT => {
            let slot = data.first().copied().ok_or(StatusCode::InvalidParams)?;
            core.change_slot(slot, true)?;
            Ok(empty())
        }

        CMD_GET_ACTIVE_SLOT => {
            let mut out = empty();
            let _ = out.push(core.slots.config.active);
            Ok(out)
        }

        CMD_SET_SLOT_TAG_TYPE => {
            let &[slot, specific_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let specific = TagSpecific::from_u8(specific_raw).ok_or(StatusCode::InvalidSlotType)?;
            core.change_slot_type(slot, specific)?;
            Ok(empty())
        }

        CMD_SET_SLOT_DATA_DEFAULT => {
            let &[slot, specific_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let specific = TagSpecific::from_u8(specific_raw).ok_or(StatusCode::InvalidSlotType)?;
            if core.factory_slot_data(slot, specific) {
                Ok(empty())
            } else {
                Err(StatusCode::FlashWriteFail)
            }
        }

        CMD_SET_SLOT_ENABLE => {
            let &[slot, sense_raw, enable_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let sense = sense_from_u8(sense_raw).ok_or(StatusCode::InvalidParams)?;
            core.slot_set_enable(slot, sense, enable_raw != 0)?;
            Ok(empty())
        }

        CMD_SLOT_DATA_CONFIG_SAVE => {
            core.save_slots()?;
            Ok(empty())
        }

        CMD_DELETE_SLOT_INFO => {
            let &[slot, sense_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let sense = sense_from_u8(sense_raw).ok_or(StatusCode::InvalidParams)?;
            core.delete_slot_data(slot, sense)?;
            Ok(empty())
        }

        CMD_GET_SLOT_INFO => {
            let mut out: HVec<u8, MAX_DATA_LEN> = empty();
            for slot in core.slots.config.slots.iter() {
                let _ = out.push(slot.enabled_hf as u8);
                let _ = out.push(slot.enabled_lf as u8);
                let _ = out.push(slot.tag_hf.to_u8());
                let _ = out.push(slot.tag_lf.to_u8());
            }
            Ok(out)
        }

        CMD_GET_ENABLED_SLOTS => {
            let mut mask: u8 = 0;
            for (i, slot) in core.slots.config.slots.iter().enumerate() {
                if slot.enabled_hf || slot.enabled_lf {
                    mask |= 1 << i;
                }
            }
            let mut out = empty();
            let _ = out.push(mask);
            Ok(out)
        }

        CMD_WIPE_FDS => {
            if core.wipe_store() {
                Ok(empty())
            } else {
                Err(StatusCode::FlashWriteFail)
            }
        }

        CMD_GET_BATTERY_INFO
        | CMD_GET_BUTTON_CONFIG
        | CMD_SET_BUTTON_CONFIG
        | CMD_GET_BLE_ADDRESS
        | CMD_ENTER_BOOTLOADER
        | CMD_GET_DEVICE_CAPABILITIES => Err(StatusCode::NotImplemented),

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
    fn set_slot_tag_type_then_get_slot_info_reflects_it() {
        let mut core = test_core();
        handle(&mut core, CMD_SET_SLOT_TAG_TYPE, &[2, TagSpecific::Ntag213.to_u8()]).unwrap();
        let out = handle(&mut core, CMD_GET_SLOT_INFO, &[]).unwrap();
        // 4 bytes per slot: enabled_hf, enabled_lf, tag_hf, tag_lf.
        assert_eq!(out[2 * 4 + 2], TagSpecific::Ntag213.to_u8());
    }

    #[test]
    fn set_slot_enable_is_reflected_in_enabled_slots_mask() {
        let mut core = test_core();
        handle(&mut core, CMD_SET_SLOT_TAG_TYPE, &[1, TagSpecific::Mifare1K.to_u8()]).unwrap();
        handle(&mut core, CMD_SET_SLOT_ENABLE, &[1, 0, 1]).unwrap();
        let out = handle(&mut core, CMD_GET_ENABLED_SLOTS, &[]).unwrap();
        assert_ne!(out[0] & (1 << 1), 0);
    }

    #[test]
    fn delete_slot_info_clears_its_enabled_bit() {
        let mut core = test_core();
        handle(&mut core, CMD_SET_SLOT_TAG_TYPE, &[3, TagSpecific::Mifare1K.to_u8()]).unwrap();
        handle(&mut core, CMD_SET_SLOT_ENABLE, &[3, 0, 1]).unwrap();
        handle(&mut core, CMD_DELETE_SLOT_INFO, &[3, 0]).unwrap();
        let out = handle(&mut core, CMD_GET_ENABLED_SLOTS, &[]).unwrap();
        assert_eq!(out[0] & (1 << 3), 0);
    }

    #[test]
    fn change_mode_round_trips_through_get_device_mode() {
        let mut core = test_core();
        handle(&mut core, CMD_CHANGE_MODE, &[1]).unwrap();
        let out = handle(&mut core, CMD_GET_DEVICE_MODE, &[]).unwrap();
        assert_eq!(out[0], 1);
        handle(&mut core, CMD_CHANGE_MODE, &[0]).unwrap();
    }

    /// `WIPE_FDS` erases the backing store; it does not itself reset the
    /// in-memory slot config still held by `Core` (that only happens on
    /// the next cold-start `SlotManager::init` against the now-empty store).
    #[test]
    fn wipe_fds_succeeds_without_mutating_in_memory_slot_config() {
        let mut core = test_core();
        handle(&mut core, CMD_SET_SLOT_TAG_TYPE, &[1, TagSpecific::Mifare1K.to_u8()]).unwrap();
        handle(&mut core, CMD_WIPE_FDS, &[]).unwrap();
        let out = handle(&mut core, CMD_GET_SLOT_INFO, &[]).unwrap();
        assert_eq!(out[1 * 4 + 2], TagSpecific::Mifare1K.to_u8());
    }

    /// Explicit non-goals (battery, button config, BLE MAC, bootloader,
    /// capability bitmap) answer a well-formed reply rather than being
    /// silently absent from the dispatch table.
    #[test]
    fn non_goal_commands_answer_not_implemented() {
        let mut core = test_core();
        for cmd in [
            CMD_GET_BATTERY_INFO,
            CMD_GET_BUTTON_CONFIG,
            CMD_SET_BUTTON_CONFIG,
            CMD_GET_BLE_ADDRESS,
            CMD_ENTER_BOOTLOADER,
            CMD_GET_DEVICE_CAPABILITIES,
        ] {
            assert_eq!(handle(&mut core, cmd, &[]).unwrap_err(), StatusCode::NotImplemented);
        }
    }
}
