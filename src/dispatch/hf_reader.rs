//! HF reader command group:
//! drives a live `ReaderOps` session against an external card: scanning,
//! MF1 authenticated read/write, the Crypto1 attack toolbox, and a raw
//! 14A passthrough. Every handler here runs under the "antenna on before,
//! antenna off after, regardless of outcome" pre/post hook, mirrored by
//! `handle_with_hooks` wrapping the per-command `handle`.

use heapless::Vec as HVec;

use crate::core::{Core, ReaderOps, ReaderOracle};
use crate::error::StatusCode;
use crate::hf::tag14a::Tag14aSnapshot;
use crate::hf::toolbox::{
    check_keys_of_sectors, check_prng_type, darkside_recover_key, nested_distance_detect,
    nested_recover_key, static_nested_recover_key, DarksideStatus, Mf1Oracle, NestedStatus, NtSample,
    PrngType,
};
use crate::transport::frame::MAX_DATA_LEN;

use super::{empty, HandlerResult};

const CMD_HF14A_SCAN: u16 = 2000;
const CMD_MF1_SUPPORT: u16 = 2001;
const CMD_MF1_NT_LEVEL: u16 = 2002;
const CMD_MF1_DETECT_NT_DIST: u16 = 2003;
const CMD_MF1_DARKSIDE_ACQUIRE: u16 = 2004;
const CMD_MF1_DETECT_NESTED: u16 = 2005;
const CMD_MF1_STATIC_NESTED_ACQUIRE: u16 = 2006;
const CMD_MF1_CHECK_KEYS_OF_SECTORS: u16 = 2007;
const CMD_MF1_READ_BLOCK: u16 = 2008;
const CMD_MF1_WRITE_BLOCK: u16 = 2009;
const CMD_HF14A_RAW: u16 = 2010;
const CMD_HF14A_HALT: u16 = 2011;

fn reader_mut(core: &mut Core) -> Result<&mut dyn ReaderOps, StatusCode> {
    core.reader.as_deref_mut().ok_or(StatusCode::NotImplemented)
}

/// Claims the antenna for the duration of one reader command and releases
/// it afterward no matter how the command concluded (the
/// antenna must never stay energized across a failed or aborted exchange).
pub(crate) fn handle_with_hooks(core: &mut Core, cmd: u16, data: &[u8]) -> HandlerResult {
    core.mode.enter_reader().map_err(|_| StatusCode::DeviceModeError)?;
    let reader = match reader_mut(core) {
        Ok(r) => r,
        Err(e) => {
            core.mode.enter_none();
            return Err(e);
        }
    };
    if let Err(e) = reader.antenna_on() {
        core.mode.enter_none();
        return Err(e.into());
    }

    let result = handle(core, cmd, data);

    if let Ok(reader) = reader_mut(core) {
        let _ = reader.antenna_off();
    }
    core.mode.enter_none();
    result
}

fn encode_snapshot(snapshot: &Tag14aSnapshot) -> HVec<u8, MAX_DATA_LEN> {
    let mut out = empty();
    let _ = out.push(snapshot.uid_len);
    let _ = out.extend_from_slice(snapshot.uid());
    let _ = out.push(snapshot.sak);
    let _ = out.extend_from_slice(&snapshot.atqa);
    match snapshot.ats {
        Some((ats, len)) => {
            let _ = out.push(len);
            let _ = out.extend_from_slice(&ats[..len as usize]);
        }
        None => {
            let _ = out.push(0);
        }
    }
    out
}

fn parse_block_keyb_key(data: &[u8]) -> Option<(u8, bool, [u8; 6])> {
    if data.len() < 8 {
        return None;
    }
    let mut key = [0u8; 6];
    key.copy_from_slice(&data[2..8]);
    Some((data[0], data[1] != 0, key))
}

fn handle(core: &mut Core, cmd: u16, data: &[u8]) -> HandlerResult {
    match cmd {
        CMD_HF14A_SCAN => {
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            Ok(encode_snapshot(&snapshot))
        }

        CMD_MF1_SUPPORT => {
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut out = empty();
            let _ = out.push((snapshot.sak & 0x08 != 0) as u8);
            Ok(out)
        }

        CMD_MF1_NT_LEVEL => {
            let &[block, is_key_b_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let is_key_b = is_key_b_raw != 0;
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut oracle = ReaderOracle {
                reader: reader_mut(core)?,
                snapshot,
                block,
                is_key_b,
            };
            let nt1 = oracle.request_nt(block, is_key_b).map_err(StatusCode::from)?;
            let nt2 = oracle.request_nt(block, is_key_b).map_err(StatusCode::from)?;
            let prng = check_prng_type(&[NtSample { nt: nt1 }, NtSample { nt: nt2 }]);
            let mut out = empty();
            let _ = out.push(match prng {
                PrngType::Static => 0,
                PrngType::Weak => 1,
                PrngType::Hard => 2,
            });
            Ok(out)
        }

        CMD_MF1_DETECT_NT_DIST => {
            let &[block, is_key_b_raw] = data else {
                return Err(StatusCode::InvalidParams);
            };
            let is_key_b = is_key_b_raw != 0;
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut oracle = ReaderOracle {
                reader: reader_mut(core)?,
                snapshot,
                block,
                is_key_b,
            };
            let dist = nested_distance_detect(&mut oracle, block, is_key_b).map_err(StatusCode::from)?;
            let mut out = empty();
            let _ = out.extend_from_slice(&dist.to_le_bytes());
            Ok(out)
        }

        CMD_MF1_DARKSIDE_ACQUIRE => {
            if data.len() < 6 {
                return Err(StatusCode::InvalidParams);
            }
            let block = data[0];
            let is_key_b = data[1] != 0;
            let max_resync = u32::from_le_bytes(data[2..6].try_into().unwrap());
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut oracle = ReaderOracle {
                reader: reader_mut(core)?,
                snapshot,
                block,
                is_key_b,
            };
            let result = darkside_recover_key(&mut oracle, block, is_key_b, max_resync);
            let mut out = empty();
            let _ = out.push(match result.status {
                DarksideStatus::Ok => 0,
                DarksideStatus::CantFixNt => 1,
                DarksideStatus::LuckyAuthOk => 2,
                DarksideStatus::NoNakSent => 3,
                DarksideStatus::TagChanged => 4,
            });
            match result.key_candidate {
                Some(key) => {
                    let _ = out.push(1);
                    let _ = out.extend_from_slice(&key);
                }
                None => {
                    let _ = out.push(0);
                }
            }
            Ok(out)
        }

        CMD_MF1_DETECT_NESTED | CMD_MF1_STATIC_NESTED_ACQUIRE => {
            if data.len() < 8 {
                return Err(StatusCode::InvalidParams);
            }
            let mut known_key = [0u8; 6];
            known_key.copy_from_slice(&data[0..6]);
            let block = data[6];
            let is_key_b = data[7] != 0;
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut oracle = ReaderOracle {
                reader: reader_mut(core)?,
                snapshot,
                block,
                is_key_b,
            };
            let result = if cmd == CMD_MF1_DETECT_NESTED {
                nested_recover_key(&mut oracle, known_key, block, is_key_b)
            } else {
                static_nested_recover_key(&mut oracle, known_key, block, is_key_b)
            };
            let mut out = empty();
            let _ = out.push(match result.status {
                NestedStatus::Ok => 0,
                NestedStatus::TagLost => 1,
            });
            let _ = out.push(result.key_candidates.len() as u8);
            for key in result.key_candidates.iter() {
                let _ = out.extend_from_slice(key);
            }
            Ok(out)
        }

        CMD_MF1_CHECK_KEYS_OF_SECTORS => {
            if data.is_empty() {
                return Err(StatusCode::InvalidParams);
            }
            let sector_count = data[0] as usize;
            let key_bytes = &data[1..];
            if key_bytes.len() % 6 != 0 {
                return Err(StatusCode::InvalidParams);
            }
            let mut candidates: HVec<[u8; 6], 64> = HVec::new();
            for chunk in key_bytes.chunks_exact(6) {
                let mut k = [0u8; 6];
                k.copy_from_slice(chunk);
                let _ = candidates.push(k);
            }
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let mut oracle = ReaderOracle {
                reader: reader_mut(core)?,
                snapshot,
                block: 0,
                is_key_b: false,
            };
            let results = check_keys_of_sectors(&mut oracle, sector_count, &candidates).map_err(StatusCode::from)?;
            let mut out = empty();
            for r in results.iter() {
                let _ = out.push(r.sector);
                match r.key_a {
                    Some(k) => {
                        let _ = out.push(1);
                        let _ = out.extend_from_slice(&k);
                    }
                    None => {
                        let _ = out.push(0);
                        let _ = out.extend_from_slice(&[0u8; 6]);
                    }
                }
                match r.key_b {
                    Some(k) => {
                        let _ = out.push(1);
                        let _ = out.extend_from_slice(&k);
                    }
                    None => {
                        let _ = out.push(0);
                        let _ = out.extend_from_slice(&[0u8; 6]);
                    }
                }
            }
            Ok(out)
        }

        CMD_MF1_READ_BLOCK => {
            let (block, is_key_b, key) = parse_block_keyb_key(data).ok_or(StatusCode::InvalidParams)?;
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let reader = reader_mut(core)?;
            reader.mf1_auth(is_key_b, block, &key, &snapshot).map_err(StatusCode::from)?;
            let block_data = reader.mf1_read(block).map_err(StatusCode::from)?;
            let mut out = empty();
            let _ = out.extend_from_slice(&block_data);
            Ok(out)
        }

        CMD_MF1_WRITE_BLOCK => {
            if data.len() < 24 {
                return Err(StatusCode::InvalidParams);
            }
            let (block, is_key_b, key) = parse_block_keyb_key(data).ok_or(StatusCode::InvalidParams)?;
            let mut payload = [0u8; 16];
            payload.copy_from_slice(&data[8..24]);
            let snapshot = reader_mut(core)?.scan_auto().map_err(StatusCode::from)?;
            let reader = reader_mut(core)?;
            reader.mf1_auth(is_key_b, block, &key, &snapshot).map_err(StatusCode::from)?;
            reader.mf1_write(block, &payload).map_err(StatusCode::from)?;
            Ok(empty())
        }

        CMD_HF14A_RAW => {
            if data.len() < 2 {
                return Err(StatusCode::InvalidParams);
            }
            let crc = data[0] != 0;
            let tx_len = data[1] as usize;
            let tx = data.get(2..2 + tx_len).ok_or(StatusCode::InvalidParams)?;
            let mut rx = [0u8; 256];
            let n = reader_mut(core)?.raw_cmd(tx, crc, &mut rx).map_err(StatusCode::from)?;
            let mut out = empty();
            let _ = out.extend_from_slice(&rx[..n]);
            Ok(out)
        }

        CMD_HF14A_HALT => {
            reader_mut(core)?.halt_tag().map_err(StatusCode::from)?;
            Ok(empty())
        }

        _ => Err(StatusCode::InvalidCmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderError;
    use crate::persist::mock::MockStore;

    /// A scripted `ReaderOps` double standing in for a live RC522 session:
    /// no hardware in tests, so antenna/auth/read/write just record calls
    /// and answer from fixed state.
    #[derive(Default)]
    struct FakeReader {
        antenna_on_calls: u32,
        antenna_off_calls: u32,
        auth_should_fail: bool,
        block_memory: [u8; 16],
    }

    impl ReaderOps for FakeReader {
        fn timeout_set(&mut self, _millis: u64) {}

        fn antenna_on(&mut self) -> Result<(), ReaderError> {
            self.antenna_on_calls += 1;
            Ok(())
        }

        fn antenna_off(&mut self) -> Result<(), ReaderError> {
            self.antenna_off_calls += 1;
            Ok(())
        }

        fn reset(&mut self) -> Result<(), ReaderError> {
            Ok(())
        }

        fn halt_tag(&mut self) -> Result<(), ReaderError> {
            Ok(())
        }

        fn scan_once(&mut self) -> Result<Tag14aSnapshot, ReaderError> {
            self.scan_auto()
        }

        fn scan_auto(&mut self) -> Result<Tag14aSnapshot, ReaderError> {
            Ok(Tag14aSnapshot {
                uid: {
                    let mut u = [0u8; 10];
                    u[..4].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);
                    u
                },
                uid_len: 4,
                sak: 0x08,
                atqa: [0x04, 0x00],
                ats: None,
            })
        }

        fn mf1_auth(
            &mut self,
            _key_type_b: bool,
            _block: u8,
            _key: &[u8; 6],
            _snapshot: &Tag14aSnapshot,
        ) -> Result<(), ReaderError> {
            if self.auth_should_fail {
                Err(ReaderError::AuthFail)
            } else {
                Ok(())
            }
        }

        fn mf1_stop_crypto1(&mut self) -> Result<(), ReaderError> {
            Ok(())
        }

        fn mf1_read(&mut self, _block: u8) -> Result<[u8; 16], ReaderError> {
            Ok(self.block_memory)
        }

        fn mf1_write(&mut self, _block: u8, data: &[u8; 16]) -> Result<(), ReaderError> {
            self.block_memory = *data;
            Ok(())
        }

        fn raw_cmd(&mut self, _tx: &[u8], _crc: bool, rx: &mut [u8]) -> Result<usize, ReaderError> {
            rx[0] = 0xAA;
            Ok(1)
        }
    }

    fn reader_core(reader: FakeReader) -> Core {
        let store: Box<dyn crate::persist::KvStore + Send> = Box::new(MockStore::default());
        Core::new(store, Some(Box::new(reader)))
    }

    /// S4: HF14A_SCAN reports back the scanned UID/SAK/ATQA.
    #[test]
    fn hf14a_scan_reports_snapshot_fields() {
        let mut core = reader_core(FakeReader::default());
        let out = handle(&mut core, CMD_HF14A_SCAN, &[]).unwrap();
        assert_eq!(out[0], 4); // uid_len
        assert_eq!(&out[1..5], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(out[5], 0x08); // sak
        assert_eq!(&out[6..8], &[0x04, 0x00]); // atqa
        assert_eq!(out[8], 0); // no ATS
    }

    #[test]
    fn mf1_write_then_read_block_round_trips_through_a_live_reader() {
        let mut core = reader_core(FakeReader::default());
        let mut write_req = heapless::Vec::<u8, 64>::new();
        let _ = write_req.push(4); // block
        let _ = write_req.push(0); // key A
        let _ = write_req.extend_from_slice(&[0xFFu8; 6]); // key
        let _ = write_req.extend_from_slice(&[0x5A; 16]); // payload
        handle(&mut core, CMD_MF1_WRITE_BLOCK, &write_req).unwrap();

        let mut read_req = heapless::Vec::<u8, 64>::new();
        let _ = read_req.push(4);
        let _ = read_req.push(0);
        let _ = read_req.extend_from_slice(&[0xFFu8; 6]);
        let out = handle(&mut core, CMD_MF1_READ_BLOCK, &read_req).unwrap();
        assert_eq!(&out[..], &[0x5A; 16]);
    }

    #[test]
    fn mf1_read_block_reports_auth_fail_status() {
        let mut core = reader_core(FakeReader {
            auth_should_fail: true,
            ..Default::default()
        });
        let mut req = heapless::Vec::<u8, 64>::new();
        let _ = req.push(4);
        let _ = req.push(0);
        let _ = req.extend_from_slice(&[0xFFu8; 6]);
        let err = handle(&mut core, CMD_MF1_READ_BLOCK, &req).unwrap_err();
        assert_eq!(err, StatusCode::from(ReaderError::AuthFail));
    }

    #[test]
    fn hf14a_raw_round_trips_one_byte() {
        let mut core = reader_core(FakeReader::default());
        let out = handle(&mut core, CMD_HF14A_RAW, &[0, 0]).unwrap();
        assert_eq!(&out[..], &[0xAA]);
    }

    /// Antenna is claimed before and released after a command runs under
    /// the hooked entry point, regardless of the command's own outcome.
    #[test]
    fn handle_with_hooks_claims_and_releases_the_antenna() {
        let mut core = reader_core(FakeReader::default());
        handle_with_hooks(&mut core, CMD_HF14A_SCAN, &[]).unwrap();
        // Mode must be released back to `None` after the hook runs, or a
        // second reader command would see `ModeError::Busy`.
        assert!(core.mode.enter_reader().is_ok());
        core.mode.enter_none();
    }

    #[test]
    fn unknown_command_in_range_is_invalid() {
        let mut core = reader_core(FakeReader::default());
        let err = handle(&mut core, 2999, &[]).unwrap_err();
        assert_eq!(err, StatusCode::InvalidCmd);
    }
}
