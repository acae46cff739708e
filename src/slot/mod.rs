//! Slot model & persistence.
//!
//! Eight independently-configured {LF, HF} tag slots, persisted through the
//! `persist::KvStore` collaborator with a CRC-gated write pattern: recompute
//! the CRC of the in-memory blob, write only on mismatch, then cache the
//! new CRC so the next save is a no-op unless something actually changed.

use crate::error::FlashError;
use crate::lf::{em410x, viking};
use crate::persist::{ids, write_retrying_gc, KvStore};
use crate::tagtypes::{SenseType, TagSpecific};

pub const SLOT_COUNT: usize = 8;
pub const LF_BUF_LEN: usize = 12;
pub const HF_BUF_LEN: usize = 4096;

pub const SLOT_CONFIG_VERSION: u8 = 8;

const CRC16: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_XMODEM);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// A CRC-gated byte buffer, generic over capacity: the LF (12-byte) and HF
/// (4096-byte, rounded up to a page-friendly size) buffers are both
/// instances of this with different `N`.
pub struct TagBuffer<const N: usize> {
    pub len: usize,
    pub data: [u8; N],
    cached_crc: u16,
}

impl<const N: usize> Default for TagBuffer<N> {
    fn default() -> Self {
        Self {
            len: 0,
            data: [0; N],
            cached_crc: 0,
        }
    }
}

impl<const N: usize> TagBuffer<N> {
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn load_from(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(N);
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
        self.mark_clean();
    }

    pub fn dirty(&self) -> bool {
        crc16(self.as_slice()) != self.cached_crc
    }

    pub fn mark_clean(&mut self) {
        self.cached_crc = crc16(self.as_slice());
    }
}

/// One of the eight configurable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub enabled_hf: bool,
    pub enabled_lf: bool,
    pub tag_hf: TagSpecific,
    pub tag_lf: TagSpecific,
}

impl Slot {
    pub const fn empty() -> Self {
        Self {
            enabled_hf: false,
            enabled_lf: false,
            tag_hf: TagSpecific::Undefined,
            tag_lf: TagSpecific::Undefined,
        }
    }

    /// Enforces invariant P1: `enabled[s] == true ⇒ tag[s] != Undefined`.
    fn normalize(&mut self) {
        if self.tag_hf == TagSpecific::Undefined {
            self.enabled_hf = false;
        }
        if self.tag_lf == TagSpecific::Undefined {
            self.enabled_lf = false;
        }
    }

    pub fn set_enable(&mut self, sense: SenseType, enable: bool) {
        match sense {
            SenseType::Hf => self.enabled_hf = enable,
            SenseType::Lf => self.enabled_lf = enable,
            SenseType::None => {}
        }
        self.normalize();
    }

    pub fn set_type(&mut self, specific: TagSpecific) {
        match specific.sense() {
            SenseType::Hf => self.tag_hf = specific,
            SenseType::Lf => self.tag_lf = specific,
            SenseType::None => {}
        }
        self.normalize();
    }

    pub fn clear(&mut self, sense: SenseType) {
        match sense {
            SenseType::Hf => {
                self.tag_hf = TagSpecific::Undefined;
                self.enabled_hf = false;
            }
            SenseType::Lf => {
                self.tag_lf = TagSpecific::Undefined;
                self.enabled_lf = false;
            }
            SenseType::None => {}
        }
    }

    fn default_factory() -> Self {
        let mut s = Self::empty();
        s.set_type(TagSpecific::Em410x);
        s.set_enable(SenseType::Lf, true);
        s
    }
}

pub struct SlotConfig {
    pub version: u8,
    pub slots: [Slot; SLOT_COUNT],
    pub active: u8,
}

impl Default for SlotConfig {
    fn default() -> Self {
        let mut slots = [Slot::empty(); SLOT_COUNT];
        // Slot 0 ships as EM410x enabled init() default.
        slots[0] = Slot::default_factory();
        Self {
            version: SLOT_CONFIG_VERSION,
            slots,
            active: 0,
        }
    }
}

impl SlotConfig {
    const PACKED_LEN: usize = 1 + 1 + SLOT_COUNT * 4;

    fn to_bytes(&self) -> [u8; Self::PACKED_LEN] {
        let mut out = [0u8; Self::PACKED_LEN];
        out[0] = self.version;
        out[1] = self.active;
        for (i, slot) in self.slots.iter().enumerate() {
            let base = 2 + i * 4;
            out[base] = slot.enabled_hf as u8;
            out[base + 1] = slot.enabled_lf as u8;
            out[base + 2] = slot.tag_hf.to_u8();
            out[base + 3] = slot.tag_lf.to_u8();
        }
        out
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut cfg = Self::default();
        if buf.len() < 2 {
            return cfg;
        }
        let version = buf[0];
        cfg.active = buf[1].min(SLOT_COUNT as u8 - 1);
        for i in 0..SLOT_COUNT {
            let base = 2 + i * 4;
            if base + 3 >= buf.len() {
                break;
            }
            let hf = TagSpecific::from_u8(buf[base + 2]).unwrap_or(TagSpecific::Undefined);
            let lf = TagSpecific::from_u8(buf[base + 3]).unwrap_or(TagSpecific::Undefined);
            let mut slot = Slot {
                enabled_hf: buf[base] != 0,
                enabled_lf: buf[base + 1] != 0,
                tag_hf: hf,
                tag_lf: lf,
            };
            slot.normalize();
            cfg.slots[i] = slot;
        }
        cfg.version = migrate_version(version);
        cfg
    }
}

/// Older on-flash layouts (v0..v7) migrate forward to v8 unchanged in
/// meaning; the packed layout above has been stable since v0 in this
/// reimplementation, so migration is a version-stamp bump plus rewrite.
fn migrate_version(stored: u8) -> u8 {
    SLOT_CONFIG_VERSION.max(stored).min(SLOT_CONFIG_VERSION)
}

pub struct SlotManager {
    pub config: SlotConfig,
    pub lf_buf: TagBuffer<LF_BUF_LEN>,
    pub hf_buf: TagBuffer<HF_BUF_LEN>,
    config_cached_crc: u16,
}

impl SlotManager {
    pub fn init<S: KvStore>(store: &mut S) -> Self {
        let mut buf = [0u8; SlotConfig::PACKED_LEN];
        let (config, needs_rewrite) =
            match store.read(ids::SLOT_CONFIG_ID, ids::SLOT_CONFIG_KEY, &mut buf) {
                Some(n) => {
                    let cfg = SlotConfig::from_bytes(&buf[..n]);
                    let needs_rewrite = cfg.version != SLOT_CONFIG_VERSION || n < SlotConfig::PACKED_LEN;
                    (cfg, needs_rewrite)
                }
                None => (SlotConfig::default(), true),
            };

        let mut mgr = Self {
            config_cached_crc: 0,
            config,
            lf_buf: TagBuffer::default(),
            hf_buf: TagBuffer::default(),
        };
        mgr.load_active_buffers(store);
        if needs_rewrite {
            let _ = mgr.save(store);
        } else {
            mgr.config_cached_crc = crc16(&mgr.config.to_bytes());
        }
        mgr
    }

    fn active(&self) -> &Slot {
        &self.config.slots[self.config.active as usize]
    }

    fn dump_record_key(specific: TagSpecific) -> u16 {
        match specific.sense() {
            SenseType::Hf => ids::SENSE_KEY_HF,
            SenseType::Lf => ids::SENSE_KEY_LF,
            SenseType::None => 0,
        }
    }

    fn load_active_buffers<S: KvStore>(&mut self, store: &mut S) {
        let slot_idx = self.config.active;
        let active = self.config.slots[slot_idx as usize];

        let mut hf_scratch = [0u8; HF_BUF_LEN];
        match store.read(
            ids::DUMP_ID_BASE + slot_idx as u16,
            Self::dump_record_key(active.tag_hf),
            &mut hf_scratch,
        ) {
            Some(n) => self.hf_buf.load_from(&hf_scratch[..n]),
            None => self.factory_fill_hf(active.tag_hf),
        }

        let mut lf_scratch = [0u8; LF_BUF_LEN];
        match store.read(
            ids::DUMP_ID_BASE + slot_idx as u16,
            Self::dump_record_key(active.tag_lf),
            &mut lf_scratch,
        ) {
            Some(n) => self.lf_buf.load_from(&lf_scratch[..n]),
            None => self.factory_fill_lf(active.tag_lf),
        }
    }

    fn factory_fill_hf(&mut self, specific: TagSpecific) {
        let bytes = crate::hf::factory_default_bytes(specific);
        self.hf_buf.load_from(&bytes);
    }

    fn factory_fill_lf(&mut self, specific: TagSpecific) {
        match specific {
            TagSpecific::Em410x => self.lf_buf.load_from(&em410x::DEFAULT_ID),
            TagSpecific::Viking => self.lf_buf.load_from(&viking::DEFAULT_ID),
            _ => self.lf_buf.load_from(&[]),
        }
    }

    /// CRC-gated flush of `{SlotConfig, LF buffer, HF buffer}`.
    pub fn save<S: KvStore>(&mut self, store: &mut S) -> Result<(), FlashError> {
        let cfg_bytes = self.config.to_bytes();
        let cfg_crc = crc16(&cfg_bytes);
        if cfg_crc != self.config_cached_crc {
            write_retrying_gc(store, ids::SLOT_CONFIG_ID, ids::SLOT_CONFIG_KEY, &cfg_bytes)?;
            self.config_cached_crc = cfg_crc;
        }

        let slot_idx = self.config.active;
        let active = self.config.slots[slot_idx as usize];

        if self.hf_buf.dirty() && active.tag_hf != TagSpecific::Undefined {
            write_retrying_gc(
                store,
                ids::DUMP_ID_BASE + slot_idx as u16,
                Self::dump_record_key(active.tag_hf),
                self.hf_buf.as_slice(),
            )?;
            self.hf_buf.mark_clean();
        }

        if self.lf_buf.dirty() && active.tag_lf != TagSpecific::Undefined {
            write_retrying_gc(
                store,
                ids::DUMP_ID_BASE + slot_idx as u16,
                Self::dump_record_key(active.tag_lf),
                self.lf_buf.as_slice(),
            )?;
            self.lf_buf.mark_clean();
        }

        Ok(())
    }

    pub fn sense_enabled(&self, sense: SenseType) -> bool {
        let slot = self.active();
        match sense {
            SenseType::Hf => slot.enabled_hf && slot.tag_hf != TagSpecific::Undefined,
            SenseType::Lf => slot.enabled_lf && slot.tag_lf != TagSpecific::Undefined,
            SenseType::None => false,
        }
    }

    pub fn find_next(&self, from: u8) -> u8 {
        for step in 1..=SLOT_COUNT {
            let i = (from as usize + step) % SLOT_COUNT;
            let s = &self.config.slots[i];
            if s.enabled_hf || s.enabled_lf {
                return i as u8;
            }
        }
        from
    }

    pub fn find_prev(&self, from: u8) -> u8 {
        for step in 1..=SLOT_COUNT {
            let i = (from as usize + SLOT_COUNT - step) % SLOT_COUNT;
            let s = &self.config.slots[i];
            if s.enabled_hf || s.enabled_lf {
                return i as u8;
            }
        }
        from
    }
}

impl SlotManager {
    /// `with_sense_disable` is honored by the caller (mode controller / main
    /// loop): it stops HF/LF sense before the swap and restarts it after,
    /// since buffer ownership must not move while a sense ISR could still be
    /// reading the old slot's buffer.
    pub fn change_slot<S: KvStore>(
        &mut self,
        store: &mut S,
        i: u8,
        with_sense_disable: bool,
    ) -> Result<(), FlashError> {
        let _ = with_sense_disable;
        self.save(store)?;
        self.config.active = i.min(SLOT_COUNT as u8 - 1);
        self.load_active_buffers(store);
        Ok(())
    }

    pub fn slot_set_enable<S: KvStore>(
        &mut self,
        store: &mut S,
        i: u8,
        sense: SenseType,
        enable: bool,
    ) -> Result<(), FlashError> {
        self.config.slots[i as usize].set_enable(sense, enable);
        self.save(store)
    }

    pub fn delete_data<S: KvStore>(
        &mut self,
        store: &mut S,
        i: u8,
        sense: SenseType,
    ) -> Result<(), FlashError> {
        let specific = match sense {
            SenseType::Hf => self.config.slots[i as usize].tag_hf,
            SenseType::Lf => self.config.slots[i as usize].tag_lf,
            SenseType::None => TagSpecific::Undefined,
        };
        store.delete(ids::DUMP_ID_BASE + i as u16, Self::dump_record_key(specific));
        self.config.slots[i as usize].clear(sense);
        self.save(store)?;
        if i == self.config.active {
            self.load_active_buffers(store);
        }
        Ok(())
    }

    pub fn change_type<S: KvStore>(
        &mut self,
        store: &mut S,
        i: u8,
        specific: TagSpecific,
    ) -> Result<(), FlashError> {
        self.config.slots[i as usize].set_type(specific);
        self.save(store)?;
        if i == self.config.active {
            self.load_active_buffers(store);
        }
        Ok(())
    }

    pub fn factory_data<S: KvStore>(
        &mut self,
        store: &mut S,
        i: u8,
        specific: TagSpecific,
    ) -> bool {
        let record_key = Self::dump_record_key(specific);
        let ok = match specific.sense() {
            SenseType::Hf => {
                let bytes = crate::hf::factory_default_bytes(specific);
                write_retrying_gc(store, ids::DUMP_ID_BASE + i as u16, record_key, &bytes).is_ok()
            }
            SenseType::Lf => {
                let bytes: &[u8] = match specific {
                    TagSpecific::Em410x => &em410x::DEFAULT_ID,
                    TagSpecific::Viking => &viking::DEFAULT_ID,
                    _ => &[],
                };
                write_retrying_gc(store, ids::DUMP_ID_BASE + i as u16, record_key, bytes).is_ok()
            }
            SenseType::None => false,
        };
        if ok && i == self.config.active {
            self.load_active_buffers(store);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::mock::MockStore;

    #[test]
    fn slot_normalize_enforces_p1() {
        let mut slot = Slot::empty();
        slot.enabled_hf = true;
        slot.normalize();
        assert!(!slot.enabled_hf, "P1: enabled must imply tag != Undefined");

        slot.set_type(TagSpecific::Mifare1K);
        slot.set_enable(SenseType::Hf, true);
        assert!(slot.enabled_hf);

        slot.clear(SenseType::Hf);
        assert!(!slot.enabled_hf);
        assert_eq!(slot.tag_hf, TagSpecific::Undefined);
    }

    #[test]
    fn default_config_satisfies_p1_for_every_slot() {
        let cfg = SlotConfig::default();
        for slot in &cfg.slots {
            if slot.enabled_hf {
                assert_ne!(slot.tag_hf, TagSpecific::Undefined);
            }
            if slot.enabled_lf {
                assert_ne!(slot.tag_lf, TagSpecific::Undefined);
            }
        }
    }

    #[test]
    fn slot_config_round_trips_through_bytes() {
        let mut cfg = SlotConfig::default();
        cfg.active = 3;
        cfg.slots[1].set_type(TagSpecific::Mifare1K);
        cfg.slots[1].set_enable(SenseType::Hf, true);
        cfg.slots[2].set_type(TagSpecific::Ntag213);
        cfg.slots[2].set_enable(SenseType::Hf, true);

        let bytes = cfg.to_bytes();
        let restored = SlotConfig::from_bytes(&bytes);

        assert_eq!(restored.active, cfg.active);
        for i in 0..SLOT_COUNT {
            assert_eq!(restored.slots[i], cfg.slots[i]);
        }
        assert_eq!(restored.version, SLOT_CONFIG_VERSION);
    }

    #[test]
    fn older_version_migrates_forward_to_current() {
        let cfg = SlotConfig::default();
        let mut bytes = cfg.to_bytes();
        bytes[0] = 3; // simulate a v3 on-flash blob
        let restored = SlotConfig::from_bytes(&bytes);
        assert_eq!(restored.version, SLOT_CONFIG_VERSION);
    }

    /// P2: save(); load() = identity on the persisted `SlotConfig`.
    #[test]
    fn save_then_reinit_is_identity() {
        let mut store = MockStore::default();
        let mut mgr = SlotManager::init(&mut store);
        mgr.change_type(&mut store, 1, TagSpecific::Mifare1K).unwrap();
        mgr.slot_set_enable(&mut store, 1, SenseType::Hf, true).unwrap();
        mgr.change_slot(&mut store, 1, false).unwrap();
        mgr.save(&mut store).unwrap();

        let reloaded = SlotManager::init(&mut store);
        assert_eq!(reloaded.config.active, mgr.config.active);
        for i in 0..SLOT_COUNT {
            assert_eq!(reloaded.config.slots[i], mgr.config.slots[i]);
        }
    }

    #[test]
    fn save_is_crc_gated_and_skips_unchanged_writes() {
        let mut store = MockStore::default();
        let mut mgr = SlotManager::init(&mut store);
        mgr.save(&mut store).unwrap();

        // Nothing changed since init's own save; a second save must not
        // need to write anything even if the store would now fail writes.
        store.fail_writes_until_gc = usize::MAX;
        assert!(mgr.save(&mut store).is_ok());
    }

    #[test]
    fn change_slot_switches_active_and_reloads_buffers() {
        let mut store = MockStore::default();
        let mut mgr = SlotManager::init(&mut store);
        mgr.change_type(&mut store, 2, TagSpecific::Em410x).unwrap();
        mgr.slot_set_enable(&mut store, 2, SenseType::Lf, true).unwrap();

        mgr.change_slot(&mut store, 2, true).unwrap();
        assert_eq!(mgr.config.active, 2);
        assert_eq!(mgr.lf_buf.as_slice(), &em410x::DEFAULT_ID);
    }

    #[test]
    fn delete_data_clears_type_and_disables() {
        let mut store = MockStore::default();
        let mut mgr = SlotManager::init(&mut store);
        mgr.delete_data(&mut store, 0, SenseType::Lf).unwrap();
        assert_eq!(mgr.config.slots[0].tag_lf, TagSpecific::Undefined);
        assert!(!mgr.config.slots[0].enabled_lf);
    }

    #[test]
    fn find_next_and_prev_wrap_circularly_over_enabled_slots() {
        let mut store = MockStore::default();
        let mut mgr = SlotManager::init(&mut store);
        // Only slot 0 is enabled by default (factory default).
        assert_eq!(mgr.find_next(0), 0);
        assert_eq!(mgr.find_prev(0), 0);

        mgr.change_type(&mut store, 5, TagSpecific::Viking).unwrap();
        mgr.slot_set_enable(&mut store, 5, SenseType::Lf, true).unwrap();

        assert_eq!(mgr.find_next(0), 5);
        assert_eq!(mgr.find_prev(0), 5);
        assert_eq!(mgr.find_next(5), 0);
    }

    #[test]
    fn tag_buffer_dirty_tracks_crc_of_contents() {
        let mut buf: TagBuffer<LF_BUF_LEN> = TagBuffer::default();
        buf.load_from(&em410x::DEFAULT_ID);
        assert!(!buf.dirty());
        buf.as_mut_slice()[0] ^= 0xFF;
        assert!(buf.dirty());
        buf.mark_clean();
        assert!(!buf.dirty());
    }
}
