//! MF0/NTAG slot image: page-addressed memory plus per-type page counts
//! and lock-byte layout.

use crate::tagtypes::TagSpecific;

pub const MAX_PAGES: usize = 231; // NTAG216 user+config+lock, rounded up

pub fn page_count(specific: TagSpecific) -> usize {
    match specific {
        TagSpecific::Mf0Icu1 => 16,
        TagSpecific::Mf0Icu2 | TagSpecific::Mf0Ul11 => 41,
        TagSpecific::Mf0Ul21 => 41,
        TagSpecific::Ntag210 => 20,
        TagSpecific::Ntag212 => 41,
        TagSpecific::Ntag213 => 45,
        TagSpecific::Ntag215 => 135,
        TagSpecific::Ntag216 => 231,
        _ => 16,
    }
}

/// Page index of the one-way PWD/PACK pair, per sub-type. NTAG: last two
/// pages are `PWD(4)` then `PACK(2)+RFUI(2)`. Mifare Ultralight EV1/C lacks
/// password protection in the base variants modeled here (pages beyond
/// user memory are reserved/lock only).
pub fn pwd_page(specific: TagSpecific) -> Option<usize> {
    let pages = page_count(specific);
    match specific {
        TagSpecific::Ntag210
        | TagSpecific::Ntag212
        | TagSpecific::Ntag213
        | TagSpecific::Ntag215
        | TagSpecific::Ntag216 => Some(pages - 2),
        _ => None,
    }
}

pub fn version_bytes(specific: TagSpecific) -> [u8; 8] {
    // Fixed per NXP GET_VERSION response layout: header, vendor, product
    // type/subtype, major/minor, storage size (log2, rounded), protocol.
    let storage_size_code: u8 = match specific {
        TagSpecific::Mf0Icu1 => 0x0B,
        TagSpecific::Mf0Icu2 | TagSpecific::Mf0Ul11 | TagSpecific::Mf0Ul21 => 0x0B,
        TagSpecific::Ntag210 => 0x0B,
        TagSpecific::Ntag212 => 0x0E,
        TagSpecific::Ntag213 => 0x0F,
        TagSpecific::Ntag215 => 0x11,
        TagSpecific::Ntag216 => 0x13,
        _ => 0x0B,
    };
    [0x00, 0x04, 0x04, 0x02, 0x01, 0x00, storage_size_code, 0x03]
}

/// Types that actually answer `GET_VERSION` on real silicon: the
/// Ultralight EV1 family and the NTAG21x family. Plain MF0ICU1/ICU2
/// predate the command and NAK it.
pub fn supports_get_version(specific: TagSpecific) -> bool {
    matches!(
        specific,
        TagSpecific::Mf0Ul11
            | TagSpecific::Mf0Ul21
            | TagSpecific::Ntag210
            | TagSpecific::Ntag212
            | TagSpecific::Ntag213
            | TagSpecific::Ntag215
            | TagSpecific::Ntag216
    )
}

#[derive(Debug, Clone, Copy)]
pub struct MfuConfig {
    pub auth_enabled: bool,
    pub auth_limit: u8,
    /// First page guarded by password protection; pages at or beyond this
    /// index are covered by `prot`. 0xFF (the default) means "no page is
    /// beyond it", i.e. protection effectively disabled.
    pub auth0: u8,
    /// When set, pages at/beyond `auth0` refuse unauthenticated reads too;
    /// when clear, unauthenticated reads of those pages are still allowed
    /// (only writes are gated) per the NTAG `ACCESS.PROT` bit.
    pub prot: bool,
    /// UID-magic mode: bypasses AUTH0/PROT and PWD/PACK masking entirely,
    /// mirroring the MF1 Gen1a/Gen2 back doors for UL/NTAG clones.
    pub uid_magic: bool,
}

impl Default for MfuConfig {
    fn default() -> Self {
        Self {
            auth_enabled: false,
            auth_limit: 0,
            auth0: 0xFF,
            prot: false,
            uid_magic: false,
        }
    }
}

pub struct MfuImage {
    pub specific: TagSpecific,
    pub page_count: usize,
    pub pages: [[u8; 4]; MAX_PAGES],
    pub config: MfuConfig,
    pub auth_fail_count: u8,
}

impl MfuImage {
    pub fn blank(specific: TagSpecific) -> Self {
        let count = page_count(specific);
        let mut img = Self {
            specific,
            page_count: count,
            pages: [[0u8; 4]; MAX_PAGES],
            config: MfuConfig::default(),
            auth_fail_count: 0,
        };
        // Page 2: lock bytes default to unlocked; page 3 (OTP) zeroed.
        // Pages 0-1 carry UID/BCC, filled in by the caller from the slot's
        // 14A snapshot rather than here.
        if let Some(pwd) = pwd_page(specific) {
            img.pages[pwd] = [0xFF; 4];
            img.pages[pwd + 1] = [0x00, 0x00, 0x00, 0x00];
        }
        img
    }

    pub fn page(&self, idx: usize) -> Option<&[u8; 4]> {
        self.pages.get(idx).filter(|_| idx < self.page_count)
    }

    pub fn page_mut(&mut self, idx: usize) -> Option<&mut [u8; 4]> {
        if idx < self.page_count {
            self.pages.get_mut(idx)
        } else {
            None
        }
    }

    pub fn lock_bytes(&self) -> [u8; 2] {
        [self.pages[2][2], self.pages[2][3]]
    }

    pub fn is_page_locked(&self, page: usize) -> bool {
        // Static lock bytes (page 2, bytes 2-3) cover pages 3..15 for the
        // smallest variants. NTAG dynamic lock bits (extra pages) are an
        // explicit open question; we apply only the static bits,
        // which is correct for MF0ICU1/UL and a conservative subset for NTAG.
        if !(3..16).contains(&page) {
            return false;
        }
        let lock = self.lock_bytes();
        let bit = page - 2;
        if bit < 8 {
            lock[1] & (1 << bit) != 0
        } else {
            lock[0] & (1 << (bit - 8)) != 0
        }
    }

    pub fn to_bytes(&self, out: &mut [u8]) -> usize {
        out[0] = self.config.auth_enabled as u8;
        out[1] = self.config.auth_limit;
        out[2] = self.auth_fail_count;
        out[3] = self.config.auth0;
        out[4] = (self.config.prot as u8) | ((self.config.uid_magic as u8) << 1);
        let mut off = 5;
        for p in 0..self.page_count {
            out[off..off + 4].copy_from_slice(&self.pages[p]);
            off += 4;
        }
        off
    }

    pub fn load_from_bytes(&mut self, buf: &[u8]) {
        if buf.len() < 5 {
            return;
        }
        self.config.auth_enabled = buf[0] != 0;
        self.config.auth_limit = buf[1];
        self.auth_fail_count = buf[2];
        self.config.auth0 = buf[3];
        self.config.prot = buf[4] & 0x01 != 0;
        self.config.uid_magic = buf[4] & 0x02 != 0;
        let mut off = 5;
        for p in 0..self.page_count {
            if off + 4 > buf.len() {
                break;
            }
            self.pages[p].copy_from_slice(&buf[off..off + 4]);
            off += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_matches_known_subtypes() {
        assert_eq!(page_count(TagSpecific::Mf0Icu1), 16);
        assert_eq!(page_count(TagSpecific::Ntag213), 45);
        assert_eq!(page_count(TagSpecific::Ntag215), 135);
        assert_eq!(page_count(TagSpecific::Ntag216), 231);
    }

    #[test]
    fn pwd_page_only_exists_on_ntag_variants() {
        assert_eq!(pwd_page(TagSpecific::Mf0Icu1), None);
        assert_eq!(pwd_page(TagSpecific::Mf0Ul11), None);
        assert_eq!(pwd_page(TagSpecific::Ntag213), Some(page_count(TagSpecific::Ntag213) - 2));
    }

    #[test]
    fn blank_ntag_fills_default_pwd_and_pack() {
        let img = MfuImage::blank(TagSpecific::Ntag213);
        let pwd = pwd_page(TagSpecific::Ntag213).unwrap();
        assert_eq!(img.pages[pwd], [0xFF; 4]);
        assert_eq!(img.pages[pwd + 1], [0, 0, 0, 0]);
    }

    #[test]
    fn version_bytes_encode_per_subtype_storage_size() {
        assert_eq!(version_bytes(TagSpecific::Ntag213)[6], 0x0F);
        assert_eq!(version_bytes(TagSpecific::Ntag216)[6], 0x13);
    }

    #[test]
    fn static_lock_bits_gate_only_pages_three_through_fifteen() {
        let mut img = MfuImage::blank(TagSpecific::Mf0Icu1);
        assert!(!img.is_page_locked(3));
        assert!(!img.is_page_locked(16));
        // bit for page 3 lives in lock[1] bit 1 (bit = page - 2 = 1).
        img.pages[2][3] = 0b0000_0010;
        assert!(img.is_page_locked(3));
        assert!(!img.is_page_locked(4));
    }

    #[test]
    fn dynamic_ntag_config_pages_are_not_lock_gated() {
        // Documented scope: only the static lock byte range (3..16) is
        // checked; NTAG's extra dynamic lock page is left unenforced.
        let mut img = MfuImage::blank(TagSpecific::Ntag213);
        img.pages[2][3] = 0xFF;
        img.pages[2][2] = 0xFF;
        assert!(!img.is_page_locked(40));
    }

    #[test]
    fn to_bytes_then_load_from_bytes_round_trips() {
        let mut img = MfuImage::blank(TagSpecific::Ntag213);
        img.config.auth_enabled = true;
        img.config.auth_limit = 5;
        img.auth_fail_count = 2;
        *img.page_mut(4).unwrap() = [0xAA, 0xBB, 0xCC, 0xDD];

        let mut buf = [0u8; 5 + MAX_PAGES * 4];
        let n = img.to_bytes(&mut buf);

        let mut restored = MfuImage::blank(TagSpecific::Ntag213);
        restored.load_from_bytes(&buf[..n]);

        assert_eq!(restored.config.auth_enabled, true);
        assert_eq!(restored.config.auth_limit, 5);
        assert_eq!(restored.auth_fail_count, 2);
        assert_eq!(restored.page(4), Some(&[0xAA, 0xBB, 0xCC, 0xDD]));
    }

    #[test]
    fn page_access_is_bounded_by_page_count() {
        let img = MfuImage::blank(TagSpecific::Mf0Icu1);
        assert!(img.page(15).is_some());
        assert!(img.page(16).is_none());
    }
}
