//! MF0/NTAG command handling.

pub mod image;

use crate::error::ReaderError;
use image::{page_count, pwd_page, supports_get_version, version_bytes, MfuImage};

pub const CMD_GET_VERSION: u8 = 0x60;
pub const CMD_READ: u8 = 0x30;
pub const CMD_FAST_READ: u8 = 0x3A;
pub const CMD_WRITE: u8 = 0xA2;
pub const CMD_COMPAT_WRITE: u8 = 0xA0;
pub const CMD_READ_CNT: u8 = 0x39;
pub const CMD_INCR_CNT: u8 = 0xA5;
pub const CMD_PWD_AUTH: u8 = 0x1B;
pub const CMD_READ_SIG: u8 = 0x3C;

const COUNTER_MAX: u32 = 0x00FF_FFFF;

pub struct MfuTag {
    pub image: MfuImage,
    counters: [u32; 3],
    /// Set by a successful `PWD_AUTH`, cleared on HALT; gates the AUTH0
    /// boundary and the PWD/PACK page mask.
    pub authed: bool,
}

impl MfuTag {
    pub fn new(image: MfuImage) -> Self {
        Self {
            image,
            counters: [0; 3],
            authed: false,
        }
    }

    pub fn on_halt(&mut self) {
        self.authed = false;
    }

    /// `None` for types that predate `GET_VERSION` (plain MF0ICU1/ICU2);
    /// those NAK the command on real silicon.
    pub fn get_version(&self) -> Option<[u8; 8]> {
        if supports_get_version(self.image.specific) {
            Some(version_bytes(self.image.specific))
        } else {
            None
        }
    }

    /// Unauthenticated reads of pages at/beyond AUTH0 are refused unless
    /// `PROT` is clear or the session is UID-magic.
    fn read_guarded(&self, authed: bool) -> bool {
        self.image.config.auth_enabled
            && self.image.config.prot
            && !self.image.config.uid_magic
            && !authed
    }

    /// READ returns 4 pages (16 bytes) wrapping at the end of memory, with
    /// the trailing PACK page masked to its public half when password
    /// protection is enabled and not yet satisfied this session.
    pub fn read(&self, page: u8, authed: bool) -> Result<[u8; 16], ReaderError> {
        let guarded = self.read_guarded(authed);
        let mut out = [0u8; 16];
        for i in 0..4u8 {
            let p = (page as usize + i as usize) % self.image.page_count;
            if guarded && p as u8 >= self.image.config.auth0 {
                return Err(ReaderError::AuthFail);
            }
            let bytes = self.mask_page(p, authed);
            out[i as usize * 4..i as usize * 4 + 4].copy_from_slice(&bytes);
        }
        Ok(out)
    }

    pub fn fast_read(&self, start: u8, end: u8, authed: bool) -> Result<heapless::Vec<u8, 924>, ReaderError> {
        if end < start {
            return Err(ReaderError::Invalid);
        }
        let guarded = self.read_guarded(authed);
        let mut out = heapless::Vec::new();
        for p in start..=end {
            if guarded && p >= self.image.config.auth0 {
                return Err(ReaderError::AuthFail);
            }
            let bytes = self.mask_page(p as usize, authed);
            out.extend_from_slice(&bytes).map_err(|_| ReaderError::NoRoom)?;
        }
        Ok(out)
    }

    fn mask_page(&self, p: usize, authed: bool) -> [u8; 4] {
        let raw = self.image.page(p).copied().unwrap_or([0; 4]);
        if self.image.config.uid_magic || authed {
            return raw;
        }
        if let Some(pwd) = pwd_page(self.image.specific) {
            if (p == pwd || p == pwd + 1) && self.image.config.auth_enabled {
                return [0; 4]; // PWD and PACK pages never read back unauthenticated
            }
        }
        raw
    }

    pub fn write(&mut self, page: u8, data: [u8; 4]) -> Result<(), ReaderError> {
        if self.image.is_page_locked(page as usize) {
            return Err(ReaderError::AuthFail);
        }
        let slot = self.image.page_mut(page as usize).ok_or(ReaderError::Invalid)?;
        *slot = data;
        Ok(())
    }

    /// COMPAT_WRITE accepts a 16-byte MF1-style WRITE payload but only
    /// the first 4 bytes are committed
    pub fn compat_write(&mut self, page: u8, data: &[u8; 16]) -> Result<(), ReaderError> {
        let mut first4 = [0u8; 4];
        first4.copy_from_slice(&data[0..4]);
        self.write(page, first4)
    }

    pub fn read_counter(&self, counter: u8) -> Result<u32, ReaderError> {
        self.counters.get(counter as usize).copied().ok_or(ReaderError::Invalid)
    }

    pub fn increment_counter(&mut self, counter: u8, delta: u32) -> Result<u32, ReaderError> {
        let slot = self.counters.get_mut(counter as usize).ok_or(ReaderError::Invalid)?;
        *slot = (*slot + delta).min(COUNTER_MAX);
        Ok(*slot)
    }

    /// PWD_AUTH: returns PACK on success. Exceeding `AUTHLIM` permanently
    /// disables further authentication attempts, per NTAG213/215/216
    /// datasheets.
    pub fn pwd_auth(&mut self, pwd: [u8; 4]) -> Result<[u8; 2], ReaderError> {
        let limit = self.image.config.auth_limit;
        if limit != 0 && self.image.auth_fail_count >= limit {
            return Err(ReaderError::AuthFail);
        }
        let pwd_idx = pwd_page(self.image.specific).ok_or(ReaderError::Invalid)?;
        let stored = self.image.page(pwd_idx).copied().unwrap_or([0xFF; 4]);
        if stored == pwd {
            self.image.auth_fail_count = 0;
            self.authed = true;
            let pack_page = self.image.page(pwd_idx + 1).copied().unwrap_or([0; 4]);
            Ok([pack_page[0], pack_page[1]])
        } else {
            self.image.auth_fail_count = self.image.auth_fail_count.saturating_add(1);
            Err(ReaderError::AuthFail)
        }
    }

    pub fn read_signature(&self) -> [u8; 32] {
        // Originality-signature pages aren't modeled per-byte; a fixed
        // all-zero signature is returned, matching an unprovisioned clone.
        [0; 32]
    }

    pub fn page_count(&self) -> usize {
        page_count(self.image.specific)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagtypes::TagSpecific;

    #[test]
    fn increment_counter_saturates() {
        let mut tag = MfuTag::new(MfuImage::blank(TagSpecific::Ntag213));
        tag.increment_counter(0, COUNTER_MAX).unwrap();
        let v = tag.increment_counter(0, 10).unwrap();
        assert_eq!(v, COUNTER_MAX);
    }

    #[test]
    fn pwd_auth_locks_after_limit() {
        let mut image = MfuImage::blank(TagSpecific::Ntag213);
        image.config.auth_enabled = true;
        image.config.auth_limit = 2;
        let mut tag = MfuTag::new(image);
        assert!(tag.pwd_auth([0, 0, 0, 0]).is_err());
        assert!(tag.pwd_auth([0, 0, 0, 0]).is_err());
        assert!(tag.pwd_auth([0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn correct_pwd_returns_pack() {
        let image = MfuImage::blank(TagSpecific::Ntag213);
        let mut tag = MfuTag::new(image);
        let pack = tag.pwd_auth([0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(pack, [0, 0]);
    }

    #[test]
    fn correct_pwd_marks_session_authed_until_halt() {
        let image = MfuImage::blank(TagSpecific::Ntag213);
        let mut tag = MfuTag::new(image);
        assert!(!tag.authed);
        tag.pwd_auth([0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert!(tag.authed);
        tag.on_halt();
        assert!(!tag.authed);
    }

    #[test]
    fn unauthed_read_past_auth0_is_refused_when_prot_set() {
        let mut image = MfuImage::blank(TagSpecific::Ntag213);
        image.config.auth_enabled = true;
        image.config.auth0 = 4;
        image.config.prot = true;
        let tag = MfuTag::new(image);
        assert!(tag.read(4, false).is_err());
        assert!(tag.read(0, false).is_ok());
    }

    #[test]
    fn unauthed_read_past_auth0_allowed_read_only_when_prot_clear() {
        let mut image = MfuImage::blank(TagSpecific::Ntag213);
        image.config.auth_enabled = true;
        image.config.auth0 = 4;
        image.config.prot = false;
        let tag = MfuTag::new(image);
        assert!(tag.read(4, false).is_ok());
    }

    #[test]
    fn uid_magic_bypasses_auth0_and_page_masking() {
        let mut image = MfuImage::blank(TagSpecific::Ntag213);
        image.config.auth_enabled = true;
        image.config.auth0 = 0;
        image.config.prot = true;
        image.config.uid_magic = true;
        let pwd = pwd_page(TagSpecific::Ntag213).unwrap();
        let tag = MfuTag::new(image);
        let page = tag.read(pwd as u8, false).unwrap();
        assert_eq!(&page[0..4], &[0xFF; 4]);
    }

    #[test]
    fn pwd_and_pack_pages_are_masked_to_zero_unauthenticated() {
        let mut image = MfuImage::blank(TagSpecific::Ntag213);
        image.config.auth_enabled = true;
        let pwd = pwd_page(TagSpecific::Ntag213).unwrap();
        let tag = MfuTag::new(image);
        let page = tag.read(pwd as u8, false).unwrap();
        assert_eq!(&page[0..4], &[0; 4]); // PWD
        assert_eq!(&page[4..8], &[0; 4]); // PACK
    }

    #[test]
    fn get_version_only_replies_for_ev1_and_ntag21x() {
        assert!(MfuTag::new(MfuImage::blank(TagSpecific::Ntag213)).get_version().is_some());
        assert!(MfuTag::new(MfuImage::blank(TagSpecific::Mf0Ul11)).get_version().is_some());
        assert!(MfuTag::new(MfuImage::blank(TagSpecific::Mf0Icu1)).get_version().is_none());
    }
}
