//! HF (13.56 MHz ISO/IEC 14443-A) subsystem: reader (PCD), tag emulation
//! (PICC), MIFARE Classic and Ultralight/NTAG logic, and the Crypto1
//! attack toolbox.

pub mod mf1;
pub mod mfu;
pub mod pcd;
pub mod picc;
pub mod tag14a;
pub mod toolbox;

use crate::tagtypes::TagSpecific;

const HF_BUF_LEN_CONST: usize = crate::slot::HF_BUF_LEN;

/// Factory-default HF dump bytes for a given tag type, used by slot
/// `factory_data`/cold-start fill. Delegates to each type's own image
/// serializer so the on-flash layout stays a single source of truth.
pub fn factory_default_bytes(specific: TagSpecific) -> heapless::Vec<u8, HF_BUF_LEN_CONST> {
    let mut out = heapless::Vec::new();
    out.resize_default(crate::slot::HF_BUF_LEN).ok();

    if specific.is_mf1() {
        let mut image = mf1::image::Mf1Image::blank(specific);
        // Block 0 carries the UID on a real card; a freshly-minted slot
        // gets a fixed placeholder until "set anti-collision data" writes
        // a real one.
        if let Some(block0) = image.block_mut(0) {
            block0[0..4].copy_from_slice(&DEFAULT_EMU_UID4);
            block0[4] = 0x88 ^ DEFAULT_EMU_UID4[0] ^ DEFAULT_EMU_UID4[1] ^ DEFAULT_EMU_UID4[2] ^ DEFAULT_EMU_UID4[3];
        }
        let n = image.to_bytes(&mut out);
        out.truncate(n);
    } else if specific.is_mfu() {
        let mut image = mfu::image::MfuImage::blank(specific);
        fill_default_mfu_uid(&mut image);
        let n = image.to_bytes(&mut out);
        out.truncate(n);
    } else {
        out.clear();
    }
    out
}

/// Placeholder 4-byte UID used until a slot's anti-collision data is set
/// explicitly (dispatcher command `MF1_SET_ANTI_COLLISION_DATA`).
pub const DEFAULT_EMU_UID4: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Fills pages 0-1 with a default 7-byte cascade-level-2 UID, computing
/// `BCC0 = CT ^ UID0 ^ UID1 ^ UID2` per ISO/IEC 14443-3.
pub fn fill_default_mfu_uid(image: &mut mfu::image::MfuImage) {
    const CT: u8 = 0x88;
    let uid: [u8; 7] = [0x04, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];
    if let Some(p0) = image.page_mut(0) {
        *p0 = [uid[0], uid[1], uid[2], CT ^ uid[0] ^ uid[1] ^ uid[2]];
    }
    if let Some(p1) = image.page_mut(1) {
        *p1 = [uid[3], uid[4], uid[5], uid[6]];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_default_bytes_for_mf1_carries_placeholder_uid_in_block0() {
        let bytes = factory_default_bytes(TagSpecific::Mifare1K);
        assert_eq!(&bytes[0..4], &DEFAULT_EMU_UID4);
        assert_eq!(bytes[4], 0x88 ^ 0xDE ^ 0xAD ^ 0xBE ^ 0xEF);
    }

    #[test]
    fn factory_default_bytes_for_mfu_carries_default_uid_across_pages_0_and_1() {
        let bytes = factory_default_bytes(TagSpecific::Ntag213);
        assert_eq!(&bytes[0..3], &[0x04, 0x12, 0x34]);
        assert_eq!(bytes[3], 0x88 ^ 0x04 ^ 0x12 ^ 0x34);
        assert_eq!(&bytes[4..8], &[0x56, 0x78, 0x9A, 0xBC]);
    }

    #[test]
    fn factory_default_bytes_for_undefined_type_is_empty() {
        let bytes = factory_default_bytes(TagSpecific::Undefined);
        assert!(bytes.is_empty());
    }

    #[test]
    fn fill_default_mfu_uid_computes_correct_bcc0() {
        let mut image = mfu::image::MfuImage::blank(TagSpecific::Ntag213);
        fill_default_mfu_uid(&mut image);
        let p0 = image.page(0).unwrap();
        let bcc0 = 0x88 ^ p0[0] ^ p0[1] ^ p0[2];
        assert_eq!(p0[3], bcc0);
    }
}
