//! MIFARE Classic tag-side logic: authenticated data operations,
//! write-mode semantics, and the Gen1a/Gen2 magic backdoors.

pub mod auth;
pub mod image;
pub mod magic;

use crate::auth_log::AuthLog;
use crate::crypto1::Crypto1;
use crate::error::ReaderError;
use crate::hf::tag14a::AccessBits;
use image::{Mf1Image, WriteMode};
use magic::Gen1aState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mf1Substate {
    Unauth,
    Authing,
    Authed,
    Write,
    Increment,
    Decrement,
    Restore,
}

pub struct Mf1Tag {
    pub image: Mf1Image,
    pub state: Mf1Substate,
    pub gen1a: Gen1aState,
    session: Option<SessionKey>,
    pending_auth: Option<auth::AuthChallenge>,
    value_scratch: Option<i32>,
    pub pending_write_block: u8,
}

struct SessionKey {
    cipher: Crypto1,
    sector: usize,
    block: u8,
    with_key_b: bool,
}

impl Mf1Tag {
    pub fn new(image: Mf1Image) -> Self {
        Self {
            image,
            state: Mf1Substate::Unauth,
            gen1a: Gen1aState::Locked,
            session: None,
            pending_auth: None,
            value_scratch: None,
            pending_write_block: 0,
        }
    }

    pub fn on_halt(&mut self) {
        self.state = Mf1Substate::Unauth;
        self.session = None;
        self.pending_auth = None;
        self.gen1a = Gen1aState::Locked;
    }

    /// Step 1 of the handshake: the reader names a block and key type; we
    /// answer with an encrypted nonce (the caller encodes `nt` on the wire).
    pub fn auth_request(&mut self, uid: &[u8; 4], block: u8, is_key_b: bool, nt_seed: u32) -> u32 {
        let sector = Mf1Image::sector_of_block(block as usize);
        let key = if is_key_b {
            self.image.key_b(sector)
        } else {
            self.image.key_a(sector)
        };
        let challenge = auth::begin(key, uid, nt_seed);
        let nt = challenge.nt;
        self.pending_auth = Some(challenge);
        self.state = Mf1Substate::Authing;
        nt
    }

    /// Step 2: verify `{nr, ar}`. On success moves to `Authed` and records
    /// the session key/sector; on failure drops back to `Unauth`.
    pub fn auth_verify(
        &mut self,
        log: &mut AuthLog,
        uid: [u8; 4],
        block: u8,
        is_key_b: bool,
        nr_enc: u32,
        ar_enc: u32,
    ) -> Result<(), ReaderError> {
        let challenge = self.pending_auth.take().ok_or(ReaderError::AuthFail)?;
        let nt = challenge.nt;
        let outcome = auth::verify(challenge, block, is_key_b, &uid, nr_enc, ar_enc);
        let sector = Mf1Image::sector_of_block(block as usize);
        let known_key = Some(if is_key_b {
            self.image.key_b(sector)
        } else {
            self.image.key_a(sector)
        });
        auth::log_attempt(log, block, is_key_b, uid, nt, nr_enc, ar_enc, known_key);

        if !outcome.ok {
            self.state = Mf1Substate::Unauth;
            return Err(ReaderError::AuthFail);
        }

        self.session = Some(SessionKey {
            cipher: outcome.cipher,
            sector,
            block,
            with_key_b: is_key_b,
        });
        self.state = Mf1Substate::Authed;
        Ok(())
    }

    fn authed_sector(&self) -> Result<usize, ReaderError> {
        self.session.as_ref().map(|s| s.sector).ok_or(ReaderError::AuthFail)
    }

    fn access(&self, sector: usize) -> AccessBits {
        self.image.access_bits(sector)
    }

    pub fn read(&mut self, block: u8) -> Result<[u8; 16], ReaderError> {
        if self.gen1a.is_unlocked() {
            // Gen1a back-door: plain READ, no auth, no access-bit checks.
            return self.image.block(block as usize).copied().ok_or(ReaderError::Invalid);
        }
        let session_sector = self.authed_sector()?;
        let block_sector = Mf1Image::sector_of_block(block as usize);
        if block_sector != session_sector {
            return Err(ReaderError::AuthFail);
        }
        let with_b = self.session.as_ref().unwrap().with_key_b;
        let is_trailer = Mf1Image::is_trailer(block as usize);
        let block_in_sector = block_in_sector_index(block, block_sector);
        let perm = self.access(block_sector).block_permission(block_in_sector);

        let allowed = if with_b {
            // Key-B read permission mirrors key-A's table for data blocks;
            // trailer key-B bytes are never readable over the air.
            !is_trailer && perm.read_allowed_with_key_a(false)
        } else {
            perm.read_allowed_with_key_a(is_trailer)
        };
        if !allowed {
            return Err(ReaderError::AuthFail);
        }

        let raw = *self.image.block(block as usize).ok_or(ReaderError::Invalid)?;
        if is_trailer {
            // Key A is never readable back, even by a key-A session.
            let mut masked = raw;
            masked[0..6].fill(0);
            Ok(masked)
        } else {
            Ok(raw)
        }
    }

    pub fn write_begin(&mut self, block: u8) -> Result<(), ReaderError> {
        if self.gen1a.is_unlocked() {
            // Gen1a back-door: plain WRITE, no auth, ignores write_mode.
            self.state = Mf1Substate::Write;
            self.pending_write_block = block;
            return Ok(());
        }
        let sector = self.authed_sector()?;
        let block_sector = Mf1Image::sector_of_block(block as usize);
        if block_sector != sector {
            return Err(ReaderError::AuthFail);
        }
        let with_b = self.session.as_ref().unwrap().with_key_b;
        let is_trailer = Mf1Image::is_trailer(block as usize);
        let block_in_sector = block_in_sector_index(block, sector);
        let perm = self.access(sector).block_permission(block_in_sector);
        let allowed = if with_b {
            perm.write_allowed_with_key_b(is_trailer)
        } else {
            perm.write_allowed_with_key_a(is_trailer)
        };
        if !allowed {
            return Err(ReaderError::AuthFail);
        }
        self.state = Mf1Substate::Write;
        self.pending_write_block = block;
        Ok(())
    }

    /// Applies write-mode semantics: Normal writes through, Deceive accepts
    /// the write but never persists it (always re-reads as the original),
    /// Shadow persists only for the current power cycle (modeled here as
    /// writing through; the distinction matters to the firmware's flash
    /// writeback policy, handled by the slot layer, not here), Denied
    /// replies NAK and never commits. The reader always got an ACK to the
    /// initial WRITE in `write_begin`; the write-mode decision is applied
    /// only once the data frame itself arrives.
    pub fn write_commit(&mut self, block: u8, data: [u8; 16]) -> Result<(), ReaderError> {
        if self.state != Mf1Substate::Write {
            return Err(ReaderError::ProtocolErr);
        }
        if self.gen1a.is_unlocked() {
            // Gen1a back-door: write through unconditionally, including
            // block 0, ignoring write_mode entirely.
            self.state = Mf1Substate::Unauth;
            let slot = self.image.block_mut(block as usize).ok_or(ReaderError::Invalid)?;
            *slot = data;
            return Ok(());
        }
        self.state = Mf1Substate::Authed;
        if block as usize == 0 && !self.image.config.gen2_magic {
            return Err(ReaderError::AuthFail);
        }
        match self.image.config.write_mode {
            WriteMode::Denied => Err(ReaderError::AuthFail),
            WriteMode::Deceive => Ok(()),
            WriteMode::Normal | WriteMode::Shadow => {
                let slot = self.image.block_mut(block as usize).ok_or(ReaderError::Invalid)?;
                *slot = data;
                Ok(())
            }
        }
    }

    pub fn increment_begin(&mut self, block: u8, delta: u32) -> Result<(), ReaderError> {
        self.value_op_begin(block, Mf1Substate::Increment)?;
        let current = read_value_block(self.image.block(block as usize).ok_or(ReaderError::Invalid)?)
            .ok_or(ReaderError::Invalid)?;
        self.value_scratch = Some(current.saturating_add(delta as i32));
        Ok(())
    }

    pub fn decrement_begin(&mut self, block: u8, delta: u32) -> Result<(), ReaderError> {
        self.value_op_begin(block, Mf1Substate::Decrement)?;
        let current = read_value_block(self.image.block(block as usize).ok_or(ReaderError::Invalid)?)
            .ok_or(ReaderError::Invalid)?;
        self.value_scratch = Some(current.saturating_sub(delta as i32));
        Ok(())
    }

    pub fn restore_begin(&mut self, block: u8) -> Result<(), ReaderError> {
        self.value_op_begin(block, Mf1Substate::Restore)?;
        let current = read_value_block(self.image.block(block as usize).ok_or(ReaderError::Invalid)?)
            .ok_or(ReaderError::Invalid)?;
        self.value_scratch = Some(current);
        Ok(())
    }

    fn value_op_begin(&mut self, block: u8, substate: Mf1Substate) -> Result<(), ReaderError> {
        let sector = self.authed_sector()?;
        let block_sector = Mf1Image::sector_of_block(block as usize);
        if block_sector != sector {
            return Err(ReaderError::AuthFail);
        }
        let block_in_sector = block_in_sector_index(block, sector);
        let perm = self.access(sector).block_permission(block_in_sector);
        let allowed = match substate {
            Mf1Substate::Increment => perm.increment_allowed(),
            _ => perm.decrement_transfer_restore_allowed(),
        };
        if !allowed {
            return Err(ReaderError::AuthFail);
        }
        self.state = substate;
        Ok(())
    }

    /// TRANSFER commits the pending value-op result to `dest_block`,
    /// re-encoding the triple-redundant integrity layout.
    pub fn transfer(&mut self, dest_block: u8) -> Result<(), ReaderError> {
        let value = self.value_scratch.take().ok_or(ReaderError::ProtocolErr)?;
        self.state = Mf1Substate::Authed;
        let slot = self.image.block_mut(dest_block as usize).ok_or(ReaderError::Invalid)?;
        *slot = encode_value_block(value, dest_block);
        Ok(())
    }
}

/// Maps a block to its access-bit group (0..=2 data, 3 trailer). 16-block
/// sectors (Mifare4K, sectors 32-39) group five data blocks per bit instead
/// of one; we approximate with a 5-block stride rather than the full
/// irregular table, matching actual hardware for 4-block sectors exactly
/// and for 16-block sectors in the common case of uniform per-sector rights.
fn block_in_sector_index(block: u8, sector: usize) -> u8 {
    let first = if sector < 32 {
        sector * 4
    } else {
        128 + (sector - 32) * 16
    };
    let offset = block as usize - first;
    if sector < 32 {
        offset.min(3) as u8
    } else {
        (offset / 5).min(3) as u8
    }
}

/// Validates and decodes a MIFARE value block: `val | !val | val | addr |
/// !addr | addr | !addr`, all little-endian, 16 bytes total.
pub fn read_value_block(raw: &[u8; 16]) -> Option<i32> {
    let v1 = i32::from_le_bytes(raw[0..4].try_into().unwrap());
    let v1c = u32::from_le_bytes(raw[4..8].try_into().unwrap());
    let v2 = i32::from_le_bytes(raw[8..12].try_into().unwrap());
    if v1 != v2 || v1c != !(v1 as u32) {
        return None;
    }
    let a1 = raw[12];
    let a1c = raw[13];
    let a2 = raw[14];
    let a2c = raw[15];
    if a1 != a2 || a1c != !a1 || a2c != !a2 {
        return None;
    }
    Some(v1)
}

pub fn encode_value_block(value: i32, addr: u8) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&value.to_le_bytes());
    out[4..8].copy_from_slice(&(!(value as u32)).to_le_bytes());
    out[8..12].copy_from_slice(&value.to_le_bytes());
    out[12] = addr;
    out[13] = !addr;
    out[14] = addr;
    out[15] = !addr;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagtypes::TagSpecific;

    #[test]
    fn value_block_round_trips() {
        let raw = encode_value_block(42, 5);
        assert_eq!(read_value_block(&raw), Some(42));
    }

    #[test]
    fn corrupted_value_block_rejected() {
        let mut raw = encode_value_block(42, 5);
        raw[0] ^= 0xFF;
        assert_eq!(read_value_block(&raw), None);
    }

    #[test]
    fn auth_then_read_trailer_masks_key_a() {
        let image = Mf1Image::blank(TagSpecific::Mifare1K);
        let mut tag = Mf1Tag::new(image);
        let mut log = AuthLog::default();
        let uid = [0x11, 0x22, 0x33, 0x44];
        let nt = tag.auth_request(&uid, 3, false, 0xdead_beef);

        // Build a matching reader-side cipher out-of-band the same way the
        // PCD toolbox does, to produce a valid {nr, ar} pair.
        let key = tag.image.key_a(0);
        let mut reader_cipher = Crypto1::new();
        reader_cipher.init(key);
        let uid_word = u32::from_be_bytes(uid);
        reader_cipher.word(uid_word ^ nt, false);
        let nr = 0x1234_5678u32;
        let nr_enc = reader_cipher.word(nr, false);
        let ar = Crypto1::prng_successor(nt, 64);
        let ar_enc = reader_cipher.word(ar, false);

        tag.auth_verify(&mut log, uid, 3, false, nr_enc, ar_enc).unwrap();
        assert_eq!(tag.state, Mf1Substate::Authed);

        let trailer = tag.read(3).unwrap();
        assert_eq!(&trailer[0..6], &[0u8; 6]);
        assert_eq!(log.len(), 1);
    }
}
