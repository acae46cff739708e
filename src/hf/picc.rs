//! 14A PICC tag-emulation responder: state machine driven by
//! the frames a reader's field produces. On real hardware this runs in the
//! HF field-sense interrupt context; here it is a pure function
//! of "frame in, state transition, frame out" that the core's main loop
//! drives synchronously once a frame has been captured.

use heapless::Vec as HVec;

use crate::auth_log::AuthLog;
use crate::error::ReaderError;
use crate::hf::mf1::magic::{self, Gen1aState};
use crate::hf::mf1::Mf1Tag;
use crate::hf::mfu::MfuTag;
use crate::hf::tag14a::{CascadeLevel, Tag14aSnapshot};
use crate::peripheral::mfrc522::consts::PICCCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiccState {
    Idle,
    Ready,
    Active,
    Halted,
}

pub enum TagBody {
    Mf1(Mf1Tag),
    Mfu(MfuTag),
}

pub struct Picc14a {
    pub state: PiccState,
    pub snapshot: Tag14aSnapshot,
    pub body: TagBody,
}

pub type Reply = HVec<u8, 512>;

impl Picc14a {
    pub fn new(snapshot: Tag14aSnapshot, body: TagBody) -> Self {
        Self {
            state: PiccState::Idle,
            snapshot,
            body,
        }
    }

    /// `bits` is the number of valid bits in `frame` (7 for REQA/WUPA, a
    /// multiple of 8 otherwise, per 14443-3 framing rules).
    pub fn on_frame(&mut self, frame: &[u8], bits: u8, auth_log: &mut AuthLog) -> Option<Reply> {
        if frame.is_empty() {
            return None;
        }

        // Gen1a magic back-door: reachable from Idle or Halted regardless
        // of the normal REQA/anticollision/SELECT dance, gated on the
        // image's `gen1a_magic` flag. The second unlock step raises the
        // 14A state to Active directly, bypassing SELECT, while leaving
        // the MF1 session itself unauthenticated.
        if let TagBody::Mf1(tag) = &mut self.body {
            if tag.image.config.gen1a_magic {
                let idle_or_halted = matches!(self.state, PiccState::Idle | PiccState::Halted);
                if bits == 7 && frame[0] == magic::GEN1A_UNLOCK_CMD && idle_or_halted {
                    tag.gen1a = tag.gen1a.on_command(magic::GEN1A_UNLOCK_CMD, 7);
                    return None;
                }
                if bits == 8 && frame[0] == magic::GEN1A_UNLOCK_CMD2 && tag.gen1a == Gen1aState::HalfUnlocked {
                    tag.gen1a = tag.gen1a.on_command(magic::GEN1A_UNLOCK_CMD2, 8);
                    if tag.gen1a == Gen1aState::Unlocked {
                        self.state = PiccState::Active;
                    }
                    return None;
                }
            }
        }

        if bits == 7 {
            return self.on_request(frame[0]);
        }

        match frame[0] {
            PICCCommand::PICC_CMD_SEL_CL1 | PICCCommand::PICC_CMD_SEL_CL2 | PICCCommand::PICC_CMD_SEL_CL3 => {
                self.on_select(frame)
            }
            PICCCommand::PICC_CMD_HLTA => {
                self.state = PiccState::Halted;
                match &mut self.body {
                    TagBody::Mf1(m) => m.on_halt(),
                    TagBody::Mfu(m) => m.on_halt(),
                }
                None
            }
            PICCCommand::PICC_CMD_RATS => self.on_rats(),
            _ if self.state == PiccState::Active => self.on_active_frame(frame, auth_log),
            _ => None,
        }
    }

    fn on_request(&mut self, cmd: u8) -> Option<Reply> {
        let wakes_halted = cmd == PICCCommand::PICC_CMD_WUPA;
        match self.state {
            PiccState::Idle => {}
            PiccState::Halted if wakes_halted => {}
            _ => return None,
        }
        self.state = PiccState::Ready;
        let mut out = Reply::new();
        let _ = out.extend_from_slice(&self.snapshot.atqa);
        Some(out)
    }

    fn on_select(&mut self, frame: &[u8]) -> Option<Reply> {
        if self.state != PiccState::Ready && self.state != PiccState::Active {
            return None;
        }
        let level = match frame[0] {
            PICCCommand::PICC_CMD_SEL_CL1 => CascadeLevel::One,
            PICCCommand::PICC_CMD_SEL_CL2 => CascadeLevel::Two,
            _ => CascadeLevel::Three,
        };
        if level != self.snapshot.cascade_level() {
            return None;
        }

        let nvb = frame.get(1).copied().unwrap_or(0);
        let mut out = Reply::new();
        if nvb == 0x20 {
            // ANTICOLL: full UID (without BCC for cascade levels >1's CT
            // byte handling is elided, single-tag emulation never collides).
            let _ = out.extend_from_slice(self.snapshot.uid());
            let bcc = self.snapshot.uid().iter().fold(0u8, |a, b| a ^ b);
            let _ = out.push(bcc);
        } else {
            // SELECT: the reader names the 4-byte UID segment (+BCC) it
            // anticollided with; a mismatch (P7) drops back to Idle instead
            // of accepting whatever cascade level happened to match.
            let uid = self.snapshot.uid();
            if frame.get(1..1 + uid.len()) != Some(uid) {
                self.state = PiccState::Idle;
                return None;
            }
            self.state = PiccState::Active;
            let _ = out.push(self.snapshot.sak);
        }
        Some(out)
    }

    fn on_rats(&mut self) -> Option<Reply> {
        if self.state != PiccState::Active {
            return None;
        }
        let (ats, len) = self.snapshot.ats?;
        let mut out = Reply::new();
        let _ = out.extend_from_slice(&ats[..len as usize]);
        Some(out)
    }

    fn on_active_frame(&mut self, frame: &[u8], auth_log: &mut AuthLog) -> Option<Reply> {
        match &mut self.body {
            TagBody::Mf1(tag) => mf1_dispatch(tag, frame, auth_log, &self.snapshot),
            TagBody::Mfu(tag) => mfu_dispatch(tag, frame),
        }
    }
}

fn uid4(snapshot: &Tag14aSnapshot) -> [u8; 4] {
    let u = snapshot.uid();
    let mut out = [0u8; 4];
    let n = u.len().min(4);
    out[..n].copy_from_slice(&u[u.len() - n..]);
    out
}

fn mf1_dispatch(
    tag: &mut Mf1Tag,
    frame: &[u8],
    auth_log: &mut AuthLog,
    snapshot: &Tag14aSnapshot,
) -> Option<Reply> {
    let mut out = Reply::new();
    match frame.first().copied()? {
        PICCCommand::PICC_CMD_MF_AUTH_KEY_A | PICCCommand::PICC_CMD_MF_AUTH_KEY_B if frame.len() >= 2 => {
            let is_b = frame[0] == PICCCommand::PICC_CMD_MF_AUTH_KEY_B;
            let nt = tag.auth_request(&uid4(snapshot), frame[1], is_b, rand::random());
            let _ = out.extend_from_slice(&nt.to_le_bytes());
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_READ if frame.len() >= 2 => {
            let blk = frame[1];
            let data = tag.read(blk).ok()?;
            let _ = out.extend_from_slice(&data);
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_WRITE if frame.len() >= 2 => {
            tag.write_begin(frame[1]).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_INCREMENT if frame.len() >= 6 => {
            let delta = u32::from_le_bytes(frame[2..6].try_into().ok()?);
            tag.increment_begin(frame[1], delta).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_DECREMENT if frame.len() >= 6 => {
            let delta = u32::from_le_bytes(frame[2..6].try_into().ok()?);
            tag.decrement_begin(frame[1], delta).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_RESTORE if frame.len() >= 2 => {
            tag.restore_begin(frame[1]).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        PICCCommand::PICC_CMD_MF_TRANSFER if frame.len() >= 2 => {
            tag.transfer(frame[1]).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        _ if frame.len() == 18 => {
            // A 16-byte write-data frame completing the prior WRITE begin.
            let mut data = [0u8; 16];
            data.copy_from_slice(&frame[0..16]);
            let block = tag.state_pending_block();
            tag.write_commit(block, data).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        _ => {
            let _ = auth_log;
            None
        }
    }
}

fn mfu_dispatch(tag: &mut MfuTag, frame: &[u8]) -> Option<Reply> {
    use crate::hf::mfu::*;
    let mut out = Reply::new();
    match frame.first().copied()? {
        CMD_GET_VERSION => {
            let _ = out.extend_from_slice(&tag.get_version()?);
            Some(out)
        }
        CMD_READ if frame.len() >= 2 => {
            let data = tag.read(frame[1], tag.authed).ok()?;
            let _ = out.extend_from_slice(&data);
            Some(out)
        }
        CMD_FAST_READ if frame.len() >= 3 => {
            let data = tag.fast_read(frame[1], frame[2], tag.authed).ok()?;
            let _ = out.extend_from_slice(&data);
            Some(out)
        }
        CMD_WRITE if frame.len() >= 6 => {
            let mut data = [0u8; 4];
            data.copy_from_slice(&frame[2..6]);
            tag.write(frame[1], data).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        CMD_COMPAT_WRITE if frame.len() >= 18 => {
            let mut data = [0u8; 16];
            data.copy_from_slice(&frame[2..18]);
            tag.compat_write(frame[1], &data).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        CMD_READ_CNT if frame.len() >= 2 => {
            let v = tag.read_counter(frame[1]).ok()?;
            let bytes = v.to_le_bytes();
            let _ = out.extend_from_slice(&bytes[0..3]);
            Some(out)
        }
        CMD_INCR_CNT if frame.len() >= 6 => {
            let delta = u32::from_le_bytes(frame[2..6].try_into().ok()?) & 0x00FF_FFFF;
            tag.increment_counter(frame[1], delta).ok()?;
            let _ = out.push(0x0A);
            Some(out)
        }
        CMD_PWD_AUTH if frame.len() >= 5 => {
            let mut pwd = [0u8; 4];
            pwd.copy_from_slice(&frame[1..5]);
            let pack = tag.pwd_auth(pwd).ok()?;
            let _ = out.extend_from_slice(&pack);
            Some(out)
        }
        CMD_READ_SIG => {
            let _ = out.extend_from_slice(&tag.read_signature());
            Some(out)
        }
        _ => None,
    }
}

impl Mf1Tag {
    /// The block a pending `Write` substate is targeting, tracked
    /// alongside `state` so the second half of the two-frame WRITE
    /// sequence knows where to commit.
    fn state_pending_block(&self) -> u8 {
        self.pending_write_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hf::mf1::image::Mf1Image;
    use crate::tagtypes::TagSpecific;

    fn new_mf1_picc() -> Picc14a {
        let snapshot = Tag14aSnapshot {
            uid: {
                let mut u = [0u8; crate::hf::tag14a::MAX_UID_LEN];
                u[0..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
                u
            },
            uid_len: 4,
            sak: 0x08,
            atqa: [0x04, 0x00],
            ats: None,
        };
        let image = Mf1Image::blank(TagSpecific::Mifare1K);
        Picc14a::new(snapshot, TagBody::Mf1(Mf1Tag::new(image)))
    }

    /// P7: a REQA in Halted is ignored; a WUPA in Halted wakes with ATQA.
    #[test]
    fn halted_ignores_reqa_but_wakes_on_wupa() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        picc.state = PiccState::Halted;

        let reply = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);
        assert!(reply.is_none());
        assert_eq!(picc.state, PiccState::Halted);

        let reply = picc.on_frame(&[PICCCommand::PICC_CMD_WUPA], 7, &mut log);
        assert_eq!(reply.as_deref(), Some(&picc.snapshot.atqa[..]));
        assert_eq!(picc.state, PiccState::Ready);
    }

    #[test]
    fn idle_wakes_on_either_reqa_or_wupa() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let reply = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);
        assert!(reply.is_some());
        assert_eq!(picc.state, PiccState::Ready);
    }

    /// P7: a SELECT naming a cascade level the snapshot doesn't have
    /// returns no reply and does not advance state to Active.
    #[test]
    fn select_wrong_cascade_level_is_rejected() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);
        assert_eq!(picc.state, PiccState::Ready);

        // 4-byte UID means cascade level One (SEL_CL1); CL2 must be rejected.
        let reply = picc.on_frame(&[PICCCommand::PICC_CMD_SEL_CL2, 0x20], 8, &mut log);
        assert!(reply.is_none());
        assert_ne!(picc.state, PiccState::Active);
    }

    #[test]
    fn full_anticoll_select_sequence_reaches_active() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);

        let anticoll = picc
            .on_frame(&[PICCCommand::PICC_CMD_SEL_CL1, 0x20], 8, &mut log)
            .unwrap();
        assert_eq!(&anticoll[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);

        let select = picc
            .on_frame(
                &[PICCCommand::PICC_CMD_SEL_CL1, 0x70, 0xDE, 0xAD, 0xBE, 0xEF, 0x50],
                56,
                &mut log,
            )
            .unwrap();
        assert_eq!(select[0], 0x08);
        assert_eq!(picc.state, PiccState::Active);
    }

    /// P7: a SELECT at the right cascade level but naming the wrong UID
    /// drops the tag back to Idle instead of accepting it.
    #[test]
    fn select_same_cascade_level_wrong_uid_drops_to_idle() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_SEL_CL1, 0x20], 8, &mut log);

        let reply = picc.on_frame(
            &[PICCCommand::PICC_CMD_SEL_CL1, 0x70, 0x00, 0x00, 0x00, 0x00, 0x00],
            56,
            &mut log,
        );
        assert!(reply.is_none());
        assert_eq!(picc.state, PiccState::Idle);
    }

    /// Gen1a magic: the 7-bit/8-bit unlock pair is reachable straight from
    /// Idle, bypasses SELECT entirely (raises state to Active directly),
    /// and lets an unauthenticated READ/WRITE of block 0 through.
    #[test]
    fn gen1a_unlock_from_idle_allows_unauthenticated_block0_rw() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        if let TagBody::Mf1(tag) = &mut picc.body {
            tag.image.config.gen1a_magic = true;
        }
        assert_eq!(picc.state, PiccState::Idle);

        let reply = picc.on_frame(&[0x40], 7, &mut log);
        assert!(reply.is_none());
        assert_eq!(picc.state, PiccState::Idle);

        let reply = picc.on_frame(&[0x43], 8, &mut log);
        assert!(reply.is_none());
        assert_eq!(picc.state, PiccState::Active);
        if let TagBody::Mf1(tag) = &picc.body {
            assert_eq!(tag.state, crate::hf::mf1::Mf1Substate::Unauth);
        }

        let write_ack = picc.on_frame(&[PICCCommand::PICC_CMD_MF_WRITE, 0x00], 16, &mut log);
        assert!(write_ack.is_some());
        let mut block0 = [0u8; 18];
        block0[0..16].copy_from_slice(&[0xAA; 16]);
        let commit_ack = picc.on_frame(&block0, 144, &mut log);
        assert!(commit_ack.is_some());

        let read = picc.on_frame(&[PICCCommand::PICC_CMD_MF_READ, 0x00], 16, &mut log).unwrap();
        assert_eq!(&read[..], &[0xAA; 16]);
    }

    /// Gen1a unlock requires the flag; without it the 7-bit `0x40` frame
    /// is just another unrecognized request and is ignored.
    #[test]
    fn gen1a_unlock_ignored_when_flag_not_set() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let _ = picc.on_frame(&[0x40], 7, &mut log);
        if let TagBody::Mf1(tag) = &picc.body {
            assert_eq!(tag.gen1a, Gen1aState::Locked);
        }
    }

    #[test]
    fn halt_from_active_is_silent_and_resets_mf1_session() {
        let mut picc = new_mf1_picc();
        let mut log = AuthLog::default();
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_REQA], 7, &mut log);
        let _ = picc.on_frame(&[PICCCommand::PICC_CMD_SEL_CL1, 0x20], 8, &mut log);
        let _ = picc.on_frame(
            &[PICCCommand::PICC_CMD_SEL_CL1, 0x70, 0xDE, 0xAD, 0xBE, 0xEF, 0x50],
            56,
            &mut log,
        );
        assert_eq!(picc.state, PiccState::Active);

        let reply = picc.on_frame(&[PICCCommand::PICC_CMD_HLTA, 0x00], 16, &mut log);
        assert!(reply.is_none());
        assert_eq!(picc.state, PiccState::Halted);
    }
}
