//! Gen1a/Gen2 "magic" MIFARE backdoors.
//!
//! Gen1a: a raw 7-bit `0x40` unlock command followed by an 8-bit `0x43`
//! unlock, both outside the normal authenticated-session flow, after which
//! block 0 (UID + BCC + manufacturer bytes) becomes writable.
//!
//! Gen2: block 0 is writable through the ordinary authenticated WRITE
//! command once `gen2_magic` is set; no separate unlock step.

pub const GEN1A_UNLOCK_CMD: u8 = 0x40; // sent as a 7-bit frame
pub const GEN1A_UNLOCK_CMD2: u8 = 0x43; // sent as an 8-bit frame, after CMD

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gen1aState {
    Locked,
    HalfUnlocked,
    Unlocked,
}

impl Default for Gen1aState {
    fn default() -> Self {
        Gen1aState::Locked
    }
}

impl Gen1aState {
    /// `cmd` is the command byte, `bits` the number of valid bits in the
    /// frame (7 for the first unlock step, 8 for the second).
    pub fn on_command(self, cmd: u8, bits: u8) -> Self {
        match (self, cmd, bits) {
            (Gen1aState::Locked, GEN1A_UNLOCK_CMD, 7) => Gen1aState::HalfUnlocked,
            (Gen1aState::HalfUnlocked, GEN1A_UNLOCK_CMD2, 8) => Gen1aState::Unlocked,
            (Gen1aState::Unlocked, _, _) => Gen1aState::Unlocked,
            _ => Gen1aState::Locked,
        }
    }

    /// Whether the backdoor has completed both unlock steps: while this
    /// holds, READ and WRITE bypass authentication and `write_mode`
    /// entirely (spec §4.5 "Gen1a magic back-door").
    pub fn is_unlocked(self) -> bool {
        matches!(self, Gen1aState::Unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_step_unlock_sequence() {
        let mut st = Gen1aState::Locked;
        st = st.on_command(GEN1A_UNLOCK_CMD, 7);
        assert_eq!(st, Gen1aState::HalfUnlocked);
        st = st.on_command(GEN1A_UNLOCK_CMD2, 8);
        assert_eq!(st, Gen1aState::Unlocked);
        assert!(st.is_unlocked());
    }

    #[test]
    fn wrong_step_order_resets() {
        let mut st = Gen1aState::Locked;
        st = st.on_command(GEN1A_UNLOCK_CMD2, 8);
        assert_eq!(st, Gen1aState::Locked);
    }
}
