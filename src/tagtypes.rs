//! Tag type taxonomy: a closed enumeration of specific tag types,
//! each mapping to exactly one sense type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseType {
    Lf,
    Hf,
    None,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSpecific {
    Undefined,
    Em410x,
    Viking,
    MifareMini,
    Mifare1K,
    Mifare2K,
    Mifare4K,
    Mf0Icu1,
    Mf0Icu2,
    Mf0Ul11,
    Mf0Ul21,
    Ntag210,
    Ntag212,
    Ntag213,
    Ntag215,
    Ntag216,
}

impl TagSpecific {
    pub const fn sense(self) -> SenseType {
        use TagSpecific::*;
        match self {
            Undefined => SenseType::None,
            Em410x | Viking => SenseType::Lf,
            MifareMini | Mifare1K | Mifare2K | Mifare4K | Mf0Icu1 | Mf0Icu2 | Mf0Ul11
            | Mf0Ul21 | Ntag210 | Ntag212 | Ntag213 | Ntag215 | Ntag216 => SenseType::Hf,
        }
    }

    pub const fn is_mf1(self) -> bool {
        matches!(
            self,
            TagSpecific::MifareMini
                | TagSpecific::Mifare1K
                | TagSpecific::Mifare2K
                | TagSpecific::Mifare4K
        )
    }

    pub const fn is_mfu(self) -> bool {
        matches!(
            self,
            TagSpecific::Mf0Icu1
                | TagSpecific::Mf0Icu2
                | TagSpecific::Mf0Ul11
                | TagSpecific::Mf0Ul21
                | TagSpecific::Ntag210
                | TagSpecific::Ntag212
                | TagSpecific::Ntag213
                | TagSpecific::Ntag215
                | TagSpecific::Ntag216
        )
    }

    /// Closed-set validity check
    pub const fn from_u8(v: u8) -> Option<Self> {
        use TagSpecific::*;
        Some(match v {
            0 => Undefined,
            1 => Em410x,
            2 => Viking,
            3 => MifareMini,
            4 => Mifare1K,
            5 => Mifare2K,
            6 => Mifare4K,
            7 => Mf0Icu1,
            8 => Mf0Icu2,
            9 => Mf0Ul11,
            10 => Mf0Ul21,
            11 => Ntag210,
            12 => Ntag212,
            13 => Ntag213,
            14 => Ntag215,
            15 => Ntag216,
            _ => return None,
        })
    }

    pub const fn to_u8(self) -> u8 {
        use TagSpecific::*;
        match self {
            Undefined => 0,
            Em410x => 1,
            Viking => 2,
            MifareMini => 3,
            Mifare1K => 4,
            Mifare2K => 5,
            Mifare4K => 6,
            Mf0Icu1 => 7,
            Mf0Icu2 => 8,
            Mf0Ul11 => 9,
            Mf0Ul21 => 10,
            Ntag210 => 11,
            Ntag212 => 12,
            Ntag213 => 13,
            Ntag215 => 14,
            Ntag216 => 15,
        }
    }

    /// Sector/block count for MF1 variants (None for non-MF1 types).
    pub const fn mf1_block_count(self) -> Option<usize> {
        match self {
            TagSpecific::MifareMini => Some(20),
            TagSpecific::Mifare1K => Some(64),
            TagSpecific::Mifare2K => Some(128),
            TagSpecific::Mifare4K => Some(256),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_closed_set() {
        for v in 0u8..16 {
            let t = TagSpecific::from_u8(v).unwrap();
            assert_eq!(t.to_u8(), v);
        }
        assert!(TagSpecific::from_u8(16).is_none());
    }

    #[test]
    fn undefined_has_no_sense() {
        assert_eq!(TagSpecific::Undefined.sense(), SenseType::None);
    }
}
