//! MIFARE Classic slot image: configuration + 16-byte block memory
//! for all 16 sectors.

use crate::tagtypes::TagSpecific;

pub const MAX_MF1_BLOCKS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Normal,
    Denied,
    Deceive,
    Shadow,
}

impl WriteMode {
    pub const fn to_u8(self) -> u8 {
        match self {
            WriteMode::Normal => 0,
            WriteMode::Denied => 1,
            WriteMode::Deceive => 2,
            WriteMode::Shadow => 3,
        }
    }

    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => WriteMode::Denied,
            2 => WriteMode::Deceive,
            3 => WriteMode::Shadow,
            _ => WriteMode::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mf1Config {
    pub write_mode: WriteMode,
    pub use_mf1_coll_res: bool,
    pub gen1a_magic: bool,
    pub gen2_magic: bool,
    pub detection_enable: bool,
}

impl Default for Mf1Config {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::Normal,
            use_mf1_coll_res: false,
            gen1a_magic: false,
            gen2_magic: false,
            detection_enable: false,
        }
    }
}

/// `coll_res` packs the 14A select-response pair (SAK, ATQA) the MF1 tag
/// answers with, independent of the per-block memory contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollRes {
    pub sak: u8,
    pub atqa: [u8; 2],
}

pub struct Mf1Image {
    pub coll_res: CollRes,
    pub config: Mf1Config,
    pub block_count: usize,
    pub memory: [[u8; 16]; MAX_MF1_BLOCKS],
}

impl Mf1Image {
    pub fn blank(specific: TagSpecific) -> Self {
        let block_count = specific.mf1_block_count().unwrap_or(64);
        let mut img = Self {
            coll_res: CollRes {
                sak: 0x08,
                atqa: [0x04, 0x00],
            },
            config: Mf1Config::default(),
            block_count,
            memory: [[0u8; 16]; MAX_MF1_BLOCKS],
        };
        img.factory_fill();
        img
    }

    /// Every sector trailer gets the well-known default key pair (all 0xFF)
    /// and default access bits (0xFF 0x07 0x80); data/value blocks stay
    /// zeroed. Mirrors the "blank card" layout every MF1 card ships with.
    fn factory_fill(&mut self) {
        let mut block = 0usize;
        let mut sector = 0usize;
        while block < self.block_count {
            let blocks_in_sector = if sector < 32 { 4 } else { 16 };
            let trailer = block + blocks_in_sector - 1;
            if trailer < self.block_count {
                let t = &mut self.memory[trailer];
                t[0..6].copy_from_slice(&[0xFF; 6]);
                t[6..10].copy_from_slice(&[0xFF, 0x07, 0x80, 0x69]);
                t[10..16].copy_from_slice(&[0xFF; 6]);
            }
            block += blocks_in_sector;
            sector += 1;
        }
    }

    pub fn sector_of_block(block: usize) -> usize {
        if block < 128 {
            block / 4
        } else {
            32 + (block - 128) / 16
        }
    }

    pub fn trailer_block_of_sector(sector: usize) -> usize {
        if sector < 32 {
            sector * 4 + 3
        } else {
            128 + (sector - 32) * 16 + 15
        }
    }

    pub fn is_trailer(block: usize) -> bool {
        Self::trailer_block_of_sector(Self::sector_of_block(block)) == block
    }

    pub fn block(&self, idx: usize) -> Option<&[u8; 16]> {
        self.memory.get(idx).filter(|_| idx < self.block_count)
    }

    pub fn block_mut(&mut self, idx: usize) -> Option<&mut [u8; 16]> {
        if idx < self.block_count {
            self.memory.get_mut(idx)
        } else {
            None
        }
    }

    pub fn key_a(&self, sector: usize) -> [u8; 6] {
        let trailer = self.memory[Self::trailer_block_of_sector(sector)];
        let mut key = [0u8; 6];
        key.copy_from_slice(&trailer[0..6]);
        key
    }

    pub fn key_b(&self, sector: usize) -> [u8; 6] {
        let trailer = self.memory[Self::trailer_block_of_sector(sector)];
        let mut key = [0u8; 6];
        key.copy_from_slice(&trailer[10..16]);
        key
    }

    pub fn access_bits(&self, sector: usize) -> crate::hf::tag14a::AccessBits {
        let trailer = self.memory[Self::trailer_block_of_sector(sector)];
        let mut b = [0u8; 4];
        b.copy_from_slice(&trailer[6..10]);
        crate::hf::tag14a::AccessBits::decode(&b)
    }

    /// Serialized layout: `coll_res(3) + config(1) + memory(block_count*16)`.
    pub fn to_bytes(&self, out: &mut [u8]) -> usize {
        out[0] = self.coll_res.sak;
        out[1..3].copy_from_slice(&self.coll_res.atqa);
        out[3] = self.config.write_mode.to_u8()
            | ((self.config.use_mf1_coll_res as u8) << 2)
            | ((self.config.gen1a_magic as u8) << 3)
            | ((self.config.gen2_magic as u8) << 4)
            | ((self.config.detection_enable as u8) << 5);
        let mut off = 4;
        for b in 0..self.block_count {
            out[off..off + 16].copy_from_slice(&self.memory[b]);
            off += 16;
        }
        off
    }

    pub fn load_from_bytes(&mut self, buf: &[u8]) {
        if buf.len() < 4 {
            return;
        }
        self.coll_res.sak = buf[0];
        self.coll_res.atqa.copy_from_slice(&buf[1..3]);
        let flags = buf[3];
        self.config.write_mode = WriteMode::from_u8(flags & 0x03);
        self.config.use_mf1_coll_res = flags & 0x04 != 0;
        self.config.gen1a_magic = flags & 0x08 != 0;
        self.config.gen2_magic = flags & 0x10 != 0;
        self.config.detection_enable = flags & 0x20 != 0;

        let mut off = 4;
        for b in 0..self.block_count {
            if off + 16 > buf.len() {
                break;
            }
            self.memory[b].copy_from_slice(&buf[off..off + 16]);
            off += 16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_of_block_covers_both_block_strides() {
        assert_eq!(Mf1Image::sector_of_block(0), 0);
        assert_eq!(Mf1Image::sector_of_block(3), 0);
        assert_eq!(Mf1Image::sector_of_block(4), 1);
        assert_eq!(Mf1Image::sector_of_block(127), 31);
        assert_eq!(Mf1Image::sector_of_block(128), 32);
        assert_eq!(Mf1Image::sector_of_block(143), 32);
        assert_eq!(Mf1Image::sector_of_block(144), 33);
    }

    #[test]
    fn is_trailer_matches_last_block_of_each_sector() {
        assert!(Mf1Image::is_trailer(3));
        assert!(!Mf1Image::is_trailer(0));
        assert!(!Mf1Image::is_trailer(2));
        assert!(Mf1Image::is_trailer(7));
        assert!(Mf1Image::is_trailer(143));
        assert!(!Mf1Image::is_trailer(128));
    }

    #[test]
    fn blank_1k_has_default_transport_keys_and_block_count() {
        let img = Mf1Image::blank(TagSpecific::Mifare1K);
        assert_eq!(img.block_count, 64);
        assert_eq!(img.key_a(0), [0xFF; 6]);
        assert_eq!(img.key_b(0), [0xFF; 6]);
        assert_eq!(img.key_a(15), [0xFF; 6]);
    }

    #[test]
    fn to_bytes_then_load_from_bytes_round_trips() {
        let mut img = Mf1Image::blank(TagSpecific::MifareMini);
        img.config.gen1a_magic = true;
        img.config.write_mode = WriteMode::Shadow;
        *img.block_mut(1).unwrap() = [0x42; 16];

        let mut buf = [0u8; 4 + 20 * 16];
        let n = img.to_bytes(&mut buf);

        let mut restored = Mf1Image::blank(TagSpecific::MifareMini);
        restored.load_from_bytes(&buf[..n]);

        assert_eq!(restored.config.gen1a_magic, true);
        assert_eq!(restored.config.write_mode, WriteMode::Shadow);
        assert_eq!(restored.block(1), Some(&[0x42; 16]));
        assert_eq!(restored.coll_res.sak, img.coll_res.sak);
    }

    #[test]
    fn write_mode_encodes_and_decodes_every_variant() {
        for m in [WriteMode::Normal, WriteMode::Denied, WriteMode::Deceive, WriteMode::Shadow] {
            assert_eq!(WriteMode::from_u8(m.to_u8()), m);
        }
    }
}
