//! Viking 125 kHz tag framing: a 64-bit frame of a 24-bit
//! header, a 32-bit ID, and an 8-bit checksum (XOR of the ID bytes, then
//! XORed with 0x5A).

pub const FRAME_BITS: usize = 64;
pub const HEADER: u32 = 0xF2_0000; // 24-bit fixed header
pub const DEFAULT_ID: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

fn checksum(id: &[u8; 4]) -> u8 {
    id.iter().fold(0u8, |a, b| a ^ b) ^ 0x5A
}

pub fn encode_frame(id: &[u8; 4]) -> [bool; FRAME_BITS] {
    let mut bits = [false; FRAME_BITS];
    let mut pos = 0;
    for i in (0..24).rev() {
        bits[pos] = (HEADER >> i) & 1 != 0;
        pos += 1;
    }
    for &byte in id {
        for i in (0..8).rev() {
            bits[pos] = (byte >> i) & 1 != 0;
            pos += 1;
        }
    }
    let crc = checksum(id);
    for i in (0..8).rev() {
        bits[pos] = (crc >> i) & 1 != 0;
        pos += 1;
    }
    debug_assert_eq!(pos, FRAME_BITS);
    bits
}

pub fn decode_frame(bits: &[bool; FRAME_BITS]) -> Option<[u8; 4]> {
    let mut header = 0u32;
    for &b in &bits[0..24] {
        header = (header << 1) | b as u32;
    }
    if header != HEADER {
        return None;
    }
    let mut id = [0u8; 4];
    for (i, chunk) in bits[24..56].chunks(8).enumerate() {
        let mut byte = 0u8;
        for &b in chunk {
            byte = (byte << 1) | b as u8;
        }
        id[i] = byte;
    }
    let mut crc = 0u8;
    for &b in &bits[56..64] {
        crc = (crc << 1) | b as u8;
    }
    if crc != checksum(&id) {
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_default_id() {
        let frame = encode_frame(&DEFAULT_ID);
        assert_eq!(decode_frame(&frame), Some(DEFAULT_ID));
    }

    #[test]
    fn bad_checksum_rejected() {
        let mut frame = encode_frame(&DEFAULT_ID);
        frame[63] = !frame[63];
        assert_eq!(decode_frame(&frame), None);
    }
}
