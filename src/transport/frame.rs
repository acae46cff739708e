//! Binary command-frame codec:
//!
//! `SOF(1)=0x11 LRC1(1) CMD(2) STATUS(2) LEN(2) LRC2(1) DATA(LEN) LRC3(1)`
//!
//! All multi-byte fields are big-endian. Every LRC is an 8-bit two's
//! complement checksum over the bytes preceding it in its span. The parser
//! runs byte-at-a-time and resets to hunting for `SOF` on any LRC/SOF
//! mismatch, on `LEN > 512`, or while a frame is already pending.

pub const SOF: u8 = 0x11;
pub const MAX_DATA_LEN: usize = 512;
pub const HEADER_LEN: usize = 9; // SOF LRC1 CMD(2) STATUS(2) LEN(2) LRC2

#[derive(Debug, Clone)]
pub struct Frame {
    pub cmd: u16,
    pub status: u16,
    pub data: heapless::Vec<u8, MAX_DATA_LEN>,
}

/// Two's-complement LRC: the checksum byte that makes the sum of every
/// byte in the span (checksum included) equal zero mod 256.
pub fn lrc(bytes: &[u8]) -> u8 {
    (0u8).wrapping_sub(bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)))
}

impl Frame {
    pub fn new(cmd: u16, status: u16, data: &[u8]) -> Self {
        let mut v = heapless::Vec::new();
        let _ = v.extend_from_slice(&data[..data.len().min(MAX_DATA_LEN)]);
        Self { cmd, status, data: v }
    }

    /// Serializes into `out`, returning the number of bytes written, or
    /// `None` if `out` is too small.
    pub fn encode(&self, out: &mut [u8]) -> Option<usize> {
        let total = HEADER_LEN + self.data.len() + 1;
        if out.len() < total {
            return None;
        }
        out[0] = SOF;
        // out[1] (LRC1) filled after header fields are placed.
        out[2..4].copy_from_slice(&self.cmd.to_be_bytes());
        out[4..6].copy_from_slice(&self.status.to_be_bytes());
        out[6..8].copy_from_slice(&(self.data.len() as u16).to_be_bytes());
        out[1] = lrc(&out[0..1]);
        out[8] = lrc(&out[0..8]);
        out[9..9 + self.data.len()].copy_from_slice(&self.data);
        let lrc3_pos = 9 + self.data.len();
        out[lrc3_pos] = lrc(&out[9..lrc3_pos]);
        Some(total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    HuntSof,
    WantLrc1,
    WantCmdStatusLen { have: u8 },
    WantLrc2,
    WantData { have: usize },
    WantLrc3,
}

/// Byte-at-a-time frame parser. Feed bytes with `push`; a `Some(Frame)`
/// result signals a complete, integrity-checked frame. Any framing error
/// silently resets the parser to `HuntSof` rather than surfacing an error;
/// the dispatcher only ever sees well-formed frames
pub struct FrameParser {
    state: ParserState,
    header: [u8; HEADER_LEN],
    data: heapless::Vec<u8, MAX_DATA_LEN>,
    cmd: u16,
    status: u16,
    pending_len: u16,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self {
            state: ParserState::HuntSof,
            header: [0; HEADER_LEN],
            data: heapless::Vec::new(),
            cmd: 0,
            status: 0,
            pending_len: 0,
        }
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a frame is mid-flight (used by the dispatcher to know
    /// it must not feed more bytes until the current frame resolves).
    pub fn is_pending(&self) -> bool {
        !matches!(self.state, ParserState::HuntSof)
    }

    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            ParserState::HuntSof => {
                if byte == SOF {
                    self.header[0] = byte;
                    self.state = ParserState::WantLrc1;
                }
                None
            }
            ParserState::WantLrc1 => {
                self.header[1] = byte;
                if lrc(&self.header[0..1]) != byte {
                    self.reset();
                    return None;
                }
                self.state = ParserState::WantCmdStatusLen { have: 0 };
                None
            }
            ParserState::WantCmdStatusLen { have } => {
                self.header[2 + have as usize] = byte;
                if have + 1 == 6 {
                    self.cmd = u16::from_be_bytes([self.header[2], self.header[3]]);
                    self.status = u16::from_be_bytes([self.header[4], self.header[5]]);
                    self.pending_len = u16::from_be_bytes([self.header[6], self.header[7]]);
                    if self.pending_len as usize > MAX_DATA_LEN {
                        self.reset();
                        return None;
                    }
                    self.state = ParserState::WantLrc2;
                } else {
                    self.state = ParserState::WantCmdStatusLen { have: have + 1 };
                }
                None
            }
            ParserState::WantLrc2 => {
                self.header[8] = byte;
                if lrc(&self.header[0..8]) != byte {
                    self.reset();
                    return None;
                }
                self.data.clear();
                if self.pending_len == 0 {
                    self.state = ParserState::WantLrc3;
                } else {
                    self.state = ParserState::WantData { have: 0 };
                }
                None
            }
            ParserState::WantData { have } => {
                let _ = self.data.push(byte);
                if have + 1 == self.pending_len as usize {
                    self.state = ParserState::WantLrc3;
                } else {
                    self.state = ParserState::WantData { have: have + 1 };
                }
                None
            }
            ParserState::WantLrc3 => {
                let expected = lrc(&self.data);
                self.reset();
                if expected != byte {
                    return None;
                }
                Some(Frame {
                    cmd: self.cmd,
                    status: self.status,
                    data: core::mem::take(&mut self.data),
                })
            }
        }
    }

    fn reset(&mut self) {
        self.state = ParserState::HuntSof;
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut FrameParser, bytes: &[u8]) -> Option<Frame> {
        let mut out = None;
        for &b in bytes {
            if let Some(f) = parser.push(b) {
                out = Some(f);
            }
        }
        out
    }

    #[test]
    fn encode_decode_round_trip() {
        let frame = Frame::new(1000, 0x68, &[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut buf = [0u8; 64];
        let n = frame.encode(&mut buf).unwrap();
        let mut parser = FrameParser::new();
        let decoded = feed(&mut parser, &buf[..n]).expect("frame should parse");
        assert_eq!(decoded.cmd, 1000);
        assert_eq!(decoded.status, 0x68);
        assert_eq!(&decoded.data[..], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    /// Decodes `11 EF 03 E8 00 00 00 00 00 18 00` as a device-info request.
    #[test]
    fn scenario_s1_device_get_info_request() {
        let bytes = [0x11, 0xEF, 0x03, 0xE8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x00];
        let mut parser = FrameParser::new();
        let frame = feed(&mut parser, &bytes).expect("S1 frame should parse");
        assert_eq!(frame.cmd, 1000);
        assert_eq!(frame.status, 0);
        assert!(frame.data.is_empty());
    }

    #[test]
    fn garbage_before_sof_is_skipped() {
        let frame = Frame::new(2000, 0, &[1, 2, 3]);
        let mut buf = [0u8; 64];
        let n = frame.encode(&mut buf).unwrap();
        let mut noisy = heapless::Vec::<u8, 128>::new();
        let _ = noisy.extend_from_slice(&[0xFF, 0x00, 0xAB]);
        let _ = noisy.extend_from_slice(&buf[..n]);

        let mut parser = FrameParser::new();
        let decoded = feed(&mut parser, &noisy).expect("frame should parse after garbage");
        assert_eq!(decoded.cmd, 2000);
    }

    #[test]
    fn bad_lrc2_resets_parser() {
        let frame = Frame::new(3000, 0, &[9, 9]);
        let mut buf = [0u8; 64];
        let n = frame.encode(&mut buf).unwrap();
        buf[8] ^= 0xFF; // corrupt LRC2
        let mut parser = FrameParser::new();
        assert!(feed(&mut parser, &buf[..n]).is_none());
        assert!(!parser.is_pending());
    }

    #[test]
    fn refuses_new_input_while_pending() {
        let mut parser = FrameParser::new();
        let _ = parser.push(SOF);
        assert!(parser.is_pending());
    }
}
