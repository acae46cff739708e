//! External interfaces: a byte-stream `Transport` abstraction
//! plus the frame codec (`frame.rs`). Two concrete transports are wired
//! up, USB-CDC and BLE-NUS, auto-selected by "whichever is open": the
//! host only ever has one of the two connected at a time on this class of
//! device.

pub mod ble_nus;
pub mod frame;
pub mod usb_cdc;

use frame::{Frame, FrameParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    NotOpen,
    Io,
}

/// A byte-stream carrier for framed commands. Implementations are
/// non-blocking on read (`try_read` returns `0` when nothing is pending)
/// and blocking on write (a reply frame is always small and bounded).
pub trait Transport {
    fn try_read(&mut self, buf: &mut [u8]) -> usize;
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn is_open(&self) -> bool;
}

/// Feeds whichever transport is currently open into a `FrameParser`,
/// handing back complete frames. Only one transport is polled per tick;
/// if neither is open, `poll` is a no-op. The host connects over USB CDC
/// or BLE NUS, whichever is open; simultaneous dual-link is not supported.
pub struct TransportHub<U: Transport, B: Transport> {
    usb: U,
    ble: B,
    parser: FrameParser,
    scratch: [u8; 256],
}

impl<U: Transport, B: Transport> TransportHub<U, B> {
    pub fn new(usb: U, ble: B) -> Self {
        Self {
            usb,
            ble,
            parser: FrameParser::new(),
            scratch: [0; 256],
        }
    }

    fn active(&mut self) -> Option<&mut dyn Transport> {
        if self.usb.is_open() {
            Some(&mut self.usb)
        } else if self.ble.is_open() {
            Some(&mut self.ble)
        } else {
            None
        }
    }

    /// Pumps one read from the active transport into the frame parser,
    /// returning a complete frame if one was just finished.
    pub fn poll(&mut self) -> Option<Frame> {
        let n = self.active()?.try_read(&mut self.scratch);
        let mut out = None;
        for &b in &self.scratch[..n] {
            if let Some(frame) = self.parser.push(b) {
                out = Some(frame);
            }
        }
        out
    }

    pub fn reply(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let mut buf = [0u8; frame::HEADER_LEN + frame::MAX_DATA_LEN + 1];
        let n = frame.encode(&mut buf).ok_or(TransportError::Io)?;
        if self.usb.is_open() {
            self.usb.write_all(&buf[..n])
        } else if self.ble.is_open() {
            self.ble.write_all(&buf[..n])
        } else {
            Err(TransportError::NotOpen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTransport {
        open: bool,
        inbound: heapless::Vec<u8, 64>,
        outbound: heapless::Vec<u8, 64>,
    }

    impl Transport for FakeTransport {
        fn try_read(&mut self, buf: &mut [u8]) -> usize {
            let n = self.inbound.len().min(buf.len());
            buf[..n].copy_from_slice(&self.inbound[..n]);
            let rest: heapless::Vec<u8, 64> = self.inbound[n..].iter().copied().collect();
            self.inbound = rest;
            n
        }

        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.outbound.extend_from_slice(data).map_err(|_| TransportError::Io)
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    /// USB wins when both transports happen to be open, matching the "one
    /// active link at a time" contract.
    #[test]
    fn usb_is_preferred_over_ble_when_both_are_open() {
        let mut usb = FakeTransport::default();
        usb.open = true;
        let mut ble = FakeTransport::default();
        ble.open = true;
        let mut hub = TransportHub::new(usb, ble);
        assert!(hub.active().is_some());
        let _ = hub.reply(&Frame::new(1, 0, &[]));
        assert!(!hub.usb.outbound.is_empty());
        assert!(hub.ble.outbound.is_empty());
    }

    #[test]
    fn poll_is_a_no_op_when_neither_transport_is_open() {
        let mut hub = TransportHub::new(FakeTransport::default(), FakeTransport::default());
        assert!(hub.poll().is_none());
    }

    #[test]
    fn poll_assembles_a_full_frame_fed_byte_by_byte() {
        let mut usb = FakeTransport::default();
        usb.open = true;
        let frame = Frame::new(1000, 0, &[0xAB]);
        let mut buf = [0u8; frame::HEADER_LEN + frame::MAX_DATA_LEN + 1];
        let n = frame.encode(&mut buf).unwrap();
        let _ = usb.inbound.extend_from_slice(&buf[..n]);

        let mut hub = TransportHub::new(usb, FakeTransport::default());
        let got = hub.poll().expect("frame should be complete after one read");
        assert_eq!(got.cmd, 1000);
        assert_eq!(&got.data[..], &[0xAB]);
    }

    #[test]
    fn reply_fails_when_nothing_is_open() {
        let mut hub = TransportHub::new(FakeTransport::default(), FakeTransport::default());
        assert_eq!(hub.reply(&Frame::new(1, 0, &[])), Err(TransportError::NotOpen));
    }
}
