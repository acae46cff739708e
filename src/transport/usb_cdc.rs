//! USB-CDC transport, wrapping `esp_idf_svc::hal::uart::UartDriver`
//! the same way `peripheral::mfrc522::drivers::I2CDriver` wraps
//! `esp_idf_svc::hal::i2c::I2cDriver`: the ESP32's USB-serial/JTAG bridge
//! enumerates to the host as a CDC-ACM device sitting on top of the same
//! blocking read/write UART HAL surface.

use esp_idf_svc::hal::delay::NON_BLOCK;
use esp_idf_svc::hal::uart::UartDriver;

use super::{Transport, TransportError};

pub struct UsbCdcTransport<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UsbCdcTransport<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl<'d> Transport for UsbCdcTransport<'d> {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        self.uart.read(buf, NON_BLOCK).unwrap_or(0)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.uart.write(data).map(|_| ()).map_err(|_| TransportError::Io)
    }

    fn is_open(&self) -> bool {
        // The safe UART wrapper has no DTR/line-state probe; USB-CDC
        // enumeration state is approximated as "always open" and left to
        // the BLE side to yield to when a host is actually driving this
        // link (host silence just means no bytes ever arrive).
        true
    }
}
