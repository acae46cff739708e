//! BLE NUS-alike transport, built on `esp32-nimble`. Exposes a
//! Nordic-UART-Service-shaped GATT profile: a write characteristic the
//! host sends command frames to, and a notify characteristic this
//! firmware streams replies through.
//!
//! Incoming writes arrive on NimBLE's own callback thread, so bytes are
//! buffered into a small mutex-guarded ring rather than read synchronously;
//! `try_read` drains whatever has queued since the last poll.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEAdvertisementData, BLECharacteristic, BLEDevice, NimbleProperties};

use super::{Transport, TransportError};

const NUS_SERVICE_UUID: u32 = 0x6E40_0001;
const NUS_RX_CHAR_UUID: u32 = 0x6E40_0002; // host writes commands here
const NUS_TX_CHAR_UUID: u32 = 0x6E40_0003; // this device notifies replies here

const RX_RING_CAPACITY: usize = 1024;

pub struct BleNusTransport {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx_char: Arc<Mutex<BLECharacteristic>>,
    connected: Arc<Mutex<bool>>,
}

impl BleNusTransport {
    pub fn new(device_name: &str) -> Self {
        let device = BLEDevice::take();
        let server = device.get_server();

        let connected = Arc::new(Mutex::new(false));
        let connected_on_connect = connected.clone();
        let connected_on_disconnect = connected.clone();
        server.on_connect(move |_server, _desc| {
            *connected_on_connect.lock().unwrap() = true;
        });
        server.on_disconnect(move |_desc, _reason| {
            *connected_on_disconnect.lock().unwrap() = false;
        });

        let service = server.create_service(BleUuid::Uuid32(NUS_SERVICE_UUID));

        let rx = Arc::new(Mutex::new(VecDeque::with_capacity(RX_RING_CAPACITY)));
        let rx_for_write = rx.clone();
        let rx_char = service
            .lock()
            .create_characteristic(BleUuid::Uuid32(NUS_RX_CHAR_UUID), NimbleProperties::WRITE);
        rx_char.lock().on_write(move |args| {
            let mut ring = rx_for_write.lock().unwrap();
            for &b in args.recv_data() {
                if ring.len() == RX_RING_CAPACITY {
                    ring.pop_front();
                }
                ring.push_back(b);
            }
        });

        let tx_char = service
            .lock()
            .create_characteristic(BleUuid::Uuid32(NUS_TX_CHAR_UUID), NimbleProperties::NOTIFY);

        let advertising = device.get_advertising();
        advertising
            .lock()
            .set_data(
                BLEAdvertisementData::new()
                    .name(device_name)
                    .add_service_uuid(BleUuid::Uuid32(NUS_SERVICE_UUID)),
            )
            .ok();
        advertising.lock().start().ok();

        Self {
            rx,
            tx_char,
            connected,
        }
    }
}

impl Transport for BleNusTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        let mut ring = self.rx.lock().unwrap();
        let n = ring.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = ring.pop_front().unwrap();
        }
        n
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut ch = self.tx_char.lock().unwrap();
        ch.set_value(data);
        ch.notify();
        Ok(())
    }

    fn is_open(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}
