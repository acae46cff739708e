//! Firmware entry point. Boots the ESP-IDF runtime (`link_patches`,
//! `EspLogger`, `Peripherals::take`, NVS partition), then wires up the
//! dual-role RFID engine: a `Core` aggregate (slot model, mode controller,
//! auth log, optional reader session) driven by a transport hub that
//! auto-selects between USB-CDC and BLE-NUS
//! single-threaded cooperative main loop.

mod auth_log;
mod core;
mod crypto1;
mod dispatch;
mod error;
mod hf;
mod lf;
mod mode;
mod peripheral;
mod persist;
mod slot;
mod tagtypes;
mod transport;

use esp_idf_svc::hal::prelude::Peripherals;

use crate::core::{Core, ReaderOps};
use crate::persist::nvs::NvsStore;
use crate::transport::ble_nus::BleNusTransport;
use crate::transport::usb_cdc::UsbCdcTransport;
use crate::transport::TransportHub;

/// RC522 I2C address on the reference wiring.
#[cfg(feature = "reader-mode")]
const MFRC522_I2C_ADDR: u8 = 0x28;

const BLE_DEVICE_NAME: &str = "DualTag";

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let nvs_partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    let nvs = esp_idf_svc::nvs::EspDefaultNvs::new(nvs_partition, "dualtag", true)?;
    let store: Box<dyn persist::KvStore + Send> = Box::new(NvsStore::new(nvs));

    log_heap();

    #[cfg(feature = "reader-mode")]
    let reader: Option<Box<dyn ReaderOps + Send>> = {
        let i2c_config = esp_idf_svc::hal::i2c::config::Config::new().baudrate(400_000.into());
        let i2c = esp_idf_svc::hal::i2c::I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio8,
            peripherals.pins.gpio9,
            &i2c_config,
        )?;
        let driver = peripheral::mfrc522::drivers::I2CDriver::new(i2c, MFRC522_I2C_ADDR);
        let mut pcd = hf::pcd::PcdReader::new(driver);
        ReaderOps::reset(&mut pcd).map_err(|e| anyhow::anyhow!("rc522 reset failed: {:?}", e))?;
        let boxed: Box<dyn ReaderOps + Send> = Box::new(pcd);
        Some(boxed)
    };
    #[cfg(not(feature = "reader-mode"))]
    let reader: Option<Box<dyn ReaderOps + Send>> = None;

    let mut core = Core::new(store, reader);
    log::info!(
        "slots loaded, active slot {}",
        core.slots.config.active
    );

    let uart_config = esp_idf_svc::hal::uart::config::Config::new().baudrate(115_200.into());
    let usb_uart = esp_idf_svc::hal::uart::UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio43,
        peripherals.pins.gpio44,
        Option::<esp_idf_svc::hal::gpio::AnyIOPin>::None,
        Option::<esp_idf_svc::hal::gpio::AnyIOPin>::None,
        &uart_config,
    )?;
    let usb = UsbCdcTransport::new(usb_uart);
    let ble = BleNusTransport::new(BLE_DEVICE_NAME);
    let mut hub = TransportHub::new(usb, ble);

    let mut lf_pin = esp_idf_svc::hal::gpio::PinDriver::output(peripherals.pins.gpio5)?;

    log::info!("dual-role RFID core ready");

    // Single-threaded cooperative loop: transport receive-to-frame
    // feed, frame dispatch, then (when in Tag mode) an LF broadcast tick.
    // Button/LED/battery processing are external collaborators and are not driven here.
    loop {
        if let Some(frame) = hub.poll() {
            let reply = dispatch::dispatch(&mut core, frame);
            if let Err(e) = hub.reply(&reply) {
                log::warn!("reply send failed: {:?}", e);
            }
        }

        if core.mode.current() == mode::Mode::Tag {
            lf_tick(&mut core, &mut lf_pin);
        }

        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

/// Drives one Manchester half-bit of the active slot's LF broadcast onto
/// the modulator GPIO. HF tag emulation needs a field-sense
/// front-end this reference board's RC522 cannot provide (RC522 is a
/// reader-only chip); that peripheral binding is the same class of
/// board-specific collaborator this firmware already leaves external for
/// other targets, so only the LF path is pumped from this loop. `core.picc`
/// remains fully exercisable through the HF-emulator dispatcher commands
/// and the unit test suite.
fn lf_tick(core: &mut Core, pin: &mut esp_idf_svc::hal::gpio::PinDriver<'_, impl esp_idf_svc::hal::gpio::Pin, esp_idf_svc::hal::gpio::Output>) {
    let Some(lf) = core.lf.as_mut() else { return };
    if lf.state == lf::emulator::LfState::Idle {
        lf.on_sense();
    }
    if lf.state == lf::emulator::LfState::Sensing {
        lf.start_emulating();
    }
    let Some(bits) = lf.next_broadcast() else { return };
    for half_bit in bits {
        let _ = if half_bit {
            pin.set_high()
        } else {
            pin.set_low()
        };
        esp_idf_svc::hal::delay::Ets::delay_us(lf::emulator::HALF_BIT_US);
    }
}

fn log_heap() {
    unsafe {
        use esp_idf_svc::sys::{heap_caps_get_free_size, MALLOC_CAP_INTERNAL};
        log::info!(
            "free internal heap: {} KB",
            heap_caps_get_free_size(MALLOC_CAP_INTERNAL) / 1024
        );
    }
}
