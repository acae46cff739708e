//! 14A PCD reader: the reader-mode session wrapping the
//! register-level `MFRC522<D>` driver with antenna/timeout control,
//! REQA/WUPA scanning, cascade-level UID acquisition, RATS, and the MF1
//! authenticate/read/write primitives the toolbox (§4.8) builds on.

use esp_idf_svc::sys::TickType_t;

use crate::error::ReaderError;
use crate::hf::tag14a::{CascadeLevel, Tag14aSnapshot};
use crate::peripheral::mfrc522::consts::{PCDErrorCode, PICCCommand, Uid, UidSize};
use crate::peripheral::mfrc522::{MfrcDriver, MFRC522};

pub const DEFAULT_EXCHANGE_TIMEOUT_MS: u64 = 25;
pub const DEFAULT_ANTENNA_RESET_DELAY_MS: u64 = 100;

impl From<PCDErrorCode> for ReaderError {
    fn from(e: PCDErrorCode) -> Self {
        match e {
            PCDErrorCode::Collision => ReaderError::Collision,
            PCDErrorCode::Timeout => ReaderError::Timeout,
            PCDErrorCode::NoRoom => ReaderError::NoRoom,
            PCDErrorCode::InternalError => ReaderError::InternalError,
            PCDErrorCode::Invalid => ReaderError::Invalid,
            PCDErrorCode::CrcWrong => ReaderError::CrcErr,
            PCDErrorCode::MifareNack => ReaderError::AuthFail,
            PCDErrorCode::Error
            | PCDErrorCode::Unknown
            | PCDErrorCode::SpiError(_)
            | PCDErrorCode::I2cError(_)
            | PCDErrorCode::DriverError => ReaderError::ProtocolErr,
        }
    }
}

pub struct PcdReader<D: MfrcDriver> {
    chip: MFRC522<D>,
    timeout_ticks: TickType_t,
}

impl<D: MfrcDriver> PcdReader<D> {
    pub fn new(driver: D) -> Self {
        Self {
            chip: MFRC522::new(driver),
            timeout_ticks: DEFAULT_EXCHANGE_TIMEOUT_MS as TickType_t,
        }
    }

    pub fn timeout_set(&mut self, millis: u64) {
        self.timeout_ticks = millis as TickType_t;
    }

    pub fn antenna_on(&mut self) -> Result<(), ReaderError> {
        self.chip.pcd_antenna_on(self.timeout_ticks).map_err(Into::into)
    }

    pub fn antenna_off(&mut self) -> Result<(), ReaderError> {
        self.chip.pcd_antenna_off(self.timeout_ticks).map_err(Into::into)
    }

    pub fn reset(&mut self) -> Result<(), ReaderError> {
        self.chip.pcd_init(self.timeout_ticks)?;
        Ok(())
    }

    pub fn halt_tag(&mut self) -> Result<(), ReaderError> {
        self.chip.picc_halta(self.timeout_ticks).map_err(Into::into)
    }

    pub fn bytes_transfer(
        &mut self,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<usize, ReaderError> {
        let mut rx_len = rx.len() as u8;
        self.chip
            .pcd_transceive_data(tx, tx.len() as u8, rx, Some(&mut rx_len), None, 0, false, self.timeout_ticks)?;
        Ok(rx_len as usize)
    }

    pub fn bits_transfer(
        &mut self,
        tx: &[u8],
        tx_valid_bits: u8,
        rx: &mut [u8],
    ) -> Result<(usize, u8), ReaderError> {
        let mut rx_len = rx.len() as u8;
        let mut valid_bits = tx_valid_bits;
        self.chip.pcd_transceive_data(
            tx,
            tx.len() as u8,
            rx,
            Some(&mut rx_len),
            Some(&mut valid_bits),
            0,
            false,
            self.timeout_ticks,
        )?;
        Ok((rx_len as usize, valid_bits))
    }

    /// Single REQA-based scan: ATQA, anticollision/select, and RATS if the
    /// resulting SAK indicates ISO-14443-4 support.
    pub fn scan_once(&mut self) -> Result<Tag14aSnapshot, ReaderError> {
        self.scan(PICCCommand::PICC_CMD_REQA)
    }

    /// WUPA-based scan: also wakes halted cards, used by the auto-sense
    /// loop.
    pub fn scan_auto(&mut self) -> Result<Tag14aSnapshot, ReaderError> {
        self.scan(PICCCommand::PICC_CMD_WUPA)
    }

    fn scan(&mut self, req_cmd: u8) -> Result<Tag14aSnapshot, ReaderError> {
        let mut atqa = [0u8; 2];
        let mut atqa_size = 2u8;
        let res = if req_cmd == PICCCommand::PICC_CMD_WUPA {
            self.chip.picc_wakeup_a(&mut atqa, &mut atqa_size, self.timeout_ticks)
        } else {
            self.chip.picc_request_a(&mut atqa, &mut atqa_size, self.timeout_ticks)
        };
        // A failed exchange must clear any stale "MFCrypto1On" bit before
        // the caller retries.
        if res.is_err() {
            let _ = self.chip.pcd_stop_crypto1(self.timeout_ticks);
        }
        res?;

        let mut uid = Uid {
            size: UidSize::Four.to_byte(),
            sak: 0,
            uid_bytes: [0; 10],
        };
        if self
            .chip
            .picc_select(&mut uid, 0, self.timeout_ticks)
            .is_err()
        {
            let _ = self.chip.pcd_stop_crypto1(self.timeout_ticks);
            return Err(ReaderError::TagLost);
        }

        let mut snapshot = Tag14aSnapshot {
            uid: uid.uid_bytes,
            uid_len: uid.size,
            sak: uid.sak,
            atqa,
            ats: None,
        };

        if snapshot.supports_rats() {
            snapshot.ats = self.request_ats().ok();
        }

        Ok(snapshot)
    }

    fn request_ats(&mut self) -> Result<([u8; 20], u8), ReaderError> {
        let mut buf = [0u8; 20];
        buf[0] = PICCCommand::PICC_CMD_RATS;
        buf[1] = 0x50; // FSDI=5, CID=0
        let mut rx = [0u8; 20];
        let n = self.bytes_transfer(&buf[..2], &mut rx)?;
        let mut ats = [0u8; 20];
        let len = n.min(20);
        ats[..len].copy_from_slice(&rx[..len]);
        Ok((ats, len as u8))
    }

    pub fn mf1_auth(
        &mut self,
        cmd: u8,
        block_addr: u8,
        key: &[u8; 6],
        uid: &Uid,
    ) -> Result<(), ReaderError> {
        self.chip
            .pcd_authenticate(cmd, block_addr, key, uid, self.timeout_ticks)
            .map_err(Into::into)
    }

    pub fn mf1_stop_crypto1(&mut self) -> Result<(), ReaderError> {
        self.chip.pcd_stop_crypto1(self.timeout_ticks).map_err(Into::into)
    }

    pub fn mf1_read(&mut self, block_addr: u8) -> Result<[u8; 16], ReaderError> {
        let mut buf = [0u8; 18];
        let mut size = 18u8;
        self.chip
            .mifare_read(block_addr, &mut buf, &mut size, self.timeout_ticks)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(&buf[..16]);
        Ok(out)
    }

    pub fn mf1_write(&mut self, block_addr: u8, data: &[u8; 16]) -> Result<(), ReaderError> {
        self.chip
            .mifare_write(block_addr, data, 16, self.timeout_ticks)
            .map_err(Into::into)
    }

    /// Passthrough for arbitrary byte frames, used by the dispatcher's raw
    /// 14A-exchange command.
    pub fn raw_cmd(&mut self, tx: &[u8], crc: bool, rx: &mut [u8]) -> Result<usize, ReaderError> {
        let mut rx_len = rx.len() as u8;
        self.chip.pcd_transceive_data(
            tx,
            tx.len() as u8,
            rx,
            Some(&mut rx_len),
            None,
            0,
            crc,
            self.timeout_ticks,
        )?;
        Ok(rx_len as usize)
    }

    pub fn cascade_level_of(uid_len: u8) -> Option<CascadeLevel> {
        CascadeLevel::from_uid_len(uid_len)
    }
}
