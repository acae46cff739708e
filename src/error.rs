//! Crate-wide status taxonomy: the wire-facing projection of
//! every module's internal error type. Same shape as
//! `peripheral::mfrc522::consts::PCDErrorCode`: a flat enum with a byte
//! encoding used directly in the reply frame's STATUS field.

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    HfTagOk = 0x00,
    HfTagNo = 0x01,
    HfErrStat = 0x02,
    HfErrCrc = 0x03,
    HfCollision = 0x04,
    HfErrBcc = 0x05,
    Mf1ErrAuth = 0x06,
    HfErrParity = 0x07,
    HfErrAts = 0x08,
    LfTagOk = 0x40,
    Em410xNo = 0x41,
    ParErr = 0x60,
    DeviceModeError = 0x66,
    InvalidCmd = 0x67,
    Success = 0x68,
    NotImplemented = 0x69,
    FlashWriteFail = 0x70,
    FlashReadFail = 0x71,
    InvalidSlotType = 0x72,
    InvalidParams = 0x73,
}

impl StatusCode {
    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

impl core::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

/// Reader-side failure classification shared by the PCD (C2) and the
/// Crypto1 toolbox (C8). Any of these except `Ok` must surface as a
/// `StatusCode` in the reply frame; the `post` hook always turns the
/// antenna off regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    TagLost,
    ProtocolErr,
    ParityErr,
    CrcErr,
    Collision,
    AuthFail,
    Timeout,
    Bcc,
    Ats,
    InternalError,
    Invalid,
    NoRoom,
}

impl core::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl From<ReaderError> for StatusCode {
    fn from(e: ReaderError) -> Self {
        match e {
            ReaderError::TagLost => StatusCode::HfTagNo,
            ReaderError::ProtocolErr => StatusCode::HfErrStat,
            ReaderError::ParityErr => StatusCode::HfErrParity,
            ReaderError::CrcErr => StatusCode::HfErrCrc,
            ReaderError::Collision => StatusCode::HfCollision,
            ReaderError::AuthFail => StatusCode::Mf1ErrAuth,
            ReaderError::Ats => StatusCode::HfErrAts,
            ReaderError::Bcc => StatusCode::HfErrBcc,
            ReaderError::Timeout => StatusCode::HfTagNo,
            ReaderError::InternalError | ReaderError::Invalid | ReaderError::NoRoom => {
                StatusCode::HfErrStat
            }
        }
    }
}

/// Persistence-collaborator failure: a flash-full condition
/// triggers one automatic GC-and-retry before this surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    WriteFail,
    ReadFail,
}

impl From<FlashError> for StatusCode {
    fn from(e: FlashError) -> Self {
        match e {
            FlashError::WriteFail => StatusCode::FlashWriteFail,
            FlashError::ReadFail => StatusCode::FlashReadFail,
        }
    }
}
