//! Hardware peripheral drivers. Only the RC522 register-level driver is
//! carried here.

pub mod mfrc522;
