//! Mode controller: mutual exclusion between reader mode
//! (this device drives its own RC522 against external cards) and tag
//! mode (this device answers another reader's field as an emulated
//! card). Both modes want exclusive use of the antenna/coil, so only one
//! may be active at a time; `None` is the power-up/idle default.

use crate::error::ReaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    None,
    Reader,
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    /// The antenna is already claimed by the other mode.
    Busy,
}

impl From<ModeError> for ReaderError {
    fn from(_: ModeError) -> Self {
        ReaderError::ProtocolErr
    }
}

pub struct ModeController {
    mode: Mode,
}

impl Default for ModeController {
    fn default() -> Self {
        Self { mode: Mode::None }
    }
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Mode {
        self.mode
    }

    pub fn enter_reader(&mut self) -> Result<(), ModeError> {
        match self.mode {
            Mode::Tag => Err(ModeError::Busy),
            Mode::None | Mode::Reader => {
                self.mode = Mode::Reader;
                Ok(())
            }
        }
    }

    pub fn enter_tag(&mut self) -> Result<(), ModeError> {
        match self.mode {
            Mode::Reader => Err(ModeError::Busy),
            Mode::None | Mode::Tag => {
                self.mode = Mode::Tag;
                Ok(())
            }
        }
    }

    pub fn enter_none(&mut self) {
        self.mode = Mode::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_and_tag_are_mutually_exclusive() {
        let mut m = ModeController::new();
        m.enter_reader().unwrap();
        assert_eq!(m.enter_tag(), Err(ModeError::Busy));
        m.enter_none();
        m.enter_tag().unwrap();
        assert_eq!(m.enter_reader(), Err(ModeError::Busy));
    }

    #[test]
    fn re_entering_the_same_mode_is_a_no_op() {
        let mut m = ModeController::new();
        m.enter_reader().unwrap();
        assert!(m.enter_reader().is_ok());
    }
}
