//! Board pins over sysfs GPIO
//!
//! Function locks live in memory and last as long as the process. Pins are
//! exported on first use.

use std::collections::{HashMap, HashSet};

use embedded_hal::digital::PinState;
use linux_embedded_hal::sysfs_gpio::{self, Direction, Pin};
use log::{debug, warn};
use lumen_hal::{BoardPins, BoardType, LockAction, PinError, PinFunction, PinMode};

use crate::config::BoardConfig;

/// Convert a sysfs error to a pin error
pub(crate) fn gpio_error(pin: u8, e: sysfs_gpio::Error) -> PinError {
    debug!("GPIO {}: {}", pin, e);
    match e {
        sysfs_gpio::Error::Unsupported(_) => PinError::Unsupported,
        _ => PinError::Io,
    }
}

/// Pin capability and function locks of a Linux board
pub struct LinuxBoard {
    board: BoardType,
    /// Empty means every pin supports every function
    capabilities: HashMap<u8, Vec<PinFunction>>,
    locks: HashMap<u8, PinFunction>,
    exported: HashSet<u8>,
}

impl LinuxBoard {
    /// Build the capability table from `config`
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            board: config.board,
            capabilities: config
                .pins
                .iter()
                .map(|pin| (pin.number, pin.functions.clone()))
                .collect(),
            locks: HashMap::new(),
            exported: HashSet::new(),
        }
    }

    fn check_pin(&self, pin: u8) -> Result<(), PinError> {
        if self.capabilities.is_empty() || self.capabilities.contains_key(&pin) {
            Ok(())
        } else {
            Err(PinError::InvalidPin)
        }
    }

    fn supports(&self, pin: u8, function: PinFunction) -> Result<(), PinError> {
        if self.capabilities.is_empty() {
            return Ok(());
        }
        match self.capabilities.get(&pin) {
            None => Err(PinError::InvalidPin),
            Some(functions) if functions.contains(&function) => Ok(()),
            Some(_) => Err(PinError::Unsupported),
        }
    }

    /// Fail if `pin` is locked to anything but digital I/O
    fn check_digital(&self, pin: u8) -> Result<(), PinError> {
        self.check_pin(pin)?;
        match self.locks.get(&pin) {
            Some(held) if *held != PinFunction::Digital => Err(PinError::Locked),
            _ => Ok(()),
        }
    }

    /// Export `pin` if this process has not yet
    pub(crate) fn gpio(&mut self, pin: u8) -> Result<Pin, PinError> {
        self.check_pin(pin)?;
        let gpio = Pin::new(u64::from(pin));
        if !self.exported.contains(&pin) {
            gpio.export().map_err(|e| gpio_error(pin, e))?;
            self.exported.insert(pin);
        }
        Ok(gpio)
    }

    /// Function `pin` is locked to, if any
    pub fn lock_holder(&self, pin: u8) -> Option<PinFunction> {
        self.locks.get(&pin).copied()
    }
}

impl BoardPins for LinuxBoard {
    fn board_type(&self) -> Result<BoardType, PinError> {
        Ok(self.board)
    }

    fn verify_pin_function(
        &mut self,
        pin: u8,
        function: PinFunction,
        lock: LockAction,
    ) -> Result<(), PinError> {
        self.supports(pin, function)?;

        if let Some(held) = self.locks.get(&pin) {
            if *held != function {
                return Err(PinError::Locked);
            }
        }

        match lock {
            LockAction::NoLock => {}
            LockAction::Lock => {
                self.locks.insert(pin, function);
            }
            LockAction::Unlock => {
                self.locks.remove(&pin);
            }
        }
        Ok(())
    }

    fn set_pin_mode(&mut self, pin: u8, mode: PinMode, pull_up: bool) -> Result<(), PinError> {
        self.check_digital(pin)?;
        let gpio = self.gpio(pin)?;
        if pull_up {
            // sysfs has no bias control; the board's default bias stays
            warn!("GPIO {}: pull-up not available through sysfs", pin);
        }
        let direction = match mode {
            PinMode::Input => Direction::In,
            PinMode::Output => Direction::Out,
        };
        gpio.set_direction(direction)
            .map_err(|e| gpio_error(pin, e))
    }

    fn set_pin_state(&mut self, pin: u8, state: PinState) -> Result<(), PinError> {
        self.check_digital(pin)?;
        let gpio = self.gpio(pin)?;
        let value = match state {
            PinState::Low => 0,
            PinState::High => 1,
        };
        gpio.set_value(value).map_err(|e| gpio_error(pin, e))
    }

    fn get_pin_state(&mut self, pin: u8) -> Result<PinState, PinError> {
        self.check_digital(pin)?;
        let gpio = self.gpio(pin)?;
        match gpio.get_value().map_err(|e| gpio_error(pin, e))? {
            0 => Ok(PinState::Low),
            _ => Ok(PinState::High),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(text: &str) -> LinuxBoard {
        LinuxBoard::new(&BoardConfig::from_toml_str(text).unwrap())
    }

    #[test]
    fn test_capability_table() {
        let mut board = board(
            r#"
            board = "pi2-bare"
            [[pin]]
            number = 2
            functions = ["digital", "i2c"]
            "#,
        );

        assert_eq!(board.board_type(), Ok(BoardType::Pi2Bare));
        assert_eq!(
            board.verify_pin_function(2, PinFunction::I2c, LockAction::NoLock),
            Ok(())
        );
        assert_eq!(
            board.verify_pin_function(2, PinFunction::Spi, LockAction::NoLock),
            Err(PinError::Unsupported)
        );
        assert_eq!(
            board.verify_pin_function(40, PinFunction::Digital, LockAction::NoLock),
            Err(PinError::InvalidPin)
        );
    }

    #[test]
    fn test_function_locks() {
        let mut board = board(r#"board = "mbm-bare""#);

        board
            .verify_pin_function(9, PinFunction::Spi, LockAction::Lock)
            .unwrap();
        assert_eq!(board.lock_holder(9), Some(PinFunction::Spi));
        assert_eq!(
            board.verify_pin_function(9, PinFunction::Digital, LockAction::Lock),
            Err(PinError::Locked)
        );
        // Only the holder can release the lock
        assert_eq!(
            board.verify_pin_function(9, PinFunction::Digital, LockAction::Unlock),
            Err(PinError::Locked)
        );

        board
            .verify_pin_function(9, PinFunction::Spi, LockAction::Unlock)
            .unwrap();
        assert_eq!(board.lock_holder(9), None);
        board
            .verify_pin_function(9, PinFunction::Digital, LockAction::NoLock)
            .unwrap();
    }

    #[test]
    fn test_unlisted_pin_is_rejected_before_sysfs() {
        let mut board = board(
            r#"
            board = "pi2-bare"
            [[pin]]
            number = 4
            functions = ["digital"]
            "#,
        );
        assert_eq!(
            board.set_pin_mode(60, PinMode::Output, false),
            Err(PinError::InvalidPin)
        );
        assert_eq!(board.get_pin_state(60), Err(PinError::InvalidPin));
    }

    #[test]
    fn test_locked_pin_rejects_digital_access() {
        let mut board = board(r#"board = "pi2-bare""#);
        board
            .verify_pin_function(200, PinFunction::I2c, LockAction::Lock)
            .unwrap();

        // Rejected before sysfs is touched
        assert_eq!(
            board.set_pin_mode(200, PinMode::Output, false),
            Err(PinError::Locked)
        );
        assert_eq!(
            board.set_pin_state(200, PinState::High),
            Err(PinError::Locked)
        );
        assert_eq!(board.get_pin_state(200), Err(PinError::Locked));
        assert!(!board.exported.contains(&200));
    }

    #[test]
    fn test_digital_lock_holder_keeps_access() {
        let mut board = board(
            r#"
            board = "pi2-bare"
            [[pin]]
            number = 4
            functions = ["digital"]
            "#,
        );
        board
            .verify_pin_function(4, PinFunction::Digital, LockAction::Lock)
            .unwrap();
        assert_eq!(board.check_digital(4), Ok(()));
        assert_eq!(board.check_digital(5), Err(PinError::InvalidPin));
    }
}
