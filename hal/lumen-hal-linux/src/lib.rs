//! Linux userspace platform for Lumen
//!
//! Implements the board capability and both bus controllers on the kernel's
//! userspace interfaces:
//!
//! - I2C through `/dev/i2c-N` (`i2c-dev`)
//! - SPI through `/dev/spidevB.C`
//! - Pin mode/state and the SPI chip select through sysfs GPIO
//!
//! Which devices exist, and what each pin can do, comes from a
//! [`BoardConfig`].

pub mod board;
pub mod config;
pub mod spi;

use std::io;
use std::path::Path;

use embedded_hal::digital::PinState;
use linux_embedded_hal::{I2cdev, SysfsPin};
use log::{debug, info};
use lumen_core::{Error, Platform, Result};
use lumen_hal::{BoardPins, BoardType, I2cAdapter, LockAction, PinError, PinFunction, PinMode};

pub use board::LinuxBoard;
pub use config::{BoardConfig, ConfigError};
pub use spi::LinuxSpi;

/// I2C controller for one `/dev/i2c-N` device
pub type LinuxI2c = I2cAdapter<I2cdev>;

/// A Linux board and its bus devices
pub struct LinuxPlatform {
    config: BoardConfig,
    board: LinuxBoard,
}

impl LinuxPlatform {
    /// Build a platform from a board description
    pub fn new(config: BoardConfig) -> Self {
        info!("Board {:?}", config.board);
        let board = LinuxBoard::new(&config);
        Self { config, board }
    }

    /// Load the board description (see [`BoardConfig::load`]) and build a
    /// platform from it
    pub fn load(path: Option<&Path>) -> core::result::Result<Self, ConfigError> {
        BoardConfig::load(path).map(Self::new)
    }

    /// The board description in use
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }
}

impl BoardPins for LinuxPlatform {
    fn board_type(&self) -> core::result::Result<BoardType, PinError> {
        self.board.board_type()
    }

    fn verify_pin_function(
        &mut self,
        pin: u8,
        function: PinFunction,
        lock: LockAction,
    ) -> core::result::Result<(), PinError> {
        self.board.verify_pin_function(pin, function, lock)
    }

    fn set_pin_mode(
        &mut self,
        pin: u8,
        mode: PinMode,
        pull_up: bool,
    ) -> core::result::Result<(), PinError> {
        self.board.set_pin_mode(pin, mode, pull_up)
    }

    fn set_pin_state(&mut self, pin: u8, state: PinState) -> core::result::Result<(), PinError> {
        self.board.set_pin_state(pin, state)
    }

    fn get_pin_state(&mut self, pin: u8) -> core::result::Result<PinState, PinError> {
        self.board.get_pin_state(pin)
    }
}

impl Platform for LinuxPlatform {
    type I2c = LinuxI2c;
    type Spi = LinuxSpi;
    type ChipSelect = SysfsPin;

    fn open_i2c(&mut self, bus: u8) -> Result<LinuxI2c> {
        let device = self
            .config
            .i2c_device(bus)
            .ok_or(Error::InvalidArgument("no such I2C bus"))?;

        let dev = I2cdev::new(device).map_err(|e| Error::from(io::Error::from(e)))?;
        debug!("I2C bus {} on {}", bus, device.display());
        Ok(I2cAdapter::new(dev))
    }

    fn i2c_pins(&self, bus: u8) -> Vec<u8> {
        self.config.i2c_pins(bus).to_vec()
    }

    fn open_spi(&mut self) -> Result<LinuxSpi> {
        let spi = self
            .config
            .spi
            .as_ref()
            .ok_or(Error::InvalidArgument("board has no SPI bus"))?;

        Ok(LinuxSpi::open(&spi.device)?)
    }

    fn chip_select_pin(&self) -> u8 {
        self.config
            .spi
            .as_ref()
            .map_or(0, |spi| spi.chip_select)
    }

    fn open_chip_select(&mut self, pin: u8) -> Result<SysfsPin> {
        // Exports the pin through the board so close can revert it
        self.board.gpio(pin)?;
        SysfsPin::new(u64::from(pin))
            .into_output_pin(PinState::High)
            .map_err(|e| Error::Pin(board::gpio_error(pin, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(text: &str) -> LinuxPlatform {
        LinuxPlatform::new(BoardConfig::from_toml_str(text).unwrap())
    }

    #[test]
    fn test_unknown_i2c_bus() {
        let mut platform = platform(
            r#"
            board = "pi2-bare"
            [[i2c]]
            bus = 1
            device = "/dev/i2c-1"
            "#,
        );
        assert!(matches!(
            platform.open_i2c(3),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_i2c_device() {
        let mut platform = platform(
            r#"
            board = "mbm-bare"
            [[i2c]]
            bus = 0
            device = "/dev/i2c-does-not-exist"
            "#,
        );
        assert!(matches!(platform.open_i2c(0), Err(Error::Io(_))));
    }

    #[test]
    fn test_no_spi_bus() {
        let mut platform = platform(r#"board = "mbm-bare""#);
        assert!(matches!(
            platform.open_spi(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(platform.chip_select_pin(), 0);
    }

    #[test]
    fn test_default_board() {
        let platform = LinuxPlatform::new(BoardConfig::embedded_default().unwrap());
        assert_eq!(platform.board_type(), Ok(BoardType::Pi2Bare));
        assert_eq!(platform.chip_select_pin(), 8);
        assert_eq!(platform.i2c_pins(1), vec![2, 3]);
    }
}
