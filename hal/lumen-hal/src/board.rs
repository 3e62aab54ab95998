//! Board and pin capability
//!
//! Pin mapping, function locks and digital pin I/O are owned by the board,
//! not by the bus engine. The engine only asks two things of it: which board
//! variant it is running on, and to put pins back to general-purpose mode
//! when a bus session closes.

pub use embedded_hal::digital::PinState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Board variants
///
/// Discriminants are the codes reported over the C surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u32)]
pub enum BoardType {
    /// Board not detected or not configured
    #[default]
    Unknown = 0,
    /// Galileo Gen 1
    GalileoGen1 = 1,
    /// Galileo Gen 2
    GalileoGen2 = 2,
    /// Edison on an Arduino breakout
    Edison = 3,
    /// MinnowBoard Max, header pins used directly
    MbmBare = 4,
    /// MinnowBoard Max behind an Ika Lure expansion board
    MbmIkaLure = 5,
    /// Raspberry Pi 2, header pins used directly
    Pi2Bare = 6,
}

impl BoardType {
    /// Check if the board exposes its I2C/SPI controllers directly
    ///
    /// Only bare variants can host the bus session engine; the others route
    /// their buses through expanders driven elsewhere.
    pub fn is_bare(&self) -> bool {
        matches!(self, BoardType::MbmBare | BoardType::Pi2Bare)
    }
}

/// Pin functions
///
/// Values are bit flags so a pin's capability set fits in one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u32)]
pub enum PinFunction {
    /// Digital input/output
    Digital = 0x01,
    /// PWM output
    Pwm = 0x02,
    /// Analog input
    Analog = 0x04,
    /// I2C SDA/SCL
    I2c = 0x08,
    /// SPI MISO/MOSI/SCK
    Spi = 0x10,
    /// UART TX/RX
    Serial = 0x20,
}

impl PinFunction {
    /// Decode a function from its C surface code
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x01 => Some(PinFunction::Digital),
            0x02 => Some(PinFunction::Pwm),
            0x04 => Some(PinFunction::Analog),
            0x08 => Some(PinFunction::I2c),
            0x10 => Some(PinFunction::Spi),
            0x20 => Some(PinFunction::Serial),
            _ => None,
        }
    }
}

/// What to do with a pin's function lock after verifying it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum LockAction {
    /// Verify only
    NoLock = 0,
    /// Verify, then lock the pin to the function
    Lock = 1,
    /// Verify, then release the lock
    Unlock = 2,
}

impl LockAction {
    /// Decode a lock action from its C surface code
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LockAction::NoLock),
            1 => Some(LockAction::Lock),
            2 => Some(LockAction::Unlock),
            _ => None,
        }
    }
}

/// Digital pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum PinMode {
    /// Input (the general-purpose default)
    Input = 0,
    /// Output
    Output = 1,
}

impl PinMode {
    /// Decode a mode from its C surface code
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PinMode::Input),
            1 => Some(PinMode::Output),
            _ => None,
        }
    }
}

/// Error from board pin operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number does not exist on this board
    InvalidPin,
    /// Pin is locked to a different function
    Locked,
    /// Pin cannot perform the requested function or mode
    Unsupported,
    /// Board type could not be determined
    UnknownBoard,
    /// Underlying device access failed
    Io,
}

/// Board pin capability
///
/// Implemented by platform crates. All pin numbers are the board's logical
/// numbering; mapping to physical lines is the implementation's business.
pub trait BoardPins {
    /// Report the board variant
    fn board_type(&self) -> Result<BoardType, PinError>;

    /// Check that `pin` can perform `function`, then apply `lock`
    ///
    /// Fails with [`PinError::Locked`] if the pin is already locked to a
    /// different function, regardless of `lock`.
    fn verify_pin_function(
        &mut self,
        pin: u8,
        function: PinFunction,
        lock: LockAction,
    ) -> Result<(), PinError>;

    /// Configure the pin direction, optionally enabling its pull-up
    ///
    /// This and the pin state calls are digital I/O: they fail with
    /// [`PinError::Locked`] while the pin is locked to any other function.
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode, pull_up: bool) -> Result<(), PinError>;

    /// Drive an output pin
    fn set_pin_state(&mut self, pin: u8, state: PinState) -> Result<(), PinError>;

    /// Read a pin
    fn get_pin_state(&mut self, pin: u8) -> Result<PinState, PinError>;
}
