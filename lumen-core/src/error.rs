//! Errors reported by the session engine
//!
//! Bus failures keep their `embedded-hal` error kind so callers of the strict
//! transfer variants see the precise cause. The partial variants never
//! return bus errors; see [`crate::classify`].

use core::fmt;

use embedded_hal::{digital, i2c, spi};
use lumen_hal::{BoardType, PinError};

use crate::handle::Handle;

/// Result alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Handle is out of range, never allocated, or already closed
    InvalidHandle(Handle),
    /// Board variant does not expose its buses directly
    UnsupportedBoard(BoardType),
    /// I2C controller failure (strict variants only)
    I2c(i2c::ErrorKind),
    /// Transaction ran without error but moved fewer bytes than queued
    IncompleteTransfer {
        /// Bytes queued
        requested: usize,
        /// Bytes the controller reported as moved
        transferred: usize,
    },
    /// SPI controller failure
    Spi(spi::ErrorKind),
    /// Chip-select pin could not be driven
    ChipSelect(digital::ErrorKind),
    /// Board pin operation failed
    Pin(PinError),
    /// Argument outside its valid range
    InvalidArgument(&'static str),
    /// Opening the underlying device failed
    Io(std::io::ErrorKind),
    /// The subsystem was shut down
    ShutDown,
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Self {
        Error::Pin(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(handle) => write!(f, "invalid handle {}", handle),
            Error::UnsupportedBoard(board) => {
                write!(f, "board {:?} does not support direct bus access", board)
            }
            Error::I2c(kind) => write!(f, "I2C transfer failed: {:?}", kind),
            Error::IncompleteTransfer {
                requested,
                transferred,
            } => write!(
                f,
                "I2C transfer incomplete: {} of {} bytes",
                transferred, requested
            ),
            Error::Spi(kind) => write!(f, "SPI transfer failed: {:?}", kind),
            Error::ChipSelect(kind) => write!(f, "chip select failed: {:?}", kind),
            Error::Pin(e) => write!(f, "pin operation failed: {:?}", e),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::Io(kind) => write!(f, "device access failed: {:?}", kind),
            Error::ShutDown => write!(f, "hardware subsystem is shut down"),
        }
    }
}

impl std::error::Error for Error {}
