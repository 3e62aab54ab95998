//! Status codes returned across the C surface
//!
//! Zero is success; every failure is a distinct negative value. The values
//! are mirrored in `include/lumen.h` and must not change.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use lumen_core::Error;
use lumen_hal::PinError;

/// Status returned by every `lumen_*` call
pub type Status = i32;

pub const OK: Status = 0;
pub const INVALID_HANDLE: Status = -1;
pub const UNSUPPORTED_BOARD: Status = -2;
pub const INCOMPLETE_TRANSFER: Status = -3;
pub const ADDRESS_NACK: Status = -4;
pub const DATA_NACK: Status = -5;
pub const BUS_ERROR: Status = -6;
pub const PIN_LOCKED: Status = -7;
pub const PIN_UNSUPPORTED: Status = -8;
pub const PIN_ERROR: Status = -9;
pub const INVALID_ARGUMENT: Status = -10;
pub const IO_ERROR: Status = -11;
pub const NOT_INITIALIZED: Status = -12;
pub const ALREADY_INITIALIZED: Status = -13;
pub const CONFIG_ERROR: Status = -14;

/// Status code for an engine error
pub fn code(error: &Error) -> Status {
    match error {
        Error::InvalidHandle(_) => INVALID_HANDLE,
        Error::UnsupportedBoard(_) => UNSUPPORTED_BOARD,
        Error::IncompleteTransfer { .. } => INCOMPLETE_TRANSFER,
        Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)) => ADDRESS_NACK,
        Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)) => DATA_NACK,
        Error::I2c(_) | Error::Spi(_) => BUS_ERROR,
        Error::Pin(PinError::Locked) => PIN_LOCKED,
        Error::Pin(PinError::Unsupported) => PIN_UNSUPPORTED,
        Error::Pin(_) | Error::ChipSelect(_) => PIN_ERROR,
        Error::InvalidArgument(_) => INVALID_ARGUMENT,
        Error::Io(_) => IO_ERROR,
        Error::ShutDown => NOT_INITIALIZED,
    }
}

/// Collapse an engine result to a status, logging failures
pub fn status(result: lumen_core::Result<()>) -> Status {
    match result {
        Ok(()) => OK,
        Err(e) => {
            log::debug!("Call failed: {}", e);
            code(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::{digital, spi};
    use lumen_core::Handle;
    use lumen_hal::BoardType;

    #[test]
    fn test_error_codes() {
        let cases = [
            (Error::InvalidHandle(Handle::from_raw(3)), -1),
            (Error::UnsupportedBoard(BoardType::Edison), -2),
            (
                Error::IncompleteTransfer {
                    requested: 2,
                    transferred: 1,
                },
                -3,
            ),
            (
                Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
                -4,
            ),
            (
                Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
                -5,
            ),
            (
                Error::I2c(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)),
                -6,
            ),
            (Error::I2c(ErrorKind::ArbitrationLoss), -6),
            (Error::Spi(spi::ErrorKind::ModeFault), -6),
            (Error::Pin(PinError::Locked), -7),
            (Error::Pin(PinError::Unsupported), -8),
            (Error::Pin(PinError::InvalidPin), -9),
            (Error::ChipSelect(digital::ErrorKind::Other), -9),
            (Error::InvalidArgument("x"), -10),
            (Error::Io(std::io::ErrorKind::NotFound), -11),
            (Error::ShutDown, -12),
        ];
        for (error, expected) in cases {
            assert_eq!(code(&error), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_status() {
        assert_eq!(status(Ok(())), OK);
        assert_eq!(
            status(Err(Error::InvalidHandle(Handle::INVALID))),
            INVALID_HANDLE
        );
    }
}
