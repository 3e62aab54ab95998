//! Transfer outcome classification
//!
//! The partial transfer variants report one of three outcomes instead of an
//! error. Everything that is neither a clean transfer nor an address NACK is
//! folded into [`TransferStatus::PartialTransfer`]: data NACKs, NACKs of
//! unknown phase, bus errors, arbitration loss and short transfers all look
//! the same to the caller. This loses precision on purpose; callers that
//! need the cause use the strict variants.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

use crate::transaction::Transaction;

/// Outcome of a partial transfer
///
/// Discriminants are part of the C surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TransferStatus {
    /// Every queued byte was acknowledged
    FullTransfer = 0,
    /// The transfer stopped early or failed after the address phase
    PartialTransfer = 1,
    /// No device acknowledged the slave address
    SlaveAddressNotAcknowledged = 2,
}

/// Byte count and status reported by a partial transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// Bytes moved; zero unless the transfer was complete
    pub bytes_transferred: usize,
    /// Outcome
    pub status: TransferStatus,
}

impl TransferResult {
    /// A complete transfer of `bytes`
    pub const fn full(bytes: usize) -> Self {
        Self {
            bytes_transferred: bytes,
            status: TransferStatus::FullTransfer,
        }
    }

    /// A failed transfer with `status`
    pub const fn failed(status: TransferStatus) -> Self {
        Self {
            bytes_transferred: 0,
            status,
        }
    }
}

/// Map a controller error kind to a status
pub fn classify_error(kind: ErrorKind) -> TransferStatus {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => {
            TransferStatus::SlaveAddressNotAcknowledged
        }
        _ => TransferStatus::PartialTransfer,
    }
}

/// Derive the partial-transfer result of an executed transaction
pub fn classify(transaction: &Transaction<'_>) -> TransferResult {
    match transaction.last_error() {
        Some(kind) => TransferResult::failed(classify_error(kind)),
        None if transaction.is_incomplete() => {
            TransferResult::failed(TransferStatus::PartialTransfer)
        }
        None => TransferResult::full(transaction.requested()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{Operation, SevenBitAddress};
    use lumen_hal::{I2cController, I2cSpeed};

    use crate::transaction::Target;

    struct OneShot(core::result::Result<usize, ErrorKind>);

    impl I2cController for OneShot {
        type Error = ErrorKind;

        fn begin(&mut self, _speed: I2cSpeed) -> core::result::Result<(), ErrorKind> {
            Ok(())
        }

        fn execute(
            &mut self,
            _address: SevenBitAddress,
            _operations: &mut [Operation<'_>],
        ) -> core::result::Result<usize, ErrorKind> {
            self.0
        }

        fn end(&mut self) {}
    }

    fn run(outcome: core::result::Result<usize, ErrorKind>, data: &[u8]) -> TransferResult {
        let mut transaction = Transaction::new(Target {
            address: 0x50,
            speed: I2cSpeed::Fast,
        });
        transaction.queue_write(data).unwrap();
        let _ = transaction.execute(&mut OneShot(outcome));
        classify(&transaction)
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TransferStatus::FullTransfer as u32, 0);
        assert_eq!(TransferStatus::PartialTransfer as u32, 1);
        assert_eq!(TransferStatus::SlaveAddressNotAcknowledged as u32, 2);
    }

    #[test]
    fn test_full_transfer() {
        assert_eq!(run(Ok(3), &[1, 2, 3]), TransferResult::full(3));
    }

    #[test]
    fn test_address_nack() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        for data in [&[0xAA][..], &[0xAA, 0xBB][..], &[0u8; 32][..]] {
            let result = run(Err(nack), data);
            assert_eq!(result.status, TransferStatus::SlaveAddressNotAcknowledged);
            assert_eq!(result.bytes_transferred, 0);
        }
    }

    #[test]
    fn test_everything_else_is_partial() {
        let kinds = [
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            ErrorKind::Bus,
            ErrorKind::ArbitrationLoss,
            ErrorKind::Overrun,
            ErrorKind::Other,
        ];
        for kind in kinds {
            assert_eq!(
                run(Err(kind), &[1, 2]),
                TransferResult::failed(TransferStatus::PartialTransfer)
            );
        }
    }

    #[test]
    fn test_short_transfer_is_partial() {
        assert_eq!(
            run(Ok(1), &[1, 2]),
            TransferResult::failed(TransferStatus::PartialTransfer)
        );
    }
}
