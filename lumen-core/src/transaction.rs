//! I2C transactions
//!
//! A transaction is built fresh for every call: it borrows the caller's
//! buffers as segments, runs them against the session's controller in one
//! bus operation, and keeps the outcome for classification.

use embedded_hal::i2c::{Error as _, ErrorKind, Operation, SevenBitAddress};
use heapless::Vec;
use lumen_hal::i2c::operation_len;
use lumen_hal::{I2cController, I2cSpeed};

use crate::error::{Error, Result};

/// Maximum segments per transaction (write, then read)
pub const MAX_SEGMENTS: usize = 2;

/// Device a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// 7-bit slave address
    pub address: SevenBitAddress,
    /// Bus clock
    pub speed: I2cSpeed,
}

/// One bus transaction against a [`Target`]
#[derive(Debug)]
pub struct Transaction<'b> {
    target: Target,
    segments: Vec<Operation<'b>, MAX_SEGMENTS>,
    transferred: usize,
    error: Option<ErrorKind>,
    executed: bool,
}

impl<'b> Transaction<'b> {
    /// Start an empty transaction for `target`
    pub fn new(target: Target) -> Self {
        Self {
            target,
            segments: Vec::new(),
            transferred: 0,
            error: None,
            executed: false,
        }
    }

    /// Queue a write segment
    pub fn queue_write(&mut self, data: &'b [u8]) -> Result<()> {
        self.queue(Operation::Write(data))
    }

    /// Queue a read segment
    pub fn queue_read(&mut self, buf: &'b mut [u8]) -> Result<()> {
        self.queue(Operation::Read(buf))
    }

    fn queue(&mut self, segment: Operation<'b>) -> Result<()> {
        self.segments
            .push(segment)
            .map_err(|_| Error::InvalidArgument("too many transaction segments"))
    }

    /// Run all queued segments as one bus operation
    ///
    /// The outcome is recorded whether or not the controller fails.
    pub fn execute<C: I2cController>(
        &mut self,
        controller: &mut C,
    ) -> core::result::Result<(), C::Error> {
        self.executed = true;
        match controller.execute(self.target.address, &mut self.segments) {
            Ok(moved) => {
                self.transferred = moved.min(self.requested());
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.transferred = 0;
                self.error = Some(e.kind());
                Err(e)
            }
        }
    }

    /// Total bytes queued across all segments
    pub fn requested(&self) -> usize {
        self.segments.iter().map(operation_len).sum()
    }

    /// Bytes the controller reported as moved
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Error kind of the last execution, if it failed
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Check if the transaction has not moved every queued byte
    ///
    /// True before execution and after any failed execution.
    pub fn is_incomplete(&self) -> bool {
        !self.executed || self.error.is_some() || self.transferred < self.requested()
    }
}
