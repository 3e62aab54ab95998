//! I2C sessions
//!
//! A session binds one controller to one slave address and bus speed. Every
//! transfer builds a [`Transaction`] over the caller's buffers and runs it in
//! a single bus operation, so a write-then-read uses a repeated start with no
//! stop in between.
//!
//! Each transfer comes in two flavors. The strict variants propagate the
//! controller's error and treat a short transfer as
//! [`Error::IncompleteTransfer`]. The `_partial` variants never fail on the
//! bus outcome; they report a [`TransferResult`] instead.

use embedded_hal::i2c::{Error as _, SevenBitAddress};
use log::{debug, info};
use lumen_hal::{I2cController, I2cSpeed, PinFunction};

use crate::classify::{classify, TransferResult, TransferStatus};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hardware::{Hardware, Platform};
use crate::transaction::{Target, Transaction};

/// Highest 7-bit slave address
const MAX_ADDRESS: SevenBitAddress = 0x7F;

/// An open I2C session
pub struct I2cSession<C> {
    controller: C,
    target: Target,
    pins: Vec<u8>,
}

impl<C: I2cController> I2cSession<C> {
    fn transaction<'b>(&self) -> Transaction<'b> {
        Transaction::new(self.target)
    }

    fn run_strict(&mut self, transaction: &mut Transaction<'_>) -> Result<()> {
        transaction
            .execute(&mut self.controller)
            .map_err(|e| Error::I2c(e.kind()))?;

        if transaction.is_incomplete() {
            return Err(Error::IncompleteTransfer {
                requested: transaction.requested(),
                transferred: transaction.transferred(),
            });
        }
        Ok(())
    }

    fn run_partial(&mut self, transaction: &mut Transaction<'_>) -> TransferResult {
        // The outcome is recorded on the transaction either way
        let _ = transaction.execute(&mut self.controller);
        let result = classify(transaction);

        if result.status != TransferStatus::FullTransfer {
            debug!(
                "I2C {:#04x}: {:?} ({} of {} bytes, {:?})",
                self.target.address,
                result.status,
                transaction.transferred(),
                transaction.requested(),
                transaction.last_error()
            );
        }
        result
    }

    /// End the controller session, returning the bus pins it held
    pub(crate) fn close(mut self) -> Vec<u8> {
        self.controller.end();
        self.pins
    }
}

impl<P: Platform> Hardware<P> {
    /// Open an I2C session to `address` on bus `bus`
    ///
    /// Only bare boards expose their I2C buses; every other variant reports
    /// [`Error::UnsupportedBoard`]. The bus runs at 400 kHz when `fast_mode`
    /// is set and at 100 kHz otherwise.
    pub fn i2c_init(&self, bus: u8, address: SevenBitAddress, fast_mode: bool) -> Result<Handle> {
        if address > MAX_ADDRESS {
            return Err(Error::InvalidArgument("I2C address is not 7-bit"));
        }
        let speed = I2cSpeed::from_fast_mode(fast_mode);

        let mut platform = self.platform();
        self.require_open()?;
        Self::require_bare_board(&platform)?;

        let pins = platform.i2c_pins(bus);
        self.claim_pins(&mut platform, &pins, PinFunction::I2c)?;

        let controller = match Self::open_i2c_controller(&mut platform, bus, speed) {
            Ok(controller) => controller,
            Err(e) => {
                self.release_pins(&mut platform, &pins, PinFunction::I2c);
                return Err(e);
            }
        };

        let handle = self.i2c.allocate(I2cSession {
            controller,
            target: Target { address, speed },
            pins,
        });
        info!(
            "I2C handle {} open: bus {} address {:#04x} at {} Hz",
            handle,
            bus,
            address,
            speed.frequency()
        );
        Ok(handle)
    }

    fn open_i2c_controller(platform: &mut P, bus: u8, speed: I2cSpeed) -> Result<P::I2c> {
        let mut controller = platform.open_i2c(bus)?;
        if let Err(e) = controller.begin(speed) {
            controller.end();
            return Err(Error::I2c(e.kind()));
        }
        Ok(controller)
    }

    /// Write `data` to the device
    pub fn i2c_write(&self, handle: Handle, data: &[u8]) -> Result<()> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_write(data)?;
            session.run_strict(&mut transaction)
        })
    }

    /// Fill `buf` from the device
    pub fn i2c_read(&self, handle: Handle, buf: &mut [u8]) -> Result<()> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_read(buf)?;
            session.run_strict(&mut transaction)
        })
    }

    /// Write `data`, then fill `buf`, in one transaction
    pub fn i2c_write_read(&self, handle: Handle, data: &[u8], buf: &mut [u8]) -> Result<()> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_write(data)?;
            transaction.queue_read(buf)?;
            session.run_strict(&mut transaction)
        })
    }

    /// Write `data`, reporting the outcome instead of failing
    ///
    /// Fails only if `handle` does not name an open session.
    pub fn i2c_write_partial(&self, handle: Handle, data: &[u8]) -> Result<TransferResult> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_write(data)?;
            Ok(session.run_partial(&mut transaction))
        })
    }

    /// Fill `buf`, reporting the outcome instead of failing
    pub fn i2c_read_partial(&self, handle: Handle, buf: &mut [u8]) -> Result<TransferResult> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_read(buf)?;
            Ok(session.run_partial(&mut transaction))
        })
    }

    /// Write then read in one transaction, reporting the outcome
    ///
    /// A full transfer reports the sum of both buffer lengths.
    pub fn i2c_write_read_partial(
        &self,
        handle: Handle,
        data: &[u8],
        buf: &mut [u8],
    ) -> Result<TransferResult> {
        self.i2c.with(handle, |session| {
            let mut transaction = session.transaction();
            transaction.queue_write(data)?;
            transaction.queue_read(buf)?;
            Ok(session.run_partial(&mut transaction))
        })
    }

    /// Close an I2C session
    ///
    /// Closing a handle that is not open does nothing.
    pub fn i2c_close(&self, handle: Handle) {
        if let Some(pins) = self.i2c.release(handle, I2cSession::close) {
            self.release_pins(&mut self.platform(), &pins, PinFunction::I2c);
            info!("I2C handle {} closed", handle);
        }
    }
}
