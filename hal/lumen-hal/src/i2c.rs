//! I2C bus abstractions
//!
//! Provides the controller trait the session engine drives, plus an adapter
//! for any blocking `embedded-hal` I2C bus.

use embedded_hal::i2c::{Error, I2c, Operation, SevenBitAddress};

/// I2C clock speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cSpeed {
    /// Standard mode (100 kHz)
    #[default]
    Standard,
    /// Fast mode (400 kHz)
    Fast,
}

impl I2cSpeed {
    /// Pick the speed for a session's fast-mode flag
    pub fn from_fast_mode(fast_mode: bool) -> Self {
        if fast_mode {
            I2cSpeed::Fast
        } else {
            I2cSpeed::Standard
        }
    }

    /// Clock frequency in Hz
    pub fn frequency(&self) -> u32 {
        match self {
            I2cSpeed::Standard => 100_000,
            I2cSpeed::Fast => 400_000,
        }
    }
}

/// I2C bus controller
///
/// One controller backs one open session. The engine calls `begin` once,
/// `execute` once per transfer, and `end` when the session closes.
pub trait I2cController {
    /// Error type for I2C operations
    ///
    /// Must report the `embedded-hal` error kind so NACKs can be told apart
    /// by phase.
    type Error: Error;

    /// Configure the bus pins and clock for a new session
    fn begin(&mut self, speed: I2cSpeed) -> Result<(), Self::Error>;

    /// Run all operations as one bus transaction (repeated start between
    /// segments, a single stop at the end)
    ///
    /// Returns the number of bytes actually moved. A value lower than the
    /// total segment length means the controller gave up early without
    /// raising an error.
    fn execute(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<usize, Self::Error>;

    /// Release the bus
    fn end(&mut self);
}

/// Length in bytes of one transaction segment
pub fn operation_len(operation: &Operation<'_>) -> usize {
    match operation {
        Operation::Read(buf) => buf.len(),
        Operation::Write(data) => data.len(),
    }
}

/// Controller over a blocking `embedded-hal` I2C bus
///
/// `embedded-hal` buses are either fully successful or fail, so `execute`
/// never reports a short transfer. The clock is fixed when the bus is
/// created; the requested speed is only recorded.
pub struct I2cAdapter<B> {
    bus: B,
    speed: Option<I2cSpeed>,
}

impl<B: I2c> I2cAdapter<B> {
    /// Wrap a bus
    pub fn new(bus: B) -> Self {
        Self { bus, speed: None }
    }

    /// Speed requested by the current session, if one is open
    pub fn speed(&self) -> Option<I2cSpeed> {
        self.speed
    }

    /// Return the wrapped bus
    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: I2c> I2cController for I2cAdapter<B> {
    type Error = B::Error;

    fn begin(&mut self, speed: I2cSpeed) -> Result<(), Self::Error> {
        self.speed = Some(speed);
        Ok(())
    }

    fn execute(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<usize, Self::Error> {
        let requested = operations.iter().map(operation_len).sum();
        self.bus.transaction(address, operations)?;
        Ok(requested)
    }

    fn end(&mut self) {
        self.speed = None;
    }
}
