//! The hardware-access subsystem
//!
//! [`Hardware`] owns the platform and both session tables. It is the one
//! object callers share; the bus operations live in [`crate::i2c`] and
//! [`crate::spi`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, warn};
use lumen_hal::{
    BoardPins, BoardType, I2cController, LockAction, PinFunction, PinMode, SpiController,
};

use crate::error::{Error, Result};
use crate::handle::{lock, HandleTable};
use crate::i2c::I2cSession;
use crate::spi::SpiSession;

/// A board together with the bus controllers it can hand out
///
/// Implemented once per target (Linux userspace, test fakes).
pub trait Platform: BoardPins {
    /// I2C controller type
    type I2c: I2cController;
    /// SPI controller type
    type Spi: SpiController;
    /// Chip-select output type
    type ChipSelect: OutputPin;

    /// Open the controller for I2C bus `bus`
    fn open_i2c(&mut self, bus: u8) -> Result<Self::I2c>;

    /// Pins carrying I2C bus `bus`, empty if the board does not expose them
    fn i2c_pins(&self, bus: u8) -> Vec<u8>;

    /// Open the SPI controller
    fn open_spi(&mut self) -> Result<Self::Spi>;

    /// The pin wired as SPI chip select
    fn chip_select_pin(&self) -> u8;

    /// Open `pin` as a digital output, driven high (deselected)
    fn open_chip_select(&mut self, pin: u8) -> Result<Self::ChipSelect>;
}

/// Session tables and the platform behind them
///
/// Lock order is platform, then claims, then a session table.
pub struct Hardware<P: Platform> {
    platform: Mutex<P>,
    /// Open sessions holding each bus pin's function lock
    claims: Mutex<HashMap<u8, usize>>,
    closed: AtomicBool,
    pub(crate) i2c: HandleTable<I2cSession<P::I2c>>,
    pub(crate) spi: HandleTable<SpiSession<P::Spi, P::ChipSelect>>,
}

impl<P: Platform> Hardware<P> {
    /// Take ownership of `platform`
    pub fn new(platform: P) -> Self {
        Self {
            platform: Mutex::new(platform),
            claims: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            i2c: HandleTable::new(),
            spi: HandleTable::new(),
        }
    }

    /// Lock the platform
    ///
    /// Never held across a bus transfer.
    pub(crate) fn platform(&self) -> MutexGuard<'_, P> {
        lock(&self.platform)
    }

    /// Fail if [`Hardware::close_all`] has run
    ///
    /// Checked with the platform locked, so a session opened under the same
    /// guard is either seen by `close_all` or never opened.
    pub(crate) fn require_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Lock `pins` to `function` on behalf of one session
    ///
    /// Pins already claimed for the same function by another session are
    /// shared. On failure nothing stays claimed.
    pub(crate) fn claim_pins(
        &self,
        platform: &mut P,
        pins: &[u8],
        function: PinFunction,
    ) -> Result<()> {
        let mut claims = lock(&self.claims);
        for (claimed, &pin) in pins.iter().enumerate() {
            if let Err(e) = platform.verify_pin_function(pin, function, LockAction::Lock) {
                for &pin in &pins[..claimed] {
                    Self::release_claim(platform, &mut claims, pin, function);
                }
                return Err(e.into());
            }
            *claims.entry(pin).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Drop one session's claim on `pins`
    ///
    /// Returns the pins no session holds any more; their locks are gone.
    pub(crate) fn release_pins(
        &self,
        platform: &mut P,
        pins: &[u8],
        function: PinFunction,
    ) -> Vec<u8> {
        let mut claims = lock(&self.claims);
        pins.iter()
            .copied()
            .filter(|&pin| Self::release_claim(platform, &mut claims, pin, function))
            .collect()
    }

    fn release_claim(
        platform: &mut P,
        claims: &mut HashMap<u8, usize>,
        pin: u8,
        function: PinFunction,
    ) -> bool {
        match claims.get_mut(&pin) {
            Some(count) if *count > 1 => {
                *count -= 1;
                return false;
            }
            Some(_) => {
                claims.remove(&pin);
            }
            None => return false,
        }
        if let Err(e) = platform.verify_pin_function(pin, function, LockAction::Unlock) {
            warn!("Unlocking pin {} from {:?} failed: {:?}", pin, function, e);
        }
        true
    }

    /// Check that the board can host bus sessions
    pub(crate) fn require_bare_board(platform: &P) -> Result<BoardType> {
        let board = platform.board_type()?;
        if board.is_bare() {
            Ok(board)
        } else {
            Err(Error::UnsupportedBoard(board))
        }
    }

    /// Report the board variant
    pub fn board_type(&self) -> Result<BoardType> {
        Ok(self.platform().board_type()?)
    }

    /// Verify that `pin` can perform `function`, then apply `lock`
    pub fn verify_pin_function(
        &self,
        pin: u8,
        function: PinFunction,
        lock: LockAction,
    ) -> Result<()> {
        debug!("Verify pin {} for {:?} ({:?})", pin, function, lock);
        Ok(self.platform().verify_pin_function(pin, function, lock)?)
    }

    /// Configure a pin's direction
    pub fn set_pin_mode(&self, pin: u8, mode: PinMode, pull_up: bool) -> Result<()> {
        debug!("Pin {} mode {:?} pull-up {}", pin, mode, pull_up);
        Ok(self.platform().set_pin_mode(pin, mode, pull_up)?)
    }

    /// Drive an output pin
    pub fn set_pin_state(&self, pin: u8, state: PinState) -> Result<()> {
        Ok(self.platform().set_pin_state(pin, state)?)
    }

    /// Read a pin
    pub fn get_pin_state(&self, pin: u8) -> Result<PinState> {
        Ok(self.platform().get_pin_state(pin)?)
    }

    /// Number of open I2C sessions
    pub fn i2c_sessions(&self) -> usize {
        self.i2c.live()
    }

    /// Number of open SPI sessions
    pub fn spi_sessions(&self) -> usize {
        self.spi.live()
    }

    /// Close every open session, returning how many were closed
    ///
    /// Opening a session afterwards fails with [`Error::ShutDown`].
    pub fn close_all(&self) -> usize {
        self.mark_closed();

        let mut i2c_pins = Vec::new();
        let i2c = self
            .i2c
            .release_all(|_, session| i2c_pins.push(session.close()));

        let mut chip_selects = Vec::new();
        let spi = self
            .spi
            .release_all(|_, session| chip_selects.push(session.close()));

        let mut platform = self.platform();
        for pins in i2c_pins {
            self.release_pins(&mut platform, &pins, PinFunction::I2c);
        }
        for pin in chip_selects {
            for pin in self.release_pins(&mut platform, &[pin], PinFunction::Spi) {
                Self::revert_pin(&mut platform, pin);
            }
        }

        i2c + spi
    }

    fn mark_closed(&self) {
        let _platform = self.platform();
        self.closed.store(true, Ordering::Release);
    }
}
