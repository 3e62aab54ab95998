//! SPI sessions
//!
//! Every transfer is framed by the platform's chip-select pin: select, one
//! full-duplex transfer, deselect. The session lock is held for the whole
//! frame so two callers on the same handle never interleave.

use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::spi::Error as _;
use log::{info, warn};
use lumen_hal::{Mode, PinFunction, PinMode, SpiConfig, SpiController};

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::hardware::{Hardware, Platform};

/// An open SPI session
pub struct SpiSession<S, CS> {
    controller: S,
    chip_select: CS,
    chip_select_pin: u8,
}

impl<S: SpiController, CS: OutputPin> SpiSession<S, CS> {
    /// Run one transfer framed by chip select
    ///
    /// If selecting fails no transfer is attempted, but deselect is still
    /// driven. Deselect failures are logged and otherwise ignored.
    fn framed_transfer(&mut self, write: Option<&[u8]>, read: Option<&mut [u8]>) -> Result<()> {
        if let Err(e) = self.chip_select.set_low() {
            self.deselect();
            return Err(Error::ChipSelect(e.kind()));
        }

        let result = self
            .controller
            .transfer(write, read)
            .map_err(|e| Error::Spi(e.kind()));

        self.deselect();
        result
    }

    fn deselect(&mut self) {
        if let Err(e) = self.chip_select.set_high() {
            warn!(
                "SPI deselect on pin {} failed: {:?}",
                self.chip_select_pin,
                e.kind()
            );
        }
    }

    /// End the controller session, returning the chip-select pin to revert
    pub(crate) fn close(mut self) -> u8 {
        self.controller.end();
        self.chip_select_pin
    }
}

impl<P: Platform> Hardware<P> {
    /// Open an SPI session
    ///
    /// The bus is clocked at `clock_hz / 1000` kHz, MSB first. Chip select
    /// starts out high and stays locked to SPI until the last session using
    /// it closes.
    pub fn spi_init(&self, mode: Mode, clock_hz: u32, data_bits: u8) -> Result<Handle> {
        if data_bits == 0 {
            return Err(Error::InvalidArgument("SPI data bit length is zero"));
        }
        let config = SpiConfig::from_hz(mode, clock_hz, data_bits);

        let mut platform = self.platform();
        self.require_open()?;
        Self::require_bare_board(&platform)?;

        let chip_select_pin = platform.chip_select_pin();
        self.claim_pins(&mut platform, &[chip_select_pin], PinFunction::Spi)?;

        let session = match Self::open_spi_session(&mut platform, &config, chip_select_pin) {
            Ok(session) => session,
            Err(e) => {
                self.release_pins(&mut platform, &[chip_select_pin], PinFunction::Spi);
                return Err(e);
            }
        };

        let handle = self.spi.allocate(session);
        info!(
            "SPI handle {} open: {:?} at {} kHz, {} bits",
            handle, mode, config.clock_khz, data_bits
        );
        Ok(handle)
    }

    fn open_spi_session(
        platform: &mut P,
        config: &SpiConfig,
        chip_select_pin: u8,
    ) -> Result<SpiSession<P::Spi, P::ChipSelect>> {
        let mut controller = platform.open_spi()?;
        if let Err(e) = controller.begin(config) {
            controller.end();
            return Err(Error::Spi(e.kind()));
        }

        match platform.open_chip_select(chip_select_pin) {
            Ok(chip_select) => Ok(SpiSession {
                controller,
                chip_select,
                chip_select_pin,
            }),
            Err(e) => {
                controller.end();
                Err(e)
            }
        }
    }

    /// Run one chip-select framed full-duplex transfer
    ///
    /// At least one buffer must be given, and both must be the same length
    /// when both are given. The C surface checks this before calling.
    pub fn spi_transfer_full_duplex(
        &self,
        handle: Handle,
        write: Option<&[u8]>,
        read: Option<&mut [u8]>,
    ) -> Result<()> {
        debug_assert!(write.is_some() || read.is_some());
        debug_assert!(match (&write, &read) {
            (Some(w), Some(r)) => w.len() == r.len(),
            _ => true,
        });

        self.spi
            .with(handle, |session| session.framed_transfer(write, read))
    }

    /// Close an SPI session
    ///
    /// Once no session uses the chip-select pin any more it is unlocked and
    /// reverted to an input. Closing a handle that is not open does nothing.
    pub fn spi_close(&self, handle: Handle) {
        if let Some(pin) = self.spi.release(handle, SpiSession::close) {
            let mut platform = self.platform();
            for pin in self.release_pins(&mut platform, &[pin], PinFunction::Spi) {
                Self::revert_pin(&mut platform, pin);
            }
            info!("SPI handle {} closed", handle);
        }
    }

    /// Return an unlocked pin to general-purpose input
    pub(crate) fn revert_pin(platform: &mut P, pin: u8) {
        if let Err(e) = platform.set_pin_mode(pin, PinMode::Input, false) {
            warn!("Reverting pin {} failed: {:?}", pin, e);
        }
    }
}
