//! SPI bus abstractions
//!
//! Provides the controller trait the session engine drives. Chip select is
//! not part of the controller: the engine frames transfers with its own
//! `embedded-hal` output pin.

use embedded_hal::spi::{Error, SpiBus};

/// SPI bus controller
pub trait SpiController {
    /// Error type for SPI operations
    type Error: Error;

    /// Configure MISO/MOSI/SCK and start the bus with `config`
    fn begin(&mut self, config: &SpiConfig) -> Result<(), Self::Error>;

    /// Full-duplex transfer
    ///
    /// At least one buffer is present; when both are, they have the same
    /// length. A missing write buffer clocks out zeros, a missing read
    /// buffer discards what comes in.
    fn transfer(&mut self, write: Option<&[u8]>, read: Option<&mut [u8]>)
        -> Result<(), Self::Error>;

    /// Stop the bus and return its pins to general-purpose mode
    fn end(&mut self);
}

/// Run a duplex transfer on a blocking `embedded-hal` bus
///
/// Shared by controllers built on `embedded-hal` buses.
pub fn transfer_on_bus<B: SpiBus>(
    bus: &mut B,
    write: Option<&[u8]>,
    read: Option<&mut [u8]>,
) -> Result<(), B::Error> {
    match (write, read) {
        (Some(write), Some(read)) => bus.transfer(read, write)?,
        (Some(write), None) => bus.write(write)?,
        (None, Some(read)) => bus.read(read)?,
        (None, None) => return Ok(()),
    }
    bus.flush()
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock mode
    pub mode: Mode,
    /// Clock frequency in kHz
    pub clock_khz: u32,
    /// Bits per data word
    pub data_bits: u8,
    /// Bit order on the wire
    pub bit_order: BitOrder,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mode0,
            clock_khz: 1_000, // 1 MHz
            data_bits: 8,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl SpiConfig {
    /// Build a config from a clock given in Hz
    ///
    /// Controllers are started in kHz; the conversion truncates.
    pub fn from_hz(mode: Mode, clock_hz: u32, data_bits: u8) -> Self {
        Self {
            mode,
            clock_khz: clock_hz / 1000,
            data_bits,
            bit_order: BitOrder::MsbFirst,
        }
    }

    /// Clock frequency in Hz
    pub fn clock_hz(&self) -> u32 {
        self.clock_khz.saturating_mul(1000)
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Decode a mode number (0-3)
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Mode::Mode0),
            1 => Some(Mode::Mode1),
            2 => Some(Mode::Mode2),
            3 => Some(Mode::Mode3),
            _ => None,
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType};

    /// Mock bus that echoes written bytes back, one transfer deep
    #[derive(Default)]
    struct EchoBus {
        last: [u8; 8],
        len: usize,
        flushed: bool,
    }

    impl ErrorType for EchoBus {
        type Error = ErrorKind;
    }

    impl SpiBus for EchoBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            words.copy_from_slice(&self.last[..words.len()]);
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            self.last[..words.len()].copy_from_slice(words);
            self.len = words.len();
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            read.copy_from_slice(write);
            self.len = write.len();
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            let _ = words;
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_clock_scaling() {
        let config = SpiConfig::from_hz(Mode::Mode0, 4_000_000, 8);
        assert_eq!(config.clock_khz, 4_000);
        assert_eq!(config.bit_order, BitOrder::MsbFirst);

        // Sub-kHz remainder is dropped
        let config = SpiConfig::from_hz(Mode::Mode3, 1_999, 8);
        assert_eq!(config.clock_khz, 1);
        assert_eq!(config.clock_hz(), 1_000);
    }

    #[test]
    fn test_mode_decoding() {
        assert_eq!(Mode::from_raw(0), Some(Mode::Mode0));
        assert_eq!(Mode::from_raw(3), Some(Mode::Mode3));
        assert_eq!(Mode::from_raw(4), None);

        let (polarity, phase): (Polarity, Phase) = Mode::Mode2.into();
        assert_eq!(polarity, Polarity::IdleHigh);
        assert_eq!(phase, Phase::CaptureOnFirstTransition);
    }

    #[test]
    fn test_transfer_on_bus_duplex() {
        let mut bus = EchoBus::default();
        let mut read = [0u8; 2];
        transfer_on_bus(&mut bus, Some(&[0x01, 0x02]), Some(&mut read)).unwrap();
        assert_eq!(read, [0x01, 0x02]);
        assert!(bus.flushed);
    }

    #[test]
    fn test_transfer_on_bus_half_duplex() {
        let mut bus = EchoBus::default();
        transfer_on_bus(&mut bus, Some(&[0xDE, 0xAD]), None).unwrap();
        assert_eq!(bus.len, 2);

        let mut read = [0u8; 2];
        transfer_on_bus(&mut bus, None, Some(&mut read)).unwrap();
        assert_eq!(read, [0xDE, 0xAD]);
    }
}
