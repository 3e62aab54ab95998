//! SPI over spidev

use std::io;
use std::path::Path;

use embedded_hal::spi::{Error as _, ErrorKind};
use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};
use linux_embedded_hal::SpidevBus;
use log::{debug, warn};
use lumen_hal::spi::{transfer_on_bus, Phase, Polarity};
use lumen_hal::{BitOrder, Mode, SpiConfig, SpiController};

/// SPI controller on a `/dev/spidevB.C` device
///
/// The kernel's own chip select is left alone; framing uses the session's
/// GPIO chip select.
pub struct LinuxSpi {
    bus: SpidevBus,
}

impl LinuxSpi {
    /// Open the spidev device at `path`
    pub fn open(path: &Path) -> io::Result<Self> {
        let spidev = Spidev::open(path)?;
        debug!("Opened {}", path.display());
        Ok(Self {
            bus: SpidevBus(spidev),
        })
    }
}

fn mode_flags(mode: Mode) -> SpiModeFlags {
    let (polarity, phase): (Polarity, Phase) = mode.into();
    let mut flags = SpiModeFlags::empty();
    if polarity == Polarity::IdleHigh {
        flags |= SpiModeFlags::SPI_CPOL;
    }
    if phase == Phase::CaptureOnSecondTransition {
        flags |= SpiModeFlags::SPI_CPHA;
    }
    flags
}

impl SpiController for LinuxSpi {
    type Error = ErrorKind;

    fn begin(&mut self, config: &SpiConfig) -> Result<(), ErrorKind> {
        let options = SpidevOptions::new()
            .bits_per_word(config.data_bits)
            .max_speed_hz(config.clock_hz())
            .lsb_first(config.bit_order == BitOrder::LsbFirst)
            .mode(mode_flags(config.mode))
            .build();

        self.bus.0.configure(&options).map_err(|e| {
            warn!("spidev configure failed: {}", e);
            ErrorKind::Other
        })
    }

    fn transfer(&mut self, write: Option<&[u8]>, read: Option<&mut [u8]>) -> Result<(), ErrorKind> {
        transfer_on_bus(&mut self.bus, write, read).map_err(|e| e.kind())
    }

    fn end(&mut self) {
        debug!("SPI bus released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags() {
        assert_eq!(mode_flags(Mode::Mode0), SpiModeFlags::SPI_MODE_0);
        assert_eq!(mode_flags(Mode::Mode1), SpiModeFlags::SPI_MODE_1);
        assert_eq!(mode_flags(Mode::Mode2), SpiModeFlags::SPI_MODE_2);
        assert_eq!(mode_flags(Mode::Mode3), SpiModeFlags::SPI_MODE_3);
    }

    #[test]
    fn test_open_missing_device() {
        assert!(LinuxSpi::open(Path::new("/dev/spidev-does-not-exist")).is_err());
    }
}
