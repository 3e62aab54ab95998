//! Board description
//!
//! A small TOML file tells the Linux platform which board it runs on and
//! where its buses live:
//!
//! ```toml
//! board = "pi2-bare"
//!
//! [[i2c]]
//! bus = 1
//! device = "/dev/i2c-1"
//! pins = [2, 3]
//!
//! [spi]
//! device = "/dev/spidev0.0"
//! chip_select = 8
//!
//! [[pin]]
//! number = 2
//! functions = ["digital", "i2c"]
//! ```
//!
//! Without any `[[pin]]` entries every pin is assumed to support every
//! function.

use core::fmt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::{debug, info};
use lumen_hal::{BoardType, PinFunction};
use serde::Deserialize;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "LUMEN_CONFIG";

/// Config file used when neither a path nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lumen/board.toml";

/// Built-in description used when the default file does not exist
const EMBEDDED_DEFAULT: &str = include_str!("default.toml");

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// Config file is not valid TOML for a board description
    Parse(toml::de::Error),
    /// Config parsed but describes an impossible board
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "invalid board config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid board config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// One I2C bus
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct I2cBusConfig {
    /// Bus number callers pass to `i2c_init`
    pub bus: u8,
    /// Character device, e.g. `/dev/i2c-1`
    pub device: PathBuf,
    /// SDA and SCL, locked to I2C while a session is open
    #[serde(default)]
    pub pins: Vec<u8>,
}

/// The SPI bus
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpiBusConfig {
    /// Character device, e.g. `/dev/spidev0.0`
    pub device: PathBuf,
    /// GPIO driven as chip select
    pub chip_select: u8,
}

/// Capabilities of one pin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    /// GPIO number
    pub number: u8,
    /// Functions the pin can be muxed to
    pub functions: Vec<PinFunction>,
}

/// Board description
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Board variant
    pub board: BoardType,
    /// I2C buses, by caller-visible bus number
    #[serde(default)]
    pub i2c: Vec<I2cBusConfig>,
    /// SPI bus, if the board has one wired
    #[serde(default)]
    pub spi: Option<SpiBusConfig>,
    /// Pin capability table
    #[serde(default, rename = "pin")]
    pub pins: Vec<PinConfig>,
}

impl BoardConfig {
    /// Parse and validate a description
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BoardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in Raspberry Pi 2 description
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml_str(EMBEDDED_DEFAULT)
    }

    /// Load the description from `path`, `$LUMEN_CONFIG`, or the default
    /// location, in that order
    ///
    /// An explicit path or environment setting must name a readable file.
    /// Only a missing file at the default location falls back to the
    /// built-in description.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::read(path);
        }
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::read(Path::new(&path));
        }

        match fs::read_to_string(DEFAULT_CONFIG_PATH) {
            Ok(text) => {
                info!("Board config: {}", DEFAULT_CONFIG_PATH);
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Board config: built-in default");
                Self::embedded_default()
            }
            Err(source) => Err(ConfigError::Io {
                path: PathBuf::from(DEFAULT_CONFIG_PATH),
                source,
            }),
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        info!("Board config: {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut buses = HashSet::new();
        for bus in &self.i2c {
            if !buses.insert(bus.bus) {
                return Err(ConfigError::Invalid(format!(
                    "I2C bus {} listed twice",
                    bus.bus
                )));
            }
        }

        let mut pins = HashSet::new();
        for pin in &self.pins {
            if !pins.insert(pin.number) {
                return Err(ConfigError::Invalid(format!(
                    "pin {} listed twice",
                    pin.number
                )));
            }
        }

        for bus in &self.i2c {
            for &pin in &bus.pins {
                self.require_function(pin, PinFunction::I2c)?;
            }
        }
        if let Some(spi) = &self.spi {
            self.require_function(spi.chip_select, PinFunction::Spi)?;
        }

        debug!(
            "Board {:?}: {} I2C bus(es), SPI {}, {} pin(s)",
            self.board,
            self.i2c.len(),
            if self.spi.is_some() { "yes" } else { "no" },
            self.pins.len()
        );
        Ok(())
    }

    fn require_function(&self, pin: u8, function: PinFunction) -> Result<(), ConfigError> {
        if self.pins.is_empty() {
            return Ok(());
        }
        match self.pins.iter().find(|entry| entry.number == pin) {
            None => Err(ConfigError::Invalid(format!(
                "pin {} is not in the pin table",
                pin
            ))),
            Some(entry) if !entry.functions.contains(&function) => Err(ConfigError::Invalid(
                format!("pin {} does not support {:?}", pin, function),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Pins carrying I2C bus `bus`
    pub fn i2c_pins(&self, bus: u8) -> &[u8] {
        self.i2c
            .iter()
            .find(|entry| entry.bus == bus)
            .map(|entry| entry.pins.as_slice())
            .unwrap_or(&[])
    }

    /// Device for I2C bus `bus`
    pub fn i2c_device(&self, bus: u8) -> Option<&Path> {
        self.i2c
            .iter()
            .find(|entry| entry.bus == bus)
            .map(|entry| entry.device.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default() {
        let config = BoardConfig::embedded_default().unwrap();
        assert_eq!(config.board, BoardType::Pi2Bare);
        assert_eq!(config.i2c_device(1), Some(Path::new("/dev/i2c-1")));
        assert_eq!(config.i2c_device(0), None);
        assert_eq!(config.i2c_pins(1), &[2, 3]);
        assert!(config.i2c_pins(0).is_empty());

        let spi = config.spi.unwrap();
        assert_eq!(spi.device, PathBuf::from("/dev/spidev0.0"));
        assert_eq!(spi.chip_select, 8);
        assert_eq!(config.pins.len(), 26);
    }

    #[test]
    fn test_minimal_config() {
        let config = BoardConfig::from_toml_str(r#"board = "mbm-bare""#).unwrap();
        assert_eq!(config.board, BoardType::MbmBare);
        assert!(config.i2c.is_empty());
        assert!(config.spi.is_none());
        assert!(config.pins.is_empty());
    }

    #[test]
    fn test_pin_functions() {
        let config = BoardConfig::from_toml_str(
            r#"
            board = "mbm-bare"

            [[pin]]
            number = 5
            functions = ["digital", "pwm", "analog"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.pins[0].functions,
            vec![PinFunction::Digital, PinFunction::Pwm, PinFunction::Analog]
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            BoardConfig::from_toml_str(r#"board = "pi3""#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BoardConfig::from_toml_str("board = \"pi2-bare\"\nextra = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BoardConfig::from_toml_str(""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let text = r#"
            board = "pi2-bare"
            [[i2c]]
            bus = 1
            device = "/dev/i2c-1"
            [[i2c]]
            bus = 1
            device = "/dev/i2c-2"
        "#;
        assert!(matches!(
            BoardConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));

        let text = r#"
            board = "pi2-bare"
            [spi]
            device = "/dev/spidev0.0"
            chip_select = 30
            [[pin]]
            number = 8
            functions = ["spi"]
        "#;
        assert!(matches!(
            BoardConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bus_pins_need_their_function() {
        let text = r#"
            board = "pi2-bare"
            [[i2c]]
            bus = 1
            device = "/dev/i2c-1"
            pins = [2, 4]
            [[pin]]
            number = 2
            functions = ["digital", "i2c"]
            [[pin]]
            number = 4
            functions = ["digital"]
        "#;
        let err = BoardConfig::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("pin 4"));

        let text = r#"
            board = "pi2-bare"
            [spi]
            device = "/dev/spidev0.0"
            chip_select = 8
            [[pin]]
            number = 8
            functions = ["digital"]
        "#;
        assert!(matches!(
            BoardConfig::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = BoardConfig::load(Some(Path::new("/nonexistent/lumen.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/lumen.toml"));
    }
}
