//! Scriptable fake platform for tests
//!
//! [`FakePlatform`] hands out controllers that share one [`Probe`]. Tests
//! script device behavior through the probe and read back what the engine
//! did, in order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{self, OutputPin, PinState};
use embedded_hal::i2c::{self, Operation, SevenBitAddress};
use embedded_hal::spi;
use lumen_hal::{
    BoardPins, BoardType, I2cController, I2cSpeed, LockAction, PinError, PinFunction, PinMode,
    SpiConfig, SpiController,
};

use crate::error::{Error, Result};
use crate::handle::lock;
use crate::hardware::Platform;

/// Pin the fake board wires as SPI chip select
pub const FAKE_CHIP_SELECT: u8 = 5;

/// Pins the fake board wires to every I2C bus
pub const FAKE_I2C_PINS: [u8; 2] = [2, 3];

/// Highest pin number on the fake board
pub const FAKE_MAX_PIN: u8 = 31;

/// Something the engine did to the fake hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// I2C controller started
    I2cBegin { bus: u8, speed: I2cSpeed },
    /// I2C transaction run
    I2cExecute {
        address: SevenBitAddress,
        written: Vec<u8>,
        read_len: usize,
    },
    /// I2C controller released
    I2cEnd { bus: u8 },
    /// SPI controller started
    SpiBegin(SpiConfig),
    /// SPI transfer attempted
    SpiTransfer { len: usize },
    /// SPI controller released
    SpiEnd,
    /// Chip-select pin opened as output
    ChipSelectOpened(u8),
    /// Chip-select pin driven
    ChipSelect(PinState),
    /// Pin direction changed through the board
    PinMode(u8, PinMode),
}

/// How the fake I2C device answers a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cBehavior {
    /// Acknowledge everything
    Ack,
    /// Fail with the given error kind
    Fail(i2c::ErrorKind),
    /// Succeed but report only this many bytes moved
    Short(usize),
}

struct State {
    events: Vec<Event>,
    i2c_behavior: I2cBehavior,
    i2c_response: Vec<u8>,
    spi_failure: Option<spi::ErrorKind>,
    fail_select: bool,
    fail_deselect: bool,
    open_failure: Option<Error>,
    pins: HashMap<u8, (PinMode, PinState)>,
    locks: HashMap<u8, PinFunction>,
}

/// Shared view of the fake hardware
#[derive(Clone)]
pub struct Probe(Arc<Mutex<State>>);

impl Probe {
    fn new() -> Self {
        Probe(Arc::new(Mutex::new(State {
            events: Vec::new(),
            i2c_behavior: I2cBehavior::Ack,
            i2c_response: Vec::new(),
            spi_failure: None,
            fail_select: false,
            fail_deselect: false,
            open_failure: None,
            pins: HashMap::new(),
            locks: HashMap::new(),
        })))
    }

    fn record(&self, event: Event) {
        lock(&self.0).events.push(event);
    }

    /// Script the I2C device
    pub fn set_i2c_behavior(&self, behavior: I2cBehavior) {
        lock(&self.0).i2c_behavior = behavior;
    }

    /// Bytes the I2C device returns on reads, padded with 0xFF
    pub fn set_i2c_response(&self, response: &[u8]) {
        lock(&self.0).i2c_response = response.to_vec();
    }

    /// Make SPI transfers fail
    pub fn fail_spi(&self, failure: Option<spi::ErrorKind>) {
        lock(&self.0).spi_failure = failure;
    }

    /// Make driving chip select low fail
    pub fn fail_select(&self, fail: bool) {
        lock(&self.0).fail_select = fail;
    }

    /// Make driving chip select high fail (the attempt is still recorded)
    pub fn fail_deselect(&self, fail: bool) {
        lock(&self.0).fail_deselect = fail;
    }

    /// Make opening controllers fail
    pub fn fail_open(&self, failure: Option<Error>) {
        lock(&self.0).open_failure = failure;
    }

    /// Every event so far
    pub fn events(&self) -> Vec<Event> {
        lock(&self.0).events.clone()
    }

    /// Chip-select and SPI transfer events only
    pub fn framing(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::ChipSelect(_) | Event::SpiTransfer { .. }))
            .collect()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        lock(&self.0).events.clear();
    }

    /// Number of I2C controllers released
    pub fn i2c_ends(&self) -> usize {
        self.count(|e| matches!(e, Event::I2cEnd { .. }))
    }

    /// Number of SPI controllers released
    pub fn spi_ends(&self) -> usize {
        self.count(|e| matches!(e, Event::SpiEnd))
    }

    /// Function a pin is locked to, if any
    pub fn lock_holder(&self, pin: u8) -> Option<PinFunction> {
        lock(&self.0).locks.get(&pin).copied()
    }

    /// Current direction of a pin, if it was ever configured
    pub fn pin_mode(&self, pin: u8) -> Option<PinMode> {
        lock(&self.0).pins.get(&pin).map(|(mode, _)| *mode)
    }

    fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        lock(&self.0).events.iter().filter(|e| f(e)).count()
    }
}

/// Fake I2C controller
pub struct FakeI2c {
    bus: u8,
    probe: Probe,
}

impl I2cController for FakeI2c {
    type Error = i2c::ErrorKind;

    fn begin(&mut self, speed: I2cSpeed) -> core::result::Result<(), Self::Error> {
        self.probe.record(Event::I2cBegin {
            bus: self.bus,
            speed,
        });
        Ok(())
    }

    fn execute(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> core::result::Result<usize, Self::Error> {
        let mut written = Vec::new();
        let mut read_len = 0;
        let (behavior, response) = {
            let state = lock(&self.probe.0);
            (state.i2c_behavior, state.i2c_response.clone())
        };

        for op in operations.iter_mut() {
            match op {
                Operation::Write(data) => written.extend_from_slice(data),
                Operation::Read(buf) => {
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = response.get(read_len + i).copied().unwrap_or(0xFF);
                    }
                    read_len += buf.len();
                }
            }
        }
        let total = written.len() + read_len;

        self.probe.record(Event::I2cExecute {
            address,
            written,
            read_len,
        });

        match behavior {
            I2cBehavior::Ack => Ok(total),
            I2cBehavior::Fail(kind) => Err(kind),
            I2cBehavior::Short(moved) => Ok(moved),
        }
    }

    fn end(&mut self) {
        self.probe.record(Event::I2cEnd { bus: self.bus });
    }
}

/// Fake SPI controller wired in loopback (MOSI to MISO)
pub struct FakeSpi {
    probe: Probe,
}

impl SpiController for FakeSpi {
    type Error = spi::ErrorKind;

    fn begin(&mut self, config: &SpiConfig) -> core::result::Result<(), Self::Error> {
        self.probe.record(Event::SpiBegin(*config));
        Ok(())
    }

    fn transfer(
        &mut self,
        write: Option<&[u8]>,
        read: Option<&mut [u8]>,
    ) -> core::result::Result<(), Self::Error> {
        let len = write.map(<[u8]>::len).or(read.as_ref().map(|r| r.len())).unwrap_or(0);
        self.probe.record(Event::SpiTransfer { len });

        // Give a concurrent caller a chance to interleave
        std::thread::yield_now();

        if let Some(kind) = lock(&self.probe.0).spi_failure {
            return Err(kind);
        }
        if let Some(read) = read {
            match write {
                Some(write) => read.copy_from_slice(write),
                None => read.fill(0),
            }
        }
        Ok(())
    }

    fn end(&mut self) {
        self.probe.record(Event::SpiEnd);
    }
}

/// Fake chip-select output
pub struct FakeChipSelect {
    probe: Probe,
}

impl digital::ErrorType for FakeChipSelect {
    type Error = digital::ErrorKind;
}

impl OutputPin for FakeChipSelect {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        if lock(&self.probe.0).fail_select {
            return Err(digital::ErrorKind::Other);
        }
        self.probe.record(Event::ChipSelect(PinState::Low));
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.probe.record(Event::ChipSelect(PinState::High));
        if lock(&self.probe.0).fail_deselect {
            return Err(digital::ErrorKind::Other);
        }
        Ok(())
    }
}

/// Fake board with every pin able to do every function
pub struct FakePlatform {
    board: BoardType,
    probe: Probe,
}

impl FakePlatform {
    /// Create a fake board of the given variant
    pub fn new(board: BoardType) -> Self {
        Self {
            board,
            probe: Probe::new(),
        }
    }

    /// Handle for scripting and inspecting the fake hardware
    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    fn check_open(&self) -> Result<()> {
        match lock(&self.probe.0).open_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn check_pin(pin: u8) -> core::result::Result<(), PinError> {
    if pin > FAKE_MAX_PIN {
        Err(PinError::InvalidPin)
    } else {
        Ok(())
    }
}

fn check_digital(state: &State, pin: u8) -> core::result::Result<(), PinError> {
    check_pin(pin)?;
    match state.locks.get(&pin) {
        Some(locked) if *locked != PinFunction::Digital => Err(PinError::Locked),
        _ => Ok(()),
    }
}

impl BoardPins for FakePlatform {
    fn board_type(&self) -> core::result::Result<BoardType, PinError> {
        Ok(self.board)
    }

    fn verify_pin_function(
        &mut self,
        pin: u8,
        function: PinFunction,
        action: LockAction,
    ) -> core::result::Result<(), PinError> {
        check_pin(pin)?;
        let mut state = lock(&self.probe.0);
        match state.locks.get(&pin) {
            Some(locked) if *locked != function => return Err(PinError::Locked),
            _ => {}
        }
        match action {
            LockAction::NoLock => {}
            LockAction::Lock => {
                state.locks.insert(pin, function);
            }
            LockAction::Unlock => {
                state.locks.remove(&pin);
            }
        }
        Ok(())
    }

    fn set_pin_mode(
        &mut self,
        pin: u8,
        mode: PinMode,
        _pull_up: bool,
    ) -> core::result::Result<(), PinError> {
        let mut state = lock(&self.probe.0);
        check_digital(&state, pin)?;
        state.pins.insert(pin, (mode, PinState::Low));
        state.events.push(Event::PinMode(pin, mode));
        Ok(())
    }

    fn set_pin_state(&mut self, pin: u8, level: PinState) -> core::result::Result<(), PinError> {
        let mut state = lock(&self.probe.0);
        check_digital(&state, pin)?;
        match state.pins.get_mut(&pin) {
            Some((PinMode::Output, current)) => {
                *current = level;
                Ok(())
            }
            _ => Err(PinError::Unsupported),
        }
    }

    fn get_pin_state(&mut self, pin: u8) -> core::result::Result<PinState, PinError> {
        let state = lock(&self.probe.0);
        check_digital(&state, pin)?;
        Ok(state
            .pins
            .get(&pin)
            .map(|(_, level)| *level)
            .unwrap_or(PinState::Low))
    }
}

impl Platform for FakePlatform {
    type I2c = FakeI2c;
    type Spi = FakeSpi;
    type ChipSelect = FakeChipSelect;

    fn open_i2c(&mut self, bus: u8) -> Result<FakeI2c> {
        self.check_open()?;
        Ok(FakeI2c {
            bus,
            probe: self.probe(),
        })
    }

    fn i2c_pins(&self, _bus: u8) -> Vec<u8> {
        FAKE_I2C_PINS.to_vec()
    }

    fn open_spi(&mut self) -> Result<FakeSpi> {
        self.check_open()?;
        Ok(FakeSpi {
            probe: self.probe(),
        })
    }

    fn chip_select_pin(&self) -> u8 {
        FAKE_CHIP_SELECT
    }

    fn open_chip_select(&mut self, pin: u8) -> Result<FakeChipSelect> {
        self.probe.record(Event::ChipSelectOpened(pin));
        Ok(FakeChipSelect {
            probe: self.probe(),
        })
    }
}
