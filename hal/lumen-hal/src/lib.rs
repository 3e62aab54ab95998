//! Lumen Hardware Abstraction Layer
//!
//! This crate defines the capabilities the Lumen session engine drives:
//! per-protocol bus controllers and the board's pin capability. Platform
//! crates (Linux userspace, test fakes) implement them; `lumen-core` only
//! ever talks to these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  lumen-capi (C surface, lifecycle)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  lumen-core (handles, transactions)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  lumen-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ lumen-hal-    │       │ lumen-core    │
//! │    linux      │       │   fakes       │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`board::BoardPins`] - Board type, pin function locks, digital pin I/O
//! - [`i2c::I2cController`] - I2C master sessions
//! - [`spi::SpiController`] - SPI master sessions

#![no_std]
#![deny(unsafe_code)]

pub mod board;
pub mod i2c;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use board::{BoardPins, BoardType, LockAction, PinError, PinFunction, PinMode};
pub use i2c::{I2cAdapter, I2cController, I2cSpeed};
pub use spi::{BitOrder, Mode, SpiConfig, SpiController};
