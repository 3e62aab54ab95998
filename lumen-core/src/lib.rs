//! Board-agnostic bus session engine
//!
//! This crate holds all the state of the hardware-access surface:
//!
//! - Handle table mapping small integers to live sessions
//! - I2C transaction engine with strict and partial transfer variants
//! - NACK classification for partial transfers
//! - SPI chip-select framing around full-duplex transfers
//! - Pin capability pass-through to the board
//!
//! Everything is driven through [`Hardware`], which owns the platform and
//! both session tables. Calls block the calling thread until the controller
//! is done; there are no internal threads.

#![deny(unsafe_code)]

pub mod classify;
pub mod error;
pub mod handle;
pub mod hardware;
pub mod i2c;
pub mod spi;
pub mod transaction;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;

pub use classify::{classify, TransferResult, TransferStatus};
pub use error::{Error, Result};
pub use handle::{Handle, HandleTable};
pub use hardware::{Hardware, Platform};
pub use transaction::Transaction;
