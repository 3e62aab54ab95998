//! Process-wide runtime state
//!
//! The C surface has no context pointer, so one [`Runtime`] lives in a
//! static. It stays empty until `lumen_initialize` builds the hardware
//! subsystem, and `lumen_shutdown` empties it again.

use std::sync::{Arc, PoisonError, RwLock};

use log::info;
use lumen_core::{Hardware, Platform};

use crate::status::{self, Status};

/// Holder for the initialized hardware subsystem
pub struct Runtime<P: Platform> {
    hardware: RwLock<Option<Arc<Hardware<P>>>>,
}

impl<P: Platform> Runtime<P> {
    /// An uninitialized runtime
    pub const fn new() -> Self {
        Self {
            hardware: RwLock::new(None),
        }
    }

    /// Build the subsystem from the platform `build` returns
    ///
    /// `build` runs only if the runtime is not initialized yet.
    pub fn initialize(&self, build: impl FnOnce() -> Result<P, Status>) -> Status {
        let mut hardware = self
            .hardware
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if hardware.is_some() {
            return status::ALREADY_INITIALIZED;
        }

        match build() {
            Ok(platform) => {
                *hardware = Some(Arc::new(Hardware::new(platform)));
                info!("Initialized");
                status::OK
            }
            Err(code) => code,
        }
    }

    /// Close every session and drop the subsystem
    ///
    /// Returns how many sessions were still open.
    pub fn shutdown(&self) -> usize {
        let hardware = self
            .hardware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match hardware {
            Some(hardware) => {
                let closed = hardware.close_all();
                info!("Shut down, closed {} session(s)", closed);
                closed
            }
            None => 0,
        }
    }

    /// The subsystem, if initialized
    ///
    /// Callers keep their own reference, so a concurrent shutdown never
    /// pulls the subsystem out from under a call in progress. Sessions
    /// cannot be opened through a reference that outlives the shutdown.
    pub fn hardware(&self) -> Option<Arc<Hardware<P>>> {
        self.hardware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `f` against the subsystem and report its status
    pub fn call(&self, f: impl FnOnce(&Hardware<P>) -> lumen_core::Result<()>) -> Status {
        match self.hardware() {
            Some(hardware) => status::status(f(&hardware)),
            None => status::NOT_INITIALIZED,
        }
    }
}

impl<P: Platform> Default for Runtime<P> {
    fn default() -> Self {
        Self::new()
    }
}
