//! Handle table
//!
//! Maps small integer handles to live sessions. Allocation is first-fit, so
//! a burst of open/close cycles keeps reusing the same few handle values.
//!
//! # Locking
//!
//! The table lock is held only while a slot is looked up, filled or emptied.
//! Each session sits behind its own lock, which an operation holds for its
//! whole duration. Transfers on different handles therefore run in parallel,
//! while two operations on the same handle run one after the other.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// Session handle
///
/// Non-negative values name table slots; `-1` means "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(i32);

impl Handle {
    /// The "no session" handle reported when an open fails
    pub const INVALID: Handle = Handle(-1);

    /// Wrap a raw handle value
    pub const fn from_raw(raw: i32) -> Self {
        Handle(raw)
    }

    /// Raw handle value
    pub const fn raw(self) -> i32 {
        self.0
    }

    fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A table entry. `None` inside the mutex means the session was closed
/// while someone still held the entry.
type Slot<S> = Arc<Mutex<Option<S>>>;

/// Slot allocator for sessions of type `S`
pub struct HandleTable<S> {
    slots: Mutex<Vec<Option<Slot<S>>>>,
}

impl<S> Default for HandleTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> HandleTable<S> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Store `session` in the first empty slot, appending if there is none
    pub fn allocate(&self, session: S) -> Handle {
        let entry = Arc::new(Mutex::new(Some(session)));
        let mut slots = lock(&self.slots);

        let index = match slots.iter().position(Option::is_none) {
            Some(index) => {
                slots[index] = Some(entry);
                index
            }
            None => {
                slots.push(Some(entry));
                slots.len() - 1
            }
        };

        // Tables never approach i32::MAX entries
        Handle(index as i32)
    }

    /// Run `f` on the live session behind `handle`
    ///
    /// The session stays locked for the duration of `f`.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&mut S) -> Result<R>) -> Result<R> {
        let slot = self.slot(handle)?;
        let mut session = lock(&slot);
        match session.as_mut() {
            Some(session) => f(session),
            None => Err(Error::InvalidHandle(handle)),
        }
    }

    /// Empty the slot behind `handle` and hand its session to `close`
    ///
    /// Waits for any operation in flight on the session to finish first.
    /// Returns `None`, without calling `close`, if the handle does not name
    /// a live session.
    pub fn release<R>(&self, handle: Handle, close: impl FnOnce(S) -> R) -> Option<R> {
        let slot = {
            let mut slots = lock(&self.slots);
            slots.get_mut(handle.index()?)?.take()?
        };
        let session = lock(&slot).take();
        session.map(close)
    }

    /// Close every live session, returning how many there were
    pub fn release_all(&self, mut close: impl FnMut(Handle, S)) -> usize {
        let taken: Vec<(usize, Slot<S>)> = {
            let mut slots = lock(&self.slots);
            slots
                .iter_mut()
                .enumerate()
                .filter_map(|(index, slot)| slot.take().map(|slot| (index, slot)))
                .collect()
        };

        let mut closed = 0;
        for (index, slot) in taken {
            if let Some(session) = lock(&slot).take() {
                close(Handle(index as i32), session);
                closed += 1;
            }
        }
        closed
    }

    /// Number of slots, live or empty
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Check if the table has never held a session
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live sessions
    pub fn live(&self) -> usize {
        lock(&self.slots).iter().filter(|slot| slot.is_some()).count()
    }

    fn slot(&self, handle: Handle) -> Result<Slot<S>> {
        let slots = lock(&self.slots);
        handle
            .index()
            .and_then(|index| slots.get(index))
            .and_then(|slot| slot.clone())
            .ok_or(Error::InvalidHandle(handle))
    }
}
