//! Single-slot ISR-safe mailbox.
//!
//! Hands a value from one execution context to another. Both sides only
//! ever swap the slot contents inside a critical section; any value that
//! falls out of the slot is returned to the caller so it is dropped (and its
//! blocks released) after interrupts are enabled again.

use core::cell::Cell;

use critical_section::Mutex;

/// A slot that is either empty or holds one value.
pub struct Mailbox<T> {
    slot: Mutex<Cell<Option<T>>>,
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox.
    pub const fn new() -> Self {
        Mailbox {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Store `value`, returning whatever was there before.
    ///
    /// A `Some` return means the previous value was never collected.
    pub fn post(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).replace(Some(value)))
    }

    /// Remove and return the current value.
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).take())
    }

    /// Whether a value is waiting.
    pub fn is_filled(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let value = cell.take();
            let filled = value.is_some();
            cell.set(value);
            filled
        })
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
