//! Stream event counters.
//!
//! Every runtime failure in the I/O paths is handled locally by policy
//! (drop-oldest, silence, drop-frame) and counted here. Counters are plain
//! atomics so diagnostics code may sample them from any context.

use core::sync::atomic::{AtomicU32, Ordering};

/// Monotonic event counter, wrapping on overflow.
#[derive(Debug, Default)]
pub struct Counter(AtomicU32);

impl Counter {
    pub const fn new() -> Self {
        Counter(AtomicU32::new(0))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Counters for one streaming direction.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// The consumer fell behind and the oldest data was discarded.
    pub overruns: Counter,
    /// The producer fell behind and silence was substituted.
    pub underruns: Counter,
    /// A frame was dropped because the block pool was empty.
    pub allocation_failures: Counter,
}

impl StreamStats {
    pub const fn new() -> Self {
        StreamStats {
            overruns: Counter::new(),
            underruns: Counter::new(),
            allocation_failures: Counter::new(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.overruns.reset();
        self.underruns.reset();
        self.allocation_failures.reset();
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            overruns: self.overruns.get(),
            underruns: self.underruns.get(),
            allocation_failures: self.allocation_failures.get(),
        }
    }
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    pub overruns: u32,
    pub underruns: u32,
    pub allocation_failures: u32,
}
