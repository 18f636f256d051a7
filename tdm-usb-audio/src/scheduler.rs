//! Update responsibility and the block-rate update pass.
//!
//! Exactly one I/O driver paces the audio graph. At bring-up each
//! driver asks [`UpdateScheduler::claim`]; the first one wins and from then on
//! its ISR calls [`UpdateScheduler::run`] once per block period. Drivers
//! whose interrupts are not locked to the block rate (USB) never claim.
//!
//! ```ignore
//! static SCHEDULER: UpdateScheduler = UpdateScheduler::new();
//!
//! // DMA ISR
//! if graph.tdm.isr(&mut dma) {
//!     SCHEDULER.run(|| graph.update_all(&POOL));
//! }
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Arbitrates update responsibility and guards the update pass against
/// reentry.
#[derive(Debug)]
pub struct UpdateScheduler {
    claimed: AtomicBool,
    running: AtomicBool,
    passes: AtomicU32,
    skipped: AtomicU32,
}

impl UpdateScheduler {
    pub const fn new() -> Self {
        UpdateScheduler {
            claimed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            passes: AtomicU32::new(0),
            skipped: AtomicU32::new(0),
        }
    }

    /// Request update responsibility. Returns `true` for the first caller only.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Whether some driver already holds update responsibility.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Run one update pass to completion.
    ///
    /// If a pass is already in progress (a higher-priority interrupt fired
    /// in the middle of it) the new request is dropped and counted instead of
    /// nesting. Returns whether `pass` ran.
    pub fn run<F: FnOnce()>(&self, pass: F) -> bool {
        if self.running.swap(true, Ordering::Acquire) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            trace!("update pass skipped: already running");
            return false;
        }
        pass();
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
        true
    }

    /// Completed update passes.
    pub fn passes(&self) -> u32 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Update requests dropped because a pass was already running.
    pub fn skipped(&self) -> u32 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let sched = UpdateScheduler::new();
        assert!(!sched.is_claimed());
        assert!(sched.claim());
        assert!(!sched.claim());
        assert!(!sched.claim());
        assert!(sched.is_claimed());
    }

    #[test]
    fn run_executes_pass_once() {
        let sched = UpdateScheduler::new();
        let mut calls = 0;
        assert!(sched.run(|| calls += 1));
        assert!(sched.run(|| calls += 1));
        assert_eq!(calls, 2);
        assert_eq!(sched.passes(), 2);
        assert_eq!(sched.skipped(), 0);
    }

    #[test]
    fn nested_run_is_skipped() {
        let sched = UpdateScheduler::new();
        let mut inner_ran = false;
        sched.run(|| {
            inner_ran = sched.run(|| {});
        });
        assert!(!inner_ran);
        assert_eq!(sched.passes(), 1);
        assert_eq!(sched.skipped(), 1);

        // The guard is released after the outer pass.
        assert!(sched.run(|| {}));
    }
}
