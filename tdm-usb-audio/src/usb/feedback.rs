//! Isochronous feedback (USB 2.0 §5.12.4.2).
//!
//! The host clocks OUT packets from its own sample clock; the device plays
//! them out at the TDM master's rate. The feedback endpoint tells the host
//! how many samples per frame the device actually wants, so the two clocks
//! stay reconciled without resampling.
//!
//! The controller keeps a fixed-point accumulator in units of
//! `samples_per_ms × 2^24`. Once per update pass it is nudged towards
//! keeping the receive buffer half full, and bumped upward whenever the
//! device ran dry. The feedback ISR reads it at any time; it has a single
//! writer (the update pass) and word-sized loads, so a plain atomic is
//! enough.
//!
//! | Bus speed | Report bytes | Shift | Format |
//! |-----------|--------------|-------|--------|
//! | Full      | 3            | 10    | 10.14  |
//! | High      | 4            | 8     | 16.16  |

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::constants::{AUDIO_BLOCK_SAMPLES, UNDERRUN_FEEDBACK_DELTA};

/// Negotiated USB bus speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbSpeed {
    Full,
    High,
}

/// Wire format of the feedback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedbackFormat {
    /// Bytes sent per feedback packet.
    pub nbytes: u8,
    /// Right shift applied to the accumulator.
    pub rshift: u8,
}

impl FeedbackFormat {
    pub const FULL_SPEED: FeedbackFormat = FeedbackFormat { nbytes: 3, rshift: 10 };
    pub const HIGH_SPEED: FeedbackFormat = FeedbackFormat { nbytes: 4, rshift: 8 };

    pub fn for_speed(speed: UsbSpeed) -> Self {
        match speed {
            UsbSpeed::Full => Self::FULL_SPEED,
            UsbSpeed::High => Self::HIGH_SPEED,
        }
    }
}

/// One encoded feedback packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedbackReport {
    bytes: [u8; 4],
    len: u8,
}

impl FeedbackReport {
    /// Bytes to hand to the sync endpoint.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Accumulator value for a nominal sample rate, e.g. `739_875_226` for
/// 44.1 kHz.
pub fn nominal_accumulator(sample_rate_hz: u32) -> u32 {
    libm::round(sample_rate_hz as f64 / 1000.0 * 16_777_216.0) as u32
}

/// Rate feedback state shared by the update pass and the sync endpoint ISR.
#[derive(Debug)]
pub struct FeedbackController {
    accumulator: AtomicU32,
    nominal: AtomicU32,
    nbytes: AtomicU8,
    rshift: AtomicU8,
}

impl FeedbackController {
    /// An unconfigured controller. It reports zero until
    /// [`configure`](Self::configure) runs.
    pub const fn new() -> Self {
        FeedbackController {
            accumulator: AtomicU32::new(0),
            nominal: AtomicU32::new(0),
            nbytes: AtomicU8::new(FeedbackFormat::FULL_SPEED.nbytes),
            rshift: AtomicU8::new(FeedbackFormat::FULL_SPEED.rshift),
        }
    }

    /// Seed the accumulator and choose the wire format for the negotiated
    /// speed. Runs at each USB configuration.
    pub fn configure(&self, sample_rate_hz: u32, speed: UsbSpeed) {
        let nominal = nominal_accumulator(sample_rate_hz);
        let format = FeedbackFormat::for_speed(speed);
        self.nominal.store(nominal, Ordering::Relaxed);
        self.nbytes.store(format.nbytes, Ordering::Relaxed);
        self.rshift.store(format.rshift, Ordering::Relaxed);
        self.accumulator.store(nominal, Ordering::Release);
    }

    /// Apply one update pass worth of correction.
    ///
    /// `fill` is the number of samples sitting in the partially received
    /// block, or `None` if no packet arrived since the previous pass.
    /// `underrun` means the pass found no complete block to play.
    pub fn adjust(&self, fill: Option<usize>, underrun: bool) {
        let nominal = self.nominal.load(Ordering::Relaxed) as i64;
        let margin = nominal / 16;
        let mut value = self.accumulator.load(Ordering::Relaxed) as i64;

        if let Some(count) = fill {
            value += (AUDIO_BLOCK_SAMPLES / 2) as i64 - count as i64;
        }
        if underrun {
            value += UNDERRUN_FEEDBACK_DELTA as i64;
        }

        let value = value.clamp(nominal - margin, nominal + margin);
        self.accumulator.store(value as u32, Ordering::Release);
    }

    /// Raw accumulator value.
    pub fn accumulator(&self) -> u32 {
        self.accumulator.load(Ordering::Acquire)
    }

    /// Accumulator value the controller was seeded with.
    pub fn nominal(&self) -> u32 {
        self.nominal.load(Ordering::Relaxed)
    }

    /// Current wire format.
    pub fn format(&self) -> FeedbackFormat {
        FeedbackFormat {
            nbytes: self.nbytes.load(Ordering::Relaxed),
            rshift: self.rshift.load(Ordering::Relaxed),
        }
    }

    /// Encode the current value for the sync endpoint.
    pub fn report(&self) -> FeedbackReport {
        let format = self.format();
        let value = self.accumulator() >> format.rshift;
        FeedbackReport {
            bytes: value.to_le_bytes(),
            len: format.nbytes,
        }
    }
}

impl Default for FeedbackController {
    fn default() -> Self {
        Self::new()
    }
}
