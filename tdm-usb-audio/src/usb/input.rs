//! USB isochronous receive path (host → device).
//!
//! Three pieces cooperate:
//!
//! - [`UsbInputState`] lives somewhere both contexts can reach (a `static`
//!   in firmware). It holds the mailbox for completed block sets, the fill
//!   level the feedback controller needs, and the stream counters.
//! - [`UsbPacketReceiver`] is owned by the USB endpoint ISR. It decodes
//!   packets into the block set it is currently filling.
//! - [`AudioInputUsb`] is the graph node. Each update pass it collects the
//!   newest complete set and nudges the feedback controller.
//!
//! Packets carry 8-byte frames `L1 R1 L2 R2` of little-endian `i16`. A
//! packet may end in the middle of a block; the receiver carries the
//! partial block over to the next packet.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::block::{AudioBlockMut, AudioBlockPool, AudioBlockRef, AudioBlockSet};
use crate::constants::{AUDIO_BLOCK_SAMPLES, USB_CHANNELS, USB_FRAME_BYTES};
use crate::io::mailbox::Mailbox;
use crate::node::AudioNode;
use crate::stats::StreamStats;

use super::feedback::FeedbackController;

/// Receive state shared between the endpoint ISR and the update pass.
pub struct UsbInputState<'p> {
    ready: Mailbox<AudioBlockSet<'p, USB_CHANNELS>>,
    incoming_count: AtomicUsize,
    receive_flag: AtomicBool,
    streaming: AtomicBool,
    /// Overruns, underruns and dropped frames on this direction.
    pub stats: StreamStats,
}

impl<'p> UsbInputState<'p> {
    pub const fn new() -> Self {
        UsbInputState {
            ready: Mailbox::new(),
            incoming_count: AtomicUsize::new(0),
            receive_flag: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            stats: StreamStats::new(),
        }
    }

    /// Whether the host selected the streaming alternate setting.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    pub(crate) fn set_streaming(&self, enabled: bool) {
        self.streaming.store(enabled, Ordering::Relaxed);
    }

    /// Samples per channel in the block the receiver is filling.
    pub fn incoming_count(&self) -> usize {
        self.incoming_count.load(Ordering::Relaxed)
    }

    /// Whether a complete set is waiting for the next update pass.
    pub fn has_ready(&self) -> bool {
        self.ready.is_filled()
    }

    /// Drop any published set. Returns whether one was waiting.
    pub(crate) fn discard_ready(&self) -> bool {
        self.ready.take().is_some()
    }
}

impl Default for UsbInputState<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR-side packet decoder.
pub struct UsbPacketReceiver<'s, 'p> {
    pool: &'p AudioBlockPool,
    state: &'s UsbInputState<'p>,
    incoming: Option<AudioBlockSet<'p, USB_CHANNELS>>,
    count: usize,
}

impl<'s, 'p> UsbPacketReceiver<'s, 'p> {
    pub fn new(pool: &'p AudioBlockPool, state: &'s UsbInputState<'p>) -> Self {
        UsbPacketReceiver {
            pool,
            state,
            incoming: None,
            count: 0,
        }
    }

    /// Decode one received packet.
    ///
    /// Trailing bytes that do not form a whole frame are ignored. If the pool
    /// runs dry the rest of the packet is discarded and the next packet
    /// starts a fresh block. Packets arriving before the host selects the
    /// streaming alternate setting are dropped along with any partial block.
    pub fn receive_packet(&mut self, packet: &[u8]) {
        if !self.state.is_streaming() {
            self.incoming = None;
            self.count = 0;
            self.state.incoming_count.store(0, Ordering::Relaxed);
            return;
        }
        self.state.receive_flag.store(true, Ordering::Relaxed);

        let mut frames = packet.chunks_exact(USB_FRAME_BYTES);
        while frames.len() > 0 {
            if self.incoming.is_none() && !self.start_set() {
                break;
            }
            let count = self.count;
            let Some(set) = self.incoming.as_mut() else {
                break;
            };

            let n = frames.len().min(AUDIO_BLOCK_SAMPLES - count);
            for (i, frame) in frames.by_ref().take(n).enumerate() {
                for ch in 0..USB_CHANNELS {
                    set.channel_mut(ch)[count + i] =
                        i16::from_le_bytes([frame[2 * ch], frame[2 * ch + 1]]);
                }
            }
            self.count = count + n;

            if self.count == AUDIO_BLOCK_SAMPLES {
                self.publish();
            }
        }

        self.state.incoming_count.store(self.count, Ordering::Relaxed);
    }

    /// Samples per channel held in the partial block.
    pub fn count(&self) -> usize {
        self.count
    }

    fn start_set(&mut self) -> bool {
        self.count = 0;
        match AudioBlockSet::alloc(self.pool) {
            Ok(set) => {
                self.incoming = Some(set);
                true
            }
            Err(_) => {
                self.state.stats.allocation_failures.increment();
                trace!("usb rx: pool exhausted, frame dropped");
                false
            }
        }
    }

    fn publish(&mut self) {
        if let Some(full) = self.incoming.take() {
            if let Some(stale) = self.state.ready.post(full) {
                self.state.stats.overruns.increment();
                trace!("usb rx overrun");
                drop(stale);
            }
        }
        self.count = 0;
    }
}

/// Graph node that sources four channels from the host.
pub struct AudioInputUsb<'s, 'p> {
    state: &'s UsbInputState<'p>,
    feedback: &'s FeedbackController,
}

impl<'s, 'p> AudioInputUsb<'s, 'p> {
    pub fn new(state: &'s UsbInputState<'p>, feedback: &'s FeedbackController) -> Self {
        AudioInputUsb { state, feedback }
    }
}

impl<'s, 'p> AudioNode<'p> for AudioInputUsb<'s, 'p> {
    const NUM_INPUTS: usize = 0;
    const NUM_OUTPUTS: usize = USB_CHANNELS;
    const ALLOCATES_OUTPUTS: bool = false;

    fn update(
        &mut self,
        _inputs: &mut [Option<AudioBlockRef<'p>>],
        outputs: &mut [Option<AudioBlockMut<'p>>],
    ) {
        let ready = self.state.ready.take();
        let arrived = self.state.receive_flag.swap(false, Ordering::Relaxed);
        let fill = arrived.then(|| self.state.incoming_count());
        let underrun = ready.is_none();

        if underrun {
            self.state.stats.underruns.increment();
        }
        if self.state.is_streaming() {
            self.feedback.adjust(fill, underrun);
        }

        match ready {
            Some(set) => {
                for (out, block) in outputs.iter_mut().zip(set.into_blocks()) {
                    *out = Some(block);
                }
            }
            None => outputs.iter_mut().for_each(|out| *out = None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::POOL_SIZE;
    use crate::usb::feedback::UsbSpeed;
    use heapless::Vec;

    /// Encode `frames` four-channel frames; channel `ch` of frame `n` holds
    /// `base + ch * 1000 + n`.
    fn packet<const BYTES: usize>(base: i16, frames: usize) -> Vec<u8, BYTES> {
        let mut out = Vec::new();
        for n in 0..frames {
            for ch in 0..USB_CHANNELS {
                let s = base + ch as i16 * 1000 + n as i16;
                out.extend_from_slice(&s.to_le_bytes()).unwrap();
            }
        }
        out
    }

    fn outputs<'p>() -> [Option<AudioBlockMut<'p>>; USB_CHANNELS] {
        Default::default()
    }

    #[test]
    fn full_block_in_one_packet() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        rx.receive_packet(&packet::<1024>(0, AUDIO_BLOCK_SAMPLES));
        assert!(state.has_ready());
        assert_eq!(rx.count(), 0);

        let fb = FeedbackController::new();
        let mut node = AudioInputUsb::new(&state, &fb);
        let mut outs = outputs();
        node.update(&mut [], &mut outs);

        for (ch, out) in outs.iter().enumerate() {
            let block = out.as_ref().unwrap();
            for n in 0..AUDIO_BLOCK_SAMPLES {
                assert_eq!(block[n], ch as i16 * 1000 + n as i16);
            }
        }
        assert_eq!(state.stats.snapshot().underruns, 0);
    }

    #[test]
    fn frames_reassemble_across_packet_boundaries() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        // 44 + 45 + 39 = 128, the last packet ends exactly on the block.
        let mut sent = 0;
        for len in [44usize, 45, 39] {
            let mut bytes: Vec<u8, 512> = Vec::new();
            for n in sent..sent + len {
                for ch in 0..USB_CHANNELS {
                    let s = ch as i16 * 1000 + n as i16;
                    bytes.extend_from_slice(&s.to_le_bytes()).unwrap();
                }
            }
            rx.receive_packet(&bytes);
            sent += len;
            if sent < AUDIO_BLOCK_SAMPLES {
                assert_eq!(state.incoming_count(), sent);
                assert!(!state.has_ready());
            }
        }
        assert!(state.has_ready());

        let fb = FeedbackController::new();
        let mut node = AudioInputUsb::new(&state, &fb);
        let mut outs = outputs();
        node.update(&mut [], &mut outs);
        for (ch, out) in outs.iter().enumerate() {
            let block = out.as_ref().unwrap();
            for n in 0..AUDIO_BLOCK_SAMPLES {
                assert_eq!(block[n], ch as i16 * 1000 + n as i16, "ch {ch} sample {n}");
            }
        }
    }

    #[test]
    fn packet_spanning_block_boundary_carries_remainder() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        rx.receive_packet(&packet::<1024>(0, 100));
        rx.receive_packet(&packet::<512>(100, 45));
        assert!(state.has_ready());
        assert_eq!(rx.count(), 17);
        assert_eq!(state.incoming_count(), 17);
    }

    #[test]
    fn trailing_partial_frame_is_ignored() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        let mut bytes = packet::<64>(0, 3);
        bytes.extend_from_slice(&[1, 2, 3]).unwrap();
        rx.receive_packet(&bytes);
        assert_eq!(rx.count(), 3);
    }

    #[test]
    fn unread_set_is_replaced_and_counted() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        rx.receive_packet(&packet::<1024>(0, AUDIO_BLOCK_SAMPLES));
        rx.receive_packet(&packet::<1024>(7, AUDIO_BLOCK_SAMPLES));
        rx.receive_packet(&packet::<1024>(9, AUDIO_BLOCK_SAMPLES));

        assert_eq!(state.stats.snapshot().overruns, 2);
        // Only the newest set is held.
        assert_eq!(pool.allocated_count() as usize, USB_CHANNELS);

        let fb = FeedbackController::new();
        let mut node = AudioInputUsb::new(&state, &fb);
        let mut outs = outputs();
        node.update(&mut [], &mut outs);
        assert_eq!(outs[0].as_ref().unwrap()[0], 9);
    }

    #[test]
    fn exhausted_pool_drops_the_packet() {
        let pool = AudioBlockPool::new();
        let mut hog: Vec<AudioBlockMut<'_>, POOL_SIZE> = Vec::new();
        while let Some(block) = AudioBlockMut::alloc(&pool) {
            hog.push(block).unwrap();
        }

        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);
        rx.receive_packet(&packet::<512>(0, 44));

        assert_eq!(rx.count(), 0);
        assert_eq!(state.incoming_count(), 0);
        assert!(!state.has_ready());
        assert_eq!(state.stats.snapshot().allocation_failures, 1);

        // Pool recovers; the next packet starts a fresh block.
        hog.clear();
        rx.receive_packet(&packet::<512>(0, 44));
        assert_eq!(rx.count(), 44);
    }

    #[test]
    fn replacement_alloc_failure_after_publish_restarts_cleanly() {
        let pool = AudioBlockPool::new();
        // Room for exactly one set.
        let mut hog: Vec<AudioBlockMut<'_>, POOL_SIZE> = Vec::new();
        for _ in 0..POOL_SIZE - USB_CHANNELS {
            hog.push(AudioBlockMut::alloc(&pool).unwrap()).unwrap();
        }

        let state = UsbInputState::new();
        state.set_streaming(true);
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        rx.receive_packet(&packet::<1024>(0, 100));
        assert_eq!(rx.count(), 100);

        // 28 frames complete the set; the 17 left over find no blocks.
        rx.receive_packet(&packet::<512>(100, 45));
        assert!(state.has_ready());
        assert_eq!(rx.count(), 0);
        assert_eq!(state.incoming_count(), 0);
        assert_eq!(state.stats.snapshot().allocation_failures, 1);
        assert_eq!(state.stats.snapshot().overruns, 0);

        // Once blocks come back the next packet starts a fresh block.
        hog.truncate(hog.len() - USB_CHANNELS);
        rx.receive_packet(&packet::<512>(0, 10));
        assert_eq!(rx.count(), 10);
        assert_eq!(state.incoming_count(), 10);
    }

    #[test]
    fn packets_ignored_until_streaming() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        let mut rx = UsbPacketReceiver::new(&pool, &state);

        rx.receive_packet(&packet::<1024>(0, AUDIO_BLOCK_SAMPLES));
        assert!(!state.has_ready());
        assert_eq!(pool.allocated_count(), 0);

        state.set_streaming(true);
        rx.receive_packet(&packet::<512>(0, 40));
        assert_eq!(rx.count(), 40);

        // Host switches back to the zero-bandwidth setting mid-block.
        state.set_streaming(false);
        rx.receive_packet(&packet::<512>(40, 40));
        assert_eq!(rx.count(), 0);
        assert_eq!(state.incoming_count(), 0);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn missing_set_is_an_underrun_with_no_output() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        let fb = FeedbackController::new();
        let mut node = AudioInputUsb::new(&state, &fb);

        let mut outs: [Option<AudioBlockMut<'_>>; USB_CHANNELS] =
            core::array::from_fn(|_| AudioBlockMut::alloc(&pool));
        node.update(&mut [], &mut outs);

        assert!(outs.iter().all(Option::is_none));
        assert_eq!(state.stats.snapshot().underruns, 1);
        drop(outs);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn update_drives_feedback_while_streaming() {
        let pool = AudioBlockPool::new();
        let state = UsbInputState::new();
        let fb = FeedbackController::new();
        fb.configure(44_100, UsbSpeed::Full);
        let nominal = fb.nominal();
        let mut rx = UsbPacketReceiver::new(&pool, &state);
        let mut node = AudioInputUsb::new(&state, &fb);

        // Not streaming: feedback untouched.
        node.update(&mut [], &mut outputs());
        assert_eq!(fb.accumulator(), nominal);

        state.set_streaming(true);

        // Underrun with no packets: only the fixed delta.
        node.update(&mut [], &mut outputs());
        assert_eq!(
            fb.accumulator(),
            nominal + crate::constants::UNDERRUN_FEEDBACK_DELTA
        );

        // A packet arrived and left 10 samples pending, plus an underrun.
        rx.receive_packet(&packet::<128>(0, 10));
        node.update(&mut [], &mut outputs());
        assert_eq!(
            fb.accumulator(),
            nominal + 2 * crate::constants::UNDERRUN_FEEDBACK_DELTA + 54
        );
    }
}
