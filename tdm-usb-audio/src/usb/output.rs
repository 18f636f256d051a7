//! USB isochronous transmit path (device → host).
//!
//! The graph node queues one four-channel block set per update pass; the IN
//! endpoint ISR drains them at 44.1 frames per millisecond, as a fixed
//! pattern of nine 44-frame packets followed by one 45-frame packet.
//!
//! The queue holds at most two sets. The front set carries a read offset so
//! a block can span several packets. The ISR pops the front set inside a
//! critical section, copies samples with interrupts enabled, and pushes
//! the remainder back afterwards. If the update pass filled the queue in the
//! meantime, the partially sent set is the oldest data and is dropped.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use heapless::Vec;

use crate::block::{AudioBlockMut, AudioBlockPool, AudioBlockRef};
use crate::constants::{
    AUDIO_BLOCK_SAMPLES, TX_FRAMES_LONG, TX_FRAMES_SHORT, USB_CHANNELS, USB_FRAME_BYTES,
};
use crate::node::AudioNode;
use crate::stats::StreamStats;

/// Packets per cadence cycle; the last one is long.
const CADENCE_PERIOD: u8 = 10;
/// Initial cadence phase.
const CADENCE_START: u8 = 5;

struct TxEntry<'p> {
    blocks: [AudioBlockRef<'p>; USB_CHANNELS],
    offset: usize,
}

struct TxQueue<'p> {
    first: Option<TxEntry<'p>>,
    second: Option<TxEntry<'p>>,
}

impl<'p> TxQueue<'p> {
    const fn new() -> Self {
        TxQueue {
            first: None,
            second: None,
        }
    }

    fn len(&self) -> usize {
        self.first.is_some() as usize + self.second.is_some() as usize
    }
}

/// Transmit state shared between the update pass and the endpoint ISR.
pub struct UsbOutputState<'p> {
    queue: Mutex<RefCell<TxQueue<'p>>>,
    streaming: AtomicBool,
    /// Overruns, underruns and dropped frames on this direction.
    pub stats: StreamStats,
}

impl<'p> UsbOutputState<'p> {
    pub const fn new() -> Self {
        UsbOutputState {
            queue: Mutex::new(RefCell::new(TxQueue::new())),
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

    /// Number of queued block sets (0..=2).
    pub fn queued(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }

    /// Append a set at the back. Returns the set discarded to make room.
    fn push_back(&self, entry: TxEntry<'p>) -> Option<TxEntry<'p>> {
        critical_section::with(|cs| {
            let mut q = self.queue.borrow_ref_mut(cs);
            if q.first.is_none() {
                q.first = Some(entry);
                None
            } else if q.second.is_none() {
                q.second = Some(entry);
                None
            } else {
                let discarded = q.first.take();
                q.first = q.second.take();
                q.second = Some(entry);
                discarded
            }
        })
    }

    fn pop_front(&self) -> Option<TxEntry<'p>> {
        critical_section::with(|cs| {
            let mut q = self.queue.borrow_ref_mut(cs);
            let front = q.first.take();
            q.first = q.second.take();
            front
        })
    }

    /// Put a partially sent set back at the front. If the queue is already
    /// full the set is handed back to be dropped.
    fn push_front(&self, entry: TxEntry<'p>) -> Option<TxEntry<'p>> {
        critical_section::with(|cs| {
            let mut q = self.queue.borrow_ref_mut(cs);
            if q.second.is_some() {
                return Some(entry);
            }
            q.second = q.first.take();
            q.first = Some(entry);
            None
        })
    }

    /// Release every queued set.
    pub(crate) fn flush(&self) {
        let drained = critical_section::with(|cs| {
            let mut q = self.queue.borrow_ref_mut(cs);
            (q.first.take(), q.second.take())
        });
        drop(drained);
    }
}

impl Default for UsbOutputState<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames in the next packet of the 44.1 kHz cadence.
#[derive(Debug, Clone)]
pub struct TxCadence {
    phase: u8,
}

impl TxCadence {
    pub const fn new() -> Self {
        TxCadence {
            phase: CADENCE_START,
        }
    }

    /// Advance and return the frame count of the next packet.
    pub fn next_frames(&mut self) -> usize {
        self.phase += 1;
        if self.phase >= CADENCE_PERIOD {
            self.phase = 0;
            TX_FRAMES_LONG
        } else {
            TX_FRAMES_SHORT
        }
    }
}

impl Default for TxCadence {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR-side packet encoder.
pub struct UsbPacketTransmitter<'s, 'p> {
    state: &'s UsbOutputState<'p>,
    cadence: TxCadence,
}

impl<'s, 'p> UsbPacketTransmitter<'s, 'p> {
    pub fn new(state: &'s UsbOutputState<'p>) -> Self {
        UsbPacketTransmitter {
            state,
            cadence: TxCadence::new(),
        }
    }

    /// Fill the next IN packet and return its length in bytes.
    ///
    /// `packet` must hold at least [`AUDIO_TX_SIZE`](crate::constants::AUDIO_TX_SIZE)
    /// bytes. Frames the queue cannot supply are sent as silence.
    pub fn transmit_packet(&mut self, packet: &mut [u8]) -> usize {
        let target = self.cadence.next_frames();
        let len = target * USB_FRAME_BYTES;
        let out = &mut packet[..len];

        let mut written = 0;
        while written < target {
            let Some(mut entry) = self.state.pop_front() else {
                out[written * USB_FRAME_BYTES..].fill(0);
                self.state.stats.underruns.increment();
                trace!("usb tx underrun");
                break;
            };

            let n = (target - written).min(AUDIO_BLOCK_SAMPLES - entry.offset);
            let dest = &mut out[written * USB_FRAME_BYTES..(written + n) * USB_FRAME_BYTES];
            for (frame, i) in dest.chunks_exact_mut(USB_FRAME_BYTES).zip(entry.offset..) {
                for (ch, block) in entry.blocks.iter().enumerate() {
                    frame[2 * ch..2 * ch + 2].copy_from_slice(&block[i].to_le_bytes());
                }
            }
            written += n;
            entry.offset += n;

            if entry.offset < AUDIO_BLOCK_SAMPLES {
                if let Some(stale) = self.state.push_front(entry) {
                    self.state.stats.overruns.increment();
                    trace!("usb tx overrun while sending");
                    drop(stale);
                }
            }
        }

        len
    }
}

/// Graph node that sinks four channels to the host.
pub struct AudioOutputUsb<'s, 'p> {
    pool: &'p AudioBlockPool,
    state: &'s UsbOutputState<'p>,
}

impl<'s, 'p> AudioOutputUsb<'s, 'p> {
    pub fn new(pool: &'p AudioBlockPool, state: &'s UsbOutputState<'p>) -> Self {
        AudioOutputUsb { pool, state }
    }

    /// Take every input, substituting a silent block for missing ones.
    fn gather(
        &self,
        inputs: &mut [Option<AudioBlockRef<'p>>],
    ) -> Option<[AudioBlockRef<'p>; USB_CHANNELS]> {
        let mut staged: Vec<AudioBlockRef<'p>, USB_CHANNELS> = Vec::new();
        for ch in 0..USB_CHANNELS {
            let block = match inputs.get_mut(ch).and_then(Option::take) {
                Some(block) => block,
                None => AudioBlockMut::alloc(self.pool)?.into_shared(),
            };
            staged.push(block).ok()?;
        }
        staged.into_array().ok()
    }
}

impl<'s, 'p> AudioNode<'p> for AudioOutputUsb<'s, 'p> {
    const NUM_INPUTS: usize = USB_CHANNELS;
    const NUM_OUTPUTS: usize = 0;

    fn update(
        &mut self,
        inputs: &mut [Option<AudioBlockRef<'p>>],
        _outputs: &mut [Option<AudioBlockMut<'p>>],
    ) {
        if !self.state.is_streaming() {
            inputs.iter_mut().for_each(|input| *input = None);
            self.state.flush();
            return;
        }

        let Some(blocks) = self.gather(inputs) else {
            self.state.stats.allocation_failures.increment();
            trace!("usb tx: pool exhausted, set dropped");
            return;
        };

        if let Some(stale) = self.state.push_back(TxEntry { blocks, offset: 0 }) {
            self.state.stats.overruns.increment();
            trace!("usb tx overrun");
            drop(stale);
        }
    }
}
