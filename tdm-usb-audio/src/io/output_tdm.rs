//! DMA-driven 16-channel TDM output (SAI1 in TDM slave mode).
//!
//! [`AudioOutputTdm`] accepts 16 mono channel inputs and multiplexes them
//! into a circular DMA buffer that feeds the SAI1 transmit FIFO. The frame
//! clock comes from the external TDM master, so this node's interrupt is
//! the natural block-rate pacer for the audio graph.
//!
//! ## Architecture
//!
//! ```text
//! Audio Graph              DMA Buffer (DMAMEM, 2048 × u32)              SAI1 TX
//! ┌──────────┐           ┌─────────────────┬─────────────────┐       ┌────────┐
//! │ ch 0..15 ├──tdm_mux─►│ half A: 1 block │ half B: 1 block │─DMA──►│ TDR[0] │
//! └──────────┘           └─────────────────┴─────────────────┘       └────────┘
//! ```
//!
//! - The DMA runs circularly over the whole buffer and interrupts at the
//!   half and full marks.
//! - The ISR works out which half the DMA just left, multiplexes the
//!   current channel blocks into it and releases them.
//! - A channel with no block is sent as silence; that is the steady state
//!   for unconnected channels, not an error.
//!
//! ## Usage with RTIC
//!
//! ```ignore
//! // init
//! let tdm = AudioOutputTdm::begin(buffer, &mut dma, &SCHEDULER, SAI1_TDR0)?;
//!
//! // DMA ISR
//! if graph.tdm.isr(&mut dma) {
//!     SCHEDULER.run(|| graph.update_all(&POOL));
//! }
//! ```

use crate::block::{AudioBlockMut, AudioBlockRef};
use crate::constants::{AUDIO_BLOCK_SAMPLES, TDM_BUFFER_WORDS, TDM_CHANNELS, TDM_SLOTS};
use crate::error::ConfigError;
use crate::node::AudioNode;
use crate::scheduler::UpdateScheduler;

use super::dma::{DmaDescriptor, DmaHalf, TdmDma, DMAMUX_SOURCE_SAI1_TX};
use super::tdm_mux::mux_pair;

/// Circular TDM transmit buffer: two halves of one block per channel.
pub type TdmBuffer = [u32; TDM_BUFFER_WORDS];

/// Shared stand-in for channels that have no block this cycle.
static SILENCE: [i16; AUDIO_BLOCK_SAMPLES] = [0; AUDIO_BLOCK_SAMPLES];

/// DMA-driven TDM output node.
///
/// Implements [`AudioNode`] with 16 inputs and 0 outputs.
///
/// [`update()`](AudioNode::update) deposits one block per channel;
/// the next [`isr()`](Self::isr) multiplexes and releases them.
pub struct AudioOutputTdm<'a> {
    /// Block waiting to be transmitted, per channel.
    slots: [Option<AudioBlockRef<'a>>; TDM_CHANNELS],
    /// DMA source buffer. The half the DMA is reading must not be touched.
    buffer: &'a mut TdmBuffer,
    /// If `true`, this node's ISR triggers the audio graph update cycle.
    update_responsibility: bool,
}

impl<'a> AudioOutputTdm<'a> {
    /// Wrap a transmit buffer without touching any hardware. The buffer is
    /// zeroed.
    pub fn new(buffer: &'a mut TdmBuffer, update_responsibility: bool) -> Self {
        buffer.fill(0);
        AudioOutputTdm {
            slots: [const { None }; TDM_CHANNELS],
            buffer,
            update_responsibility,
        }
    }

    /// Bring up the transmitter.
    ///
    /// Zeroes the buffer, programs `dma` to stream it circularly into the
    /// SAI data register at `destination`, claims update responsibility if
    /// nobody holds it yet, and enables the channel. On error nothing has
    /// been claimed or enabled.
    pub fn begin<D: TdmDma>(
        buffer: &'a mut TdmBuffer,
        dma: &mut D,
        scheduler: &UpdateScheduler,
        destination: usize,
    ) -> Result<Self, ConfigError> {
        buffer.fill(0);
        let descriptor = DmaDescriptor::circular_tx(&buffer[..], destination, DMAMUX_SOURCE_SAI1_TX);
        if let Err(err) = dma.configure(&descriptor) {
            warn!("TDM DMA configuration rejected");
            return Err(err);
        }

        let update_responsibility = scheduler.claim();
        dma.enable();
        debug!("TDM output started, update responsibility: {}", update_responsibility);

        Ok(Self::new(buffer, update_responsibility))
    }

    /// Handle the DMA half/full interrupt.
    ///
    /// Fills the half the DMA just finished reading with the queued channel
    /// blocks (silence where a channel has none), flushes it from the data
    /// cache and releases the blocks.
    ///
    /// # Returns
    ///
    /// `true` if the audio graph should be updated, when
    /// `update_responsibility` is set.
    pub fn isr<D: TdmDma>(&mut self, dma: &mut D) -> bool {
        let source = dma.source_address();
        dma.clear_interrupt();

        let buffer_start = self.buffer.as_ptr() as usize;
        let free = DmaHalf::from_source_address(source, buffer_start).other();

        self.fill(free);
        dma.flush_dcache(&self.buffer[free.words()]);
        self.release_blocks();

        self.update_responsibility
    }

    /// Multiplex the queued channel blocks into one half of the buffer.
    fn fill(&mut self, half: DmaHalf) {
        let dest = &mut self.buffer[half.words()];
        for pair in 0..TDM_SLOTS {
            let a = self.slots[2 * pair].as_deref().unwrap_or(&SILENCE);
            let b = self.slots[2 * pair + 1].as_deref().unwrap_or(&SILENCE);
            mux_pair(dest, pair, a, b);
        }
    }

    fn release_blocks(&mut self) {
        for slot in self.slots.iter_mut() {
            drop(slot.take());
        }
    }

    /// Whether this output is responsible for triggering graph updates.
    pub fn has_update_responsibility(&self) -> bool {
        self.update_responsibility
    }

    /// Check if channel `channel` has a block waiting for the next ISR.
    pub fn has_block(&self, channel: usize) -> bool {
        self.slots[channel].is_some()
    }

    /// The whole transmit buffer.
    pub fn buffer(&self) -> &TdmBuffer {
        self.buffer
    }

    /// One half of the transmit buffer.
    pub fn half(&self, half: DmaHalf) -> &[u32] {
        &self.buffer[half.words()]
    }
}

impl<'a> AudioNode<'a> for AudioOutputTdm<'a> {
    const NUM_INPUTS: usize = TDM_CHANNELS;
    const NUM_OUTPUTS: usize = 0;

    fn update(
        &mut self,
        inputs: &mut [Option<AudioBlockRef<'a>>],
        _outputs: &mut [Option<AudioBlockMut<'a>>],
    ) {
        // Pointer swap only: each input moves into its slot and the slot's
        // previous occupant is left in `inputs` for the caller to release.
        critical_section::with(|_| {
            for (slot, input) in self.slots.iter_mut().zip(inputs.iter_mut()) {
                core::mem::swap(slot, input);
            }
        });
    }
}
