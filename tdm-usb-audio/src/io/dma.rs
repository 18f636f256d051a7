//! DMA channel seam for the TDM transmitter.
//!
//! The chip-specific eDMA/DMAMUX programming lives in the firmware; this
//! module only describes *what* the transmit channel must do
//! ([`DmaDescriptor`]) and the handful of operations the ISR needs
//! ([`TdmDma`]).

use core::ops::Range;

use crate::constants::{TDM_BUFFER_WORDS, TDM_HALF_WORDS};
use crate::error::ConfigError;

/// DMAMUX request source for SAI1 transmit on the i.MX RT1062.
pub const DMAMUX_SOURCE_SAI1_TX: u8 = 20;

/// Size of one DMA element (a TDM slot word) in bytes.
const WORD_BYTES: usize = core::mem::size_of::<u32>();

/// Which half of a circular double buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaHalf {
    /// Words `0..TDM_HALF_WORDS`.
    First,
    /// Words `TDM_HALF_WORDS..TDM_BUFFER_WORDS`.
    Second,
}

impl DmaHalf {
    /// The half the DMA engine is currently reading, judged from its source
    /// address relative to the buffer start.
    pub fn from_source_address(source: usize, buffer_start: usize) -> Self {
        let midpoint = buffer_start + TDM_HALF_WORDS * WORD_BYTES;
        if source < midpoint {
            DmaHalf::First
        } else {
            DmaHalf::Second
        }
    }

    /// The opposite half.
    pub fn other(self) -> Self {
        match self {
            DmaHalf::First => DmaHalf::Second,
            DmaHalf::Second => DmaHalf::First,
        }
    }

    /// Word indices covered by this half.
    pub fn words(self) -> Range<usize> {
        match self {
            DmaHalf::First => 0..TDM_HALF_WORDS,
            DmaHalf::Second => TDM_HALF_WORDS..TDM_BUFFER_WORDS,
        }
    }
}

/// Transfer control descriptor for a circular memory-to-peripheral stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaDescriptor {
    /// First byte of the source buffer.
    pub source: usize,
    /// Signed source increment per element, in bytes.
    pub source_offset: i16,
    /// Element width in bytes.
    pub element_size: u8,
    /// Bytes moved per hardware request.
    pub minor_loop_bytes: u32,
    /// Adjustment applied to the source after the major loop (wraps it).
    pub source_last_adjust: i32,
    /// Peripheral data register.
    pub destination: usize,
    /// Destination increment (0 for a FIFO register).
    pub destination_offset: i16,
    /// Requests per pass over the whole buffer.
    pub major_iterations: u16,
    /// Interrupt when half of the major loop is done.
    pub interrupt_half: bool,
    /// Interrupt when the major loop is done.
    pub interrupt_major: bool,
    /// DMAMUX request source.
    pub trigger: u8,
}

impl DmaDescriptor {
    /// Descriptor that streams `buffer` word by word into `destination`
    /// forever, interrupting at each half.
    pub fn circular_tx(buffer: &[u32], destination: usize, trigger: u8) -> Self {
        let bytes = core::mem::size_of_val(buffer);
        DmaDescriptor {
            source: buffer.as_ptr() as usize,
            source_offset: WORD_BYTES as i16,
            element_size: WORD_BYTES as u8,
            minor_loop_bytes: WORD_BYTES as u32,
            source_last_adjust: -(bytes as i32),
            destination,
            destination_offset: 0,
            major_iterations: buffer.len() as u16,
            interrupt_half: true,
            interrupt_major: true,
            trigger,
        }
    }
}

/// Operations the TDM transmitter needs from its DMA channel.
pub trait TdmDma {
    /// Program the channel. Called once, before [`enable`](Self::enable).
    fn configure(&mut self, descriptor: &DmaDescriptor) -> Result<(), ConfigError>;

    /// Start servicing hardware requests.
    fn enable(&mut self);

    /// Current source address of the transfer.
    fn source_address(&self) -> usize;

    /// Acknowledge the half/major interrupt.
    fn clear_interrupt(&mut self);

    /// Write back a freshly filled region so the DMA engine sees it.
    /// Cache-coherent platforms keep the default no-op.
    fn flush_dcache(&mut self, _region: &[u32]) {}
}
