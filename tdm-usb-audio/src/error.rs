//! Error types.
//!
//! Runtime stream conditions (overrun, underrun, pool exhaustion inside an
//! ISR) are never returned to a caller; they are handled by policy and show
//! up in [`StreamStats`](crate::stats::StreamStats). Only bring-up failures
//! are reported synchronously, as [`ConfigError`].

use core::fmt;

/// The block pool had no free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AllocationExhausted;

impl fmt::Display for AllocationExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("audio block pool exhausted")
    }
}

/// Hardware bring-up failed. Nothing was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The DMA channel rejected the transfer descriptor.
    Dma,
    /// The USB controller rejected an isochronous endpoint.
    Endpoint {
        /// Endpoint address, direction bit included.
        address: u8,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Dma => f.write_str("DMA channel configuration rejected"),
            ConfigError::Endpoint { address } => {
                write!(f, "USB endpoint 0x{address:02x} configuration rejected")
            }
        }
    }
}
