//! TDM transmit driver and the ISR handoff primitives it shares with the
//! USB paths.
//!
//! ## Components
//!
//! | Node | Inputs | Outputs | Description |
//! |------|--------|---------|-------------|
//! | [`AudioOutputTdm`] | 16 | 0 | DMA-driven 16-channel TDM output (SAI1 slave) |
//!
//! ## Utilities
//!
//! - [`tdm_mux`]: channel pair multiplexing into TDM slot words
//! - [`dma`]: DMA descriptor and the [`TdmDma`] channel trait
//! - [`mailbox`]: single-slot critical-section handoff between contexts
//!
//! ## DMA Buffer Layout
//!
//! The TDM driver uses a circular DMA buffer of `[u32; 2048]`:
//! - Each `u32` = one TDM slot (even channel in upper 16 bits, odd in lower)
//! - 8 slots form one frame; one half holds 128 frames (one block per channel)
//! - DMA fires half-complete and complete interrupts
//! - ISR fills the inactive half while DMA operates on the active half

pub mod dma;
pub mod mailbox;
pub mod output_tdm;
pub mod tdm_mux;

pub use dma::{DmaDescriptor, DmaHalf, TdmDma};
pub use mailbox::Mailbox;
pub use output_tdm::{AudioOutputTdm, TdmBuffer};
