//! # tdm-usb-audio
//!
//! A `no_std`, zero-allocation audio I/O core for a
//! [Teensy 4.x](https://www.pjrc.com/teensy/) (i.MX RT1062, Cortex-M7)
//! microphone-array peripheral. It streams 16 channels out over a TDM
//! serial link clocked by an external master and moves four channels each
//! way over USB Audio Class isochronous endpoints, using the same block and
//! node-graph model as the
//! [PJRC Teensy Audio Library](https://www.pjrc.com/teensy/td_libs_Audio.html).
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`block`] | Fixed-size audio block pool with refcounted handles |
//! | Trait | [`node`] | `AudioNode` trait |
//! | I/O | [`io`] | 16-channel TDM transmit, DMA seam, ISR mailbox |
//! | USB | [`usb`] | Isochronous RX/TX, rate feedback, feature unit |
//! | Pacing | [`scheduler`] | Update responsibility and the update pass |
//! | Graph | [`graph`] | [`audio_graph!`] macro for declarative wiring |
//! | Diagnostics | [`stats`] / [`error`] | Stream counters, bring-up errors |
//!
//! ## Quick start
//!
//! ```ignore
//! use tdm_usb_audio::audio_graph;
//! use tdm_usb_audio::block::AudioBlockPool;
//! use tdm_usb_audio::io::AudioOutputTdm;
//! use tdm_usb_audio::scheduler::UpdateScheduler;
//! use tdm_usb_audio::usb::{AudioInputUsb, UsbAudio};
//!
//! static POOL: AudioBlockPool = AudioBlockPool::new();
//! static USB: UsbAudio<'static> = UsbAudio::new();
//! static SCHEDULER: UpdateScheduler = UpdateScheduler::new();
//!
//! audio_graph! {
//!     pub struct Bridge<'p, 's> {
//!         host: AudioInputUsb<'s, 'p> {},
//!         tdm: AudioOutputTdm<'p> {
//!             (host, 0), (host, 1), (host, 2), (host, 3),
//!             _, _, _, _, _, _, _, _, _, _, _, _,
//!         },
//!     }
//! }
//!
//! // init
//! let tdm = AudioOutputTdm::begin(buffer, &mut dma, &SCHEDULER, SAI1_TDR0)?;
//! let mut graph = Bridge::new(USB.input_node(), tdm);
//! let mut rx = USB.receiver(&POOL);
//!
//! // USB OUT endpoint ISR
//! rx.receive_packet(packet);
//!
//! // TDM DMA ISR
//! if graph.tdm.isr(&mut dma) {
//!     SCHEDULER.run(|| graph.update_all(&POOL));
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `defmt` | no | `defmt` logging and `defmt::Format` on public types |
//!
//! ## Audio parameters
//!
//! - **Block size:** 128 samples ([`constants::AUDIO_BLOCK_SAMPLES`])
//! - **USB sample rate:** 44 100 Hz ([`constants::USB_SAMPLE_RATE_HZ`])
//! - **Sample format:** `i16` (signed 16-bit)
//! - **Block pool:** 64 blocks ([`constants::POOL_SIZE`])

#![no_std]

#[macro_use]
mod fmt;

pub mod constants;
pub mod error;
pub mod stats;
pub mod block;
pub mod node;
pub mod scheduler;
pub mod io;
pub mod usb;
pub mod graph;
