//! USB audio function bring-up and the endpoint seam.
//!
//! [`UsbAudio`] bundles the state of both streaming directions, the rate
//! feedback and the feature unit so firmware can keep it in a single
//! `static`. The USB device stack calls into it from three places:
//!
//! - SET_CONFIGURATION → [`UsbAudio::configure`]
//! - SET_INTERFACE → [`UsbAudio::set_interface`]
//! - endpoint completions → the packet receiver and transmitter, and
//!   [`UsbAudio::feedback_report`] for the sync endpoint.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::block::AudioBlockPool;
use crate::constants::{AUDIO_RX_SIZE, AUDIO_TX_SIZE, USB_SAMPLE_RATE_HZ};
use crate::error::ConfigError;

use super::feedback::{FeedbackController, FeedbackReport, UsbSpeed};
use super::features::FeatureUnit;
use super::input::{AudioInputUsb, UsbInputState, UsbPacketReceiver};
use super::output::{AudioOutputUsb, UsbOutputState, UsbPacketTransmitter};

/// Audio control interface number.
pub const AUDIO_INTERFACE: u8 = 0;
/// Streaming interface carrying device → host audio.
pub const AUDIO_TX_INTERFACE: u8 = AUDIO_INTERFACE + 1;
/// Streaming interface carrying host → device audio.
pub const AUDIO_RX_INTERFACE: u8 = AUDIO_INTERFACE + 2;

/// Isochronous OUT endpoint for received audio.
pub const AUDIO_RX_ENDPOINT: u8 = 0x03;
/// Isochronous IN endpoint for rate feedback.
pub const AUDIO_SYNC_ENDPOINT: u8 = 0x84;
/// Isochronous IN endpoint for transmitted audio.
pub const AUDIO_TX_ENDPOINT: u8 = 0x83;

/// Service interval of every audio endpoint, in (micro)frames.
const ISO_INTERVAL: u8 = 1;

/// Endpoint transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Out,
    In,
}

/// Parameters for one isochronous endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointConfig {
    /// Address including the direction bit.
    pub address: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl EndpointConfig {
    pub fn direction(&self) -> Direction {
        if self.address & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Endpoint number without the direction bit.
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }
}

/// What the USB device controller must provide to host the audio function.
pub trait IsoEndpointBus {
    /// Prime an isochronous endpoint. Errors abort configuration.
    fn configure_endpoint(&mut self, config: &EndpointConfig) -> Result<(), ConfigError>;
}

/// State of the whole USB audio function.
pub struct UsbAudio<'p> {
    pub input: UsbInputState<'p>,
    pub output: UsbOutputState<'p>,
    pub feedback: FeedbackController,
    pub features: FeatureUnit,
    configured: AtomicBool,
}

impl<'p> UsbAudio<'p> {
    pub const fn new() -> Self {
        UsbAudio {
            input: UsbInputState::new(),
            output: UsbOutputState::new(),
            feedback: FeedbackController::new(),
            features: FeatureUnit::new(),
            configured: AtomicBool::new(false),
        }
    }

    /// Bring up the audio endpoints after SET_CONFIGURATION.
    ///
    /// Counters are reset, both streaming interfaces return to alt 0 and
    /// the feedback value is reseeded for `speed`. If any endpoint is
    /// rejected the function stays unconfigured.
    pub fn configure<B: IsoEndpointBus>(
        &self,
        bus: &mut B,
        speed: UsbSpeed,
    ) -> Result<(), ConfigError> {
        self.configured.store(false, Ordering::Release);
        self.input.set_streaming(false);
        self.output.set_streaming(false);
        self.input.stats.reset();
        self.output.stats.reset();
        self.input.discard_ready();
        self.output.flush();
        self.feedback.configure(USB_SAMPLE_RATE_HZ, speed);

        let endpoints = [
            EndpointConfig {
                address: AUDIO_RX_ENDPOINT,
                max_packet_size: AUDIO_RX_SIZE as u16,
                interval: ISO_INTERVAL,
            },
            EndpointConfig {
                address: AUDIO_SYNC_ENDPOINT,
                max_packet_size: self.feedback.format().nbytes as u16,
                interval: ISO_INTERVAL,
            },
            EndpointConfig {
                address: AUDIO_TX_ENDPOINT,
                max_packet_size: AUDIO_TX_SIZE as u16,
                interval: ISO_INTERVAL,
            },
        ];
        for endpoint in &endpoints {
            bus.configure_endpoint(endpoint).inspect_err(|e| {
                warn!("usb audio: endpoint {} rejected: {}", endpoint.address, e);
            })?;
        }

        self.configured.store(true, Ordering::Release);
        debug!("usb audio configured, speed {}", speed);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    /// Record a SET_INTERFACE for one of the streaming interfaces.
    /// Alternate setting 0 is the zero-bandwidth idle setting.
    pub fn set_interface(&self, interface: u8, alt_setting: u8) {
        let streaming = alt_setting != 0;
        match interface {
            AUDIO_TX_INTERFACE => {
                self.output.set_streaming(streaming);
                if !streaming {
                    self.output.flush();
                }
            }
            AUDIO_RX_INTERFACE => self.input.set_streaming(streaming),
            _ => return,
        }
        debug!("usb audio: interface {} alt {}", interface, alt_setting);
    }

    /// Payload for the next feedback packet.
    pub fn feedback_report(&self) -> FeedbackReport {
        self.feedback.report()
    }

    /// Decoder for the OUT endpoint ISR.
    pub fn receiver<'s>(&'s self, pool: &'p AudioBlockPool) -> UsbPacketReceiver<'s, 'p> {
        UsbPacketReceiver::new(pool, &self.input)
    }

    /// Encoder for the IN endpoint ISR.
    pub fn transmitter(&self) -> UsbPacketTransmitter<'_, 'p> {
        UsbPacketTransmitter::new(&self.output)
    }

    /// Graph node sourcing audio from the host.
    pub fn input_node(&self) -> AudioInputUsb<'_, 'p> {
        AudioInputUsb::new(&self.input, &self.feedback)
    }

    /// Graph node sinking audio to the host.
    pub fn output_node<'s>(&'s self, pool: &'p AudioBlockPool) -> AudioOutputUsb<'s, 'p> {
        AudioOutputUsb::new(pool, &self.output)
    }
}

impl Default for UsbAudio<'_> {
    fn default() -> Self {
        Self::new()
    }
}
