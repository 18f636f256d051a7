//! USB Audio Class streaming.
//!
//! | Node | Inputs | Outputs | Description |
//! |------|--------|---------|-------------|
//! | [`AudioInputUsb`] | 0 | 4 | Host → device isochronous OUT stream |
//! | [`AudioOutputUsb`] | 4 | 0 | Device → host isochronous IN stream |
//!
//! Both directions carry four 16-bit channels at 44.1 kHz. The OUT stream is
//! asynchronous: [`FeedbackController`] steers the host's packet rate to the
//! rate at which the TDM master consumes samples.
//!
//! ISR entry points are [`UsbPacketReceiver::receive_packet`],
//! [`UsbPacketTransmitter::transmit_packet`] and
//! [`UsbAudio::feedback_report`]; the graph side only ever sees the nodes.

pub mod config;
pub mod features;
pub mod feedback;
pub mod input;
pub mod output;

pub use config::{EndpointConfig, IsoEndpointBus, UsbAudio};
pub use features::{FeatureSettings, FeatureUnit, SetupPacket};
pub use feedback::{FeedbackController, FeedbackFormat, FeedbackReport, UsbSpeed};
pub use input::{AudioInputUsb, UsbInputState, UsbPacketReceiver};
pub use output::{AudioOutputUsb, TxCadence, UsbOutputState, UsbPacketTransmitter};
