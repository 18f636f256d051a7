/// Number of 16-bit samples per audio block.
pub const AUDIO_BLOCK_SAMPLES: usize = 128;

/// Number of audio blocks in a pool.
pub const POOL_SIZE: usize = 64;

/// Nominal sample rate advertised to the USB host.
pub const USB_SAMPLE_RATE_HZ: u32 = 44_100;

/// Channels carried by one TDM frame.
pub const TDM_CHANNELS: usize = 16;

/// 32-bit TDM slots per frame. Each slot carries two 16-bit channels.
pub const TDM_SLOTS: usize = TDM_CHANNELS / 2;

/// Words in one half of the TDM double buffer (one block per channel).
pub const TDM_HALF_WORDS: usize = AUDIO_BLOCK_SAMPLES * TDM_SLOTS;

/// Words in the whole TDM double buffer.
pub const TDM_BUFFER_WORDS: usize = TDM_HALF_WORDS * 2;

/// Channels in each USB streaming direction.
pub const USB_CHANNELS: usize = 4;

/// Bytes per USB audio frame: 4 channels of 16-bit samples.
pub const USB_FRAME_BYTES: usize = USB_CHANNELS * 2;

/// Largest isochronous OUT packet: 45 frames plus one frame of slack.
pub const AUDIO_RX_SIZE: usize = 46 * USB_FRAME_BYTES;

/// Largest isochronous IN packet.
pub const AUDIO_TX_SIZE: usize = 46 * USB_FRAME_BYTES;

/// Frames sent per 1 ms USB frame in the common case.
pub const TX_FRAMES_SHORT: usize = 44;

/// Frames sent once every ten USB frames to average 44.1 frames/ms.
pub const TX_FRAMES_LONG: usize = 45;

/// Feedback accumulator bump applied on every receive underrun.
pub const UNDERRUN_FEEDBACK_DELTA: u32 = 3500;

/// Maximum value of the feature-unit volume control.
pub const FEATURE_MAX_VOLUME: u8 = 0xFF;
