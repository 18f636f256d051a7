//! Audio Class 1.0 feature unit: master mute and volume.
//!
//! The host adjusts these through class-specific control requests on the
//! audio control interface. The stream itself is not scaled here; the
//! application polls [`FeatureUnit::take_change`] and applies the settings
//! wherever it sees fit.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::constants::FEATURE_MAX_VOLUME;

/// Class-specific request to an interface, device to host.
pub const REQUEST_TYPE_CLASS_INTERFACE_IN: u8 = 0xA1;
/// Class-specific request to an interface, host to device.
pub const REQUEST_TYPE_CLASS_INTERFACE_OUT: u8 = 0x21;

pub const SET_CUR: u8 = 0x01;
pub const GET_CUR: u8 = 0x81;
pub const GET_MIN: u8 = 0x82;
pub const GET_MAX: u8 = 0x83;
pub const GET_RES: u8 = 0x84;

pub const MUTE_CONTROL: u8 = 0x01;
pub const VOLUME_CONTROL: u8 = 0x02;

/// An 8-byte control SETUP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub fn from_bytes(raw: [u8; 8]) -> Self {
        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Control selector (high byte of `wValue`).
    pub fn control_selector(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Channel number (low byte of `wValue`), 0 for master.
    pub fn channel(&self) -> u8 {
        self.value as u8
    }

    /// Unit or terminal ID (high byte of `wIndex`).
    pub fn entity(&self) -> u8 {
        (self.index >> 8) as u8
    }
}

/// Current feature settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeatureSettings {
    pub mute: bool,
    /// 0..=[`FEATURE_MAX_VOLUME`].
    pub volume: u8,
}

impl FeatureSettings {
    pub const DEFAULT: FeatureSettings = FeatureSettings {
        mute: false,
        volume: FEATURE_MAX_VOLUME / 2,
    };

    /// Linear gain implied by the settings, 0.0 when muted.
    pub fn gain(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            self.volume as f32 / FEATURE_MAX_VOLUME as f32
        }
    }
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Feature unit state shared between the control endpoint and the
/// application.
pub struct FeatureUnit {
    settings: Mutex<Cell<FeatureSettings>>,
    changed: AtomicBool,
}

impl FeatureUnit {
    pub const fn new() -> Self {
        FeatureUnit {
            settings: Mutex::new(Cell::new(FeatureSettings::DEFAULT)),
            changed: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> FeatureSettings {
        critical_section::with(|cs| self.settings.borrow(cs).get())
    }

    /// Returns `true` once after each accepted SET request.
    pub fn take_change(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Answer a GET request. Writes the reply into `data` and returns its
    /// length, or `None` to stall.
    pub fn get_feature(&self, setup: &SetupPacket, data: &mut [u8]) -> Option<usize> {
        if setup.request_type != REQUEST_TYPE_CLASS_INTERFACE_IN {
            return None;
        }
        let settings = self.settings();

        match setup.control_selector() {
            MUTE_CONTROL => {
                *data.first_mut()? = settings.mute as u8;
                Some(1)
            }
            VOLUME_CONTROL => {
                let value: u16 = match setup.request {
                    GET_CUR => settings.volume as u16,
                    GET_MIN => 0,
                    GET_MAX => FEATURE_MAX_VOLUME as u16,
                    GET_RES => 1,
                    _ => {
                        trace!("feature unit: unsupported volume request {}", setup.request);
                        return None;
                    }
                };
                data.get_mut(..2)?.copy_from_slice(&value.to_le_bytes());
                Some(2)
            }
            _ => None,
        }
    }

    /// Apply a SET request. Returns whether it was accepted.
    pub fn set_feature(&self, setup: &SetupPacket, data: &[u8]) -> bool {
        if setup.request_type != REQUEST_TYPE_CLASS_INTERFACE_OUT || setup.request != SET_CUR {
            return false;
        }
        let Some(&byte) = data.first() else {
            return false;
        };

        let accepted = critical_section::with(|cs| {
            let cell = self.settings.borrow(cs);
            let mut settings = cell.get();
            match setup.control_selector() {
                MUTE_CONTROL => settings.mute = byte != 0,
                VOLUME_CONTROL => settings.volume = byte,
                _ => return false,
            }
            cell.set(settings);
            true
        });

        if accepted {
            self.changed.store(true, Ordering::Release);
            debug!("feature unit: cs {} set to {}", setup.control_selector(), byte);
        }
        accepted
    }
}

impl Default for FeatureUnit {
    fn default() -> Self {
        Self::new()
    }
}
