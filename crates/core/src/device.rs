//! Device model: discovery and the headset's enumerated settings.

use crate::error::{Error, Result};
use crate::{PRODUCT_ID, VENDOR_ID};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Information about a discovered headset.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub interface: i32,
}

/// Discover all connected H9 II headsets.
///
/// The headset exposes several HID interfaces; each shows up as its own entry.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;

    let mut devices = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != VENDOR_ID || info.product_id() != PRODUCT_ID {
            continue;
        }

        info!(
            vid = format_args!("0x{:04X}", info.vendor_id()),
            pid = format_args!("0x{:04X}", info.product_id()),
            interface = info.interface_number(),
            path = %info.path().to_string_lossy(),
            "Found headset"
        );
        devices.push(DeviceInfo {
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            product: info.product_string().map(|s| s.to_string()),
            serial: info.serial_number().map(|s| s.to_string()),
            interface: info.interface_number(),
        });
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Active noise-control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NcMode {
    Off = 0,
    NoiseCancelling = 1,
    AmbientSound = 2,
}

impl NcMode {
    pub const ALL: &'static [NcMode] = &[
        NcMode::Off,
        NcMode::NoiseCancelling,
        NcMode::AmbientSound,
    ];

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Off),
            1 => Ok(Self::NoiseCancelling),
            2 => Ok(Self::AmbientSound),
            value => Err(Error::UnknownValue {
                field: "nc_mode",
                value,
            }),
        }
    }

    pub fn raw(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::NoiseCancelling => "Noise Cancelling",
            Self::AmbientSound => "Ambient Sound",
        }
    }
}

/// Noise-control mode applied at power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BootNcMode {
    Off = 0,
    NoiseCancelling = 1,
    AmbientSound = 2,
    RememberLast = 3,
}

impl BootNcMode {
    pub const ALL: &'static [BootNcMode] = &[
        BootNcMode::Off,
        BootNcMode::NoiseCancelling,
        BootNcMode::AmbientSound,
        BootNcMode::RememberLast,
    ];

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Off),
            1 => Ok(Self::NoiseCancelling),
            2 => Ok(Self::AmbientSound),
            3 => Ok(Self::RememberLast),
            value => Err(Error::UnknownValue {
                field: "boot_nc",
                value,
            }),
        }
    }

    pub fn raw(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::NoiseCancelling => "Noise Cancelling",
            Self::AmbientSound => "Ambient Sound",
            Self::RememberLast => "Remember Last",
        }
    }
}

/// Bluetooth radio state applied at power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BootBtMode {
    Off = 0,
    On = 1,
    RememberLast = 2,
}

impl BootBtMode {
    pub const ALL: &'static [BootBtMode] =
        &[BootBtMode::Off, BootBtMode::On, BootBtMode::RememberLast];

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::RememberLast),
            value => Err(Error::UnknownValue {
                field: "boot_bt",
                value,
            }),
        }
    }

    pub fn raw(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::On => "On",
            Self::RememberLast => "Remember Last",
        }
    }
}

/// Voice-guidance language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Language {
    English = 0,
    Japanese = 1,
    Chinese = 2,
}

impl Language {
    pub const ALL: &'static [Language] = &[Language::English, Language::Japanese, Language::Chinese];

    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::English),
            1 => Ok(Self::Japanese),
            2 => Ok(Self::Chinese),
            value => Err(Error::UnknownValue {
                field: "language",
                value,
            }),
        }
    }

    pub fn raw(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
        }
    }
}

impl std::fmt::Display for NcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.raw(), self.label())
    }
}

impl std::fmt::Display for BootNcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.raw(), self.label())
    }
}

impl std::fmt::Display for BootBtMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.raw(), self.label())
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.raw(), self.label())
    }
}
