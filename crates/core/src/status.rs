//! Typed status records decoded from status response reports.
//!
//! Decoding is a pure function of the 64-byte response; byte offsets are
//! absolute indices into the report.

use crate::device::{BootBtMode, BootNcMode, Language, NcMode};
use crate::error::{Error, Result};
use crate::protocol::REPORT_LEN;
use serde::Serialize;

/// Audio status response (request 0x06).
mod audio {
    pub const CHARGING: usize = 14;
    pub const BATTERY: usize = 15;
    pub const VOLUME: usize = 17;
    pub const BALANCE: usize = 19;
    pub const SIDETONE: usize = 20;
    // Byte 22 is a device-internal checksum.
}

/// Noise-control status response (request 0x07).
mod nc {
    pub const MIC_MUTED: usize = 13;
    pub const MODE: usize = 16;
    pub const AMBIENT_LEVEL: usize = 17;
    pub const FOCUS_ON_VOICE: usize = 19;
}

/// System status response (request 0x08).
mod system {
    pub const BOOT_NC: usize = 13;
    pub const BT_ENABLED: usize = 14;
    pub const BT_CONNECTED: usize = 15;
    pub const BOOT_BT: usize = 17;
    pub const AUTO_OFF: usize = 18;
    pub const LANGUAGE: usize = 21;
    pub const NOTIF: usize = 22;
    /// 0 when the boom mic is plugged in.
    pub const MIC_CONNECTED: usize = 24;
}

/// Bluetooth radio state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BluetoothState {
    pub enabled: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioStatus {
    /// 0–30.
    pub volume: u8,
    /// Game/chat mix, 0 (game) – 100 (chat).
    pub balance: u8,
    /// 0–10.
    pub sidetone: u8,
    /// Percent.
    pub battery_level: u8,
    pub charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NcStatus {
    pub nc_mode: NcMode,
    pub mic_muted: bool,
    pub ambient_level: u8,
    pub focus_on_voice: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub boot_nc: BootNcMode,
    pub bt_state: BluetoothState,
    pub boot_bt: BootBtMode,
    pub auto_off_minutes: u8,
    pub language: Language,
    pub notif_enabled: bool,
    pub mic_connected: bool,
}

/// All three status categories, read one after another.
///
/// The reads are independent; a setting may change between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FullStatus {
    pub audio: AudioStatus,
    pub nc: NcStatus,
    pub system: SystemStatus,
}

fn check_len(data: &[u8], what: &str) -> Result<()> {
    if data.len() < REPORT_LEN {
        return Err(Error::Protocol(format!(
            "{what} report too short: {} bytes (expected {REPORT_LEN})",
            data.len()
        )));
    }
    Ok(())
}

impl AudioStatus {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, "audio status")?;
        Ok(Self {
            volume: data[audio::VOLUME],
            balance: data[audio::BALANCE],
            sidetone: data[audio::SIDETONE],
            battery_level: data[audio::BATTERY],
            charging: data[audio::CHARGING] != 0,
        })
    }
}

impl NcStatus {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, "noise control status")?;
        Ok(Self {
            nc_mode: NcMode::from_raw(data[nc::MODE])?,
            mic_muted: data[nc::MIC_MUTED] != 0,
            ambient_level: data[nc::AMBIENT_LEVEL],
            focus_on_voice: data[nc::FOCUS_ON_VOICE] != 0,
        })
    }
}

impl SystemStatus {
    pub fn decode(data: &[u8]) -> Result<Self> {
        check_len(data, "system status")?;
        Ok(Self {
            boot_nc: BootNcMode::from_raw(data[system::BOOT_NC])?,
            bt_state: BluetoothState {
                enabled: data[system::BT_ENABLED] != 0,
                connected: data[system::BT_CONNECTED] == 1,
            },
            boot_bt: BootBtMode::from_raw(data[system::BOOT_BT])?,
            auto_off_minutes: data[system::AUTO_OFF],
            language: Language::from_raw(data[system::LANGUAGE])?,
            notif_enabled: data[system::NOTIF] == 1,
            mic_connected: data[system::MIC_CONNECTED] == 0,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::protocol::{request, REPORT_LEN};

    /// Build a status response for `command` with `(offset, byte)` fields set.
    pub fn response(command: u8, fields: &[(usize, u8)]) -> Vec<u8> {
        let mut buf = vec![0u8; REPORT_LEN];
        buf[..12].copy_from_slice(&[
            0x02, 0x1A, 0x02, 0x00, 0xFC, 0x16, 0x96, 0xC3, 0x41, command, 0x01, 0x01,
        ]);
        for &(offset, byte) in fields {
            buf[offset] = byte;
        }
        buf
    }

    /// Audio: volume 12, balance 50, sidetone 3, battery 50 %, charging.
    pub fn audio() -> Vec<u8> {
        response(
            request::AUDIO_STATUS,
            &[(14, 1), (15, 50), (17, 12), (19, 50), (20, 3), (22, 0x5D)],
        )
    }

    /// NC: ambient sound, level 15, focus on voice, mic muted.
    pub fn nc() -> Vec<u8> {
        response(request::NC_STATUS, &[(13, 1), (16, 2), (17, 15), (19, 1)])
    }

    /// System: boot NC remember-last, BT on and connected, boot BT on,
    /// auto-off 30 min, Japanese, notifications on, mic plugged in.
    pub fn system() -> Vec<u8> {
        response(
            request::SYSTEM_STATUS,
            &[
                (13, 3),
                (14, 1),
                (15, 1),
                (17, 1),
                (18, 30),
                (21, 1),
                (22, 1),
                (24, 0),
            ],
        )
    }
}
