//! Setter value ranges.
//!
//! Every setter clamps its input into the range below before encoding. The
//! encoder itself never re-checks ranges, so nothing outside these bounds
//! reaches the device.
//!
//! ## Ranges
//! - **Volume**: 0–30
//! - **Balance**: 0 (game) – 100 (chat), 50 is an even mix
//! - **Sidetone**: 0–10 (mic monitoring level)
//! - **NC mode**: 0 off, 1 noise cancelling, 2 ambient sound
//! - **Ambient level**: 0–20; focus-on-voice is a 0/1 flag
//! - **Auto power-off**: firmware presets 0 (disabled), 5, 10, 30, 60 and
//!   180 minutes; other values snap to the nearest preset
//! - **Voice language**: 0 English, 1 Japanese, 2 Chinese
//! - **Boot NC**: 0–3 (3 = remember last)
//! - **Boot BT**: 0–2 (2 = remember last)

use crate::protocol::SettingKey;
use std::ops::RangeInclusive;

pub const VOLUME: RangeInclusive<u8> = 0..=30;
pub const BALANCE: RangeInclusive<u8> = 0..=100;
pub const SIDETONE: RangeInclusive<u8> = 0..=10;
pub const NC_MODE: RangeInclusive<u8> = 0..=2;
pub const AMBIENT_LEVEL: RangeInclusive<u8> = 0..=20;
pub const AUTO_OFF_MINUTES: RangeInclusive<u8> = 0..=180;
pub const VOICE_LANG: RangeInclusive<u8> = 0..=2;
pub const BOOT_NC: RangeInclusive<u8> = 0..=3;
pub const BOOT_BT: RangeInclusive<u8> = 0..=2;
pub const FLAG: RangeInclusive<u8> = 0..=1;

/// Auto power-off presets offered by the official app.
pub const AUTO_OFF_PRESETS: &[u8] = &[0, 5, 10, 30, 60, 180];

/// Ambient level used when only the focus flag is changed.
pub const AMBIENT_LEVEL_DEFAULT: u8 = 20;

/// Clamp `value` into `range`.
pub fn clamp(value: i32, range: &RangeInclusive<u8>) -> u8 {
    value.clamp(*range.start() as i32, *range.end() as i32) as u8
}

/// Auto power-off preset closest to `minutes`; ties go to the shorter delay.
pub fn nearest_auto_off_preset(minutes: i32) -> u8 {
    let minutes = clamp(minutes, &AUTO_OFF_MINUTES) as i32;
    AUTO_OFF_PRESETS
        .iter()
        .copied()
        .min_by_key(|&preset| (preset as i32 - minutes).abs())
        .unwrap_or(0)
}

/// Valid range of the first (or only) value byte of a setting.
pub fn range_for(key: SettingKey) -> RangeInclusive<u8> {
    match key {
        SettingKey::NcMode => NC_MODE,
        SettingKey::Volume => VOLUME,
        SettingKey::Balance => BALANCE,
        SettingKey::Sidetone => SIDETONE,
        SettingKey::AutoOff => AUTO_OFF_MINUTES,
        SettingKey::NotifVoice => FLAG,
        SettingKey::VoiceLang => VOICE_LANG,
        SettingKey::BootNc => BOOT_NC,
        SettingKey::BootBt => BOOT_BT,
        SettingKey::AmbientSound => AMBIENT_LEVEL,
    }
}
