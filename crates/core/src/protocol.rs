//! H9 II vendor protocol encoding.
//!
//! Every report in either direction is a fixed 64-byte buffer. Outbound
//! reports share a 12-byte header:
//!
//! ```text
//! [0] report id 0x02
//! [1] type byte      [2] 0x01       [3] 0x00        [4] 0xFC
//! [5] type - 4       [6] 0x96       [7] 0xC3        [8] marker 0x41
//! [9] command byte   [10] mode      [11] sequence
//! ```
//!
//! Write payloads, spacers and the checksum follow at per-setting offsets
//! described by [`WRITE_MAP`].

use crate::error::{Error, Result};

/// Length of every report, in both directions.
pub const REPORT_LEN: usize = 64;
/// Length of the fixed outbound header.
pub const HEADER_LEN: usize = 12;

/// HID report id, always byte 0.
pub const REPORT_ID: u8 = 0x02;
/// Magic bytes at offsets 6 and 7 of every outbound report.
pub const MAGIC: [u8; 2] = [0x96, 0xC3];
/// Fixed marker at offset 8 of every outbound report.
pub const MARKER: u8 = 0x41;

/// A full outbound report.
pub type Report = [u8; REPORT_LEN];

/// Absolute byte offsets shared by requests, responses and events.
pub mod offsets {
    pub const TYPE: usize = 1;
    /// Direction byte; inbound events carry [`super::events::MARKER`] here.
    pub const DIRECTION: usize = 2;
    pub const CATEGORY: usize = 8;
    pub const COMMAND: usize = 9;
    pub const MODE: usize = 10;
    pub const SEQUENCE: usize = 11;
}

/// Mode byte (offset 10).
pub mod mode {
    pub const READ: u8 = 0x01;
    pub const WRITE: u8 = 0x02;
}

/// Status read-request command ids.
pub mod request {
    pub const AUDIO_STATUS: u8 = 0x06;
    pub const NC_STATUS: u8 = 0x07;
    pub const SYSTEM_STATUS: u8 = 0x08;
}

/// Type byte of a status read request.
pub const READ_TYPE: u8 = 0x0C;
/// Read requests always carry sequence 1.
pub const READ_SEQUENCE: u8 = 0x01;
/// Low byte of the framing sum of a read request (magic + marker + mode + seq).
pub const READ_CHECKSUM_BASE: u8 = 0x9C;
/// Offset of the read-request checksum.
pub const READ_CHECKSUM_OFFSET: usize = 13;

/// Unsolicited event framing.
pub mod events {
    /// Direction byte (offset 2) of an event report.
    pub const MARKER: u8 = 0x04;
    /// Category byte (offset 8) shared by all events.
    pub const CATEGORY: u8 = 0x14;
    /// Events shorter than this are ignored.
    pub const MIN_LEN: usize = 16;

    pub const POWER: u8 = 0x04;
    pub const VOLUME_CHANGED: u8 = 0x21;
    pub const BALANCE_CHANGED: u8 = 0x22;
    pub const MIC_MUTE: u8 = 0x24;
    pub const NC_CHANGED: u8 = 0x41;
    pub const BT_STATE: u8 = 0x61;
    /// Mic boom connection; the raw flag is 0 when connected.
    pub const MIC_CONNECTION: u8 = 0x8F;
}

/// Writable settings known to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    NcMode,
    Volume,
    Balance,
    Sidetone,
    AutoOff,
    NotifVoice,
    VoiceLang,
    BootNc,
    BootBt,
    AmbientSound,
}

impl SettingKey {
    /// All writable settings, in table order.
    pub const ALL: &'static [SettingKey] = &[
        SettingKey::NcMode,
        SettingKey::Volume,
        SettingKey::Balance,
        SettingKey::Sidetone,
        SettingKey::AutoOff,
        SettingKey::NotifVoice,
        SettingKey::VoiceLang,
        SettingKey::BootNc,
        SettingKey::BootBt,
        SettingKey::AmbientSound,
    ];

    /// Wire-table name of the setting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NcMode => "nc_mode",
            Self::Volume => "volume",
            Self::Balance => "balance",
            Self::Sidetone => "sidetone",
            Self::AutoOff => "auto_off",
            Self::NotifVoice => "notif_voice",
            Self::VoiceLang => "voice_lang",
            Self::BootNc => "boot_nc",
            Self::BootBt => "boot_bt",
            Self::AmbientSound => "ambient_sound",
        }
    }

    /// Look up a setting by its wire-table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the value byte(s) of a write land in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    Single(usize),
    Multi(&'static [usize]),
}

impl ValueLayout {
    /// Value offsets in payload order.
    pub fn offsets(&self) -> &[usize] {
        match self {
            Self::Single(offset) => std::slice::from_ref(offset),
            Self::Multi(offsets) => offsets,
        }
    }

    pub fn arity(&self) -> usize {
        self.offsets().len()
    }
}

/// A value to be written for a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Single(u8),
    Tuple(Vec<u8>),
}

impl SettingValue {
    pub fn arity(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Tuple(values) => values.len(),
        }
    }
}

impl From<u8> for SettingValue {
    fn from(value: u8) -> Self {
        Self::Single(value)
    }
}

impl From<(u8, u8)> for SettingValue {
    fn from((a, b): (u8, u8)) -> Self {
        Self::Tuple(vec![a, b])
    }
}

/// Immutable wire layout of one writable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDescriptor {
    pub key: SettingKey,
    pub type_byte: u8,
    pub command: u8,
    pub values: ValueLayout,
    pub checksum_offset: usize,
    /// Low byte of the framing sum from offset 6 up to the checksum, with the
    /// sequence and value bytes excluded.
    pub checksum_constant: u8,
    /// Fixed filler bytes as `(offset, byte)`.
    pub spacers: &'static [(usize, u8)],
}

/// Write layout for every setting the device accepts.
pub static WRITE_MAP: [SettingDescriptor; 10] = [
    SettingDescriptor {
        key: SettingKey::NcMode,
        type_byte: 0x10,
        command: 0x41,
        values: ValueLayout::Single(13),
        checksum_offset: 17,
        checksum_constant: 0xF0,
        spacers: &[(14, 0x14), (15, 0xFF)],
    },
    SettingDescriptor {
        key: SettingKey::Volume,
        type_byte: 0x0F,
        command: 0x21,
        values: ValueLayout::Single(14),
        checksum_offset: 16,
        checksum_constant: 0xBC,
        spacers: &[(15, 0xFF)],
    },
    SettingDescriptor {
        key: SettingKey::Balance,
        type_byte: 0x0D,
        command: 0x22,
        values: ValueLayout::Single(13),
        checksum_offset: 14,
        checksum_constant: 0xBE,
        spacers: &[],
    },
    SettingDescriptor {
        key: SettingKey::Sidetone,
        type_byte: 0x0E,
        command: 0x23,
        values: ValueLayout::Single(13),
        checksum_offset: 15,
        checksum_constant: 0xBE,
        spacers: &[(14, 0xFF)],
    },
    SettingDescriptor {
        key: SettingKey::AutoOff,
        type_byte: 0x0E,
        command: 0x81,
        values: ValueLayout::Single(13),
        checksum_offset: 15,
        checksum_constant: 0x22,
        spacers: &[(14, 0x05)],
    },
    SettingDescriptor {
        key: SettingKey::NotifVoice,
        type_byte: 0x0D,
        command: 0x84,
        values: ValueLayout::Single(13),
        checksum_offset: 14,
        checksum_constant: 0x20,
        spacers: &[],
    },
    SettingDescriptor {
        key: SettingKey::VoiceLang,
        type_byte: 0x0D,
        command: 0x83,
        values: ValueLayout::Single(13),
        checksum_offset: 14,
        checksum_constant: 0x1F,
        spacers: &[],
    },
    SettingDescriptor {
        key: SettingKey::BootNc,
        type_byte: 0x0D,
        command: 0x43,
        values: ValueLayout::Single(13),
        checksum_offset: 14,
        checksum_constant: 0xDF,
        spacers: &[],
    },
    SettingDescriptor {
        key: SettingKey::BootBt,
        type_byte: 0x0D,
        command: 0x63,
        values: ValueLayout::Single(13),
        checksum_offset: 14,
        checksum_constant: 0xFF,
        spacers: &[],
    },
    // Level at 13, focus-on-voice flag at 14, both summed into the checksum.
    SettingDescriptor {
        key: SettingKey::AmbientSound,
        type_byte: 0x0E,
        command: 0x42,
        values: ValueLayout::Multi(&[13, 14]),
        checksum_offset: 15,
        checksum_constant: 0xDE,
        spacers: &[],
    },
];

/// Look up the descriptor for a typed setting key.
pub fn descriptor_for(key: SettingKey) -> &'static SettingDescriptor {
    // Rows are declared in SettingKey order.
    &WRITE_MAP[key as usize]
}

/// Look up a descriptor by wire-table name.
pub fn descriptor(name: &str) -> Result<&'static SettingDescriptor> {
    SettingKey::from_name(name)
        .map(descriptor_for)
        .ok_or_else(|| Error::Protocol(format!("unknown setting key: {name}")))
}

/// Write checksum: `(sequence + value_sum + constant) mod 256`.
pub fn write_checksum(sequence: u8, value_sum: u32, constant: u8) -> u8 {
    ((sequence as u32 + value_sum + constant as u32) & 0xFF) as u8
}

/// Read-request checksum: `(command + 0x9C) mod 256`.
pub fn read_checksum(command: u8) -> u8 {
    command.wrapping_add(READ_CHECKSUM_BASE)
}

fn header(type_byte: u8, command: u8, mode: u8, sequence: u8) -> Report {
    let mut buf = [0u8; REPORT_LEN];
    buf[..HEADER_LEN].copy_from_slice(&[
        REPORT_ID,
        type_byte,
        0x01,
        0x00,
        0xFC,
        type_byte.wrapping_sub(4),
        MAGIC[0],
        MAGIC[1],
        MARKER,
        command,
        mode,
        sequence,
    ]);
    buf
}

impl SettingDescriptor {
    /// Encode a write of `value` at `sequence`.
    ///
    /// Ranges are not checked here; callers clamp first.
    pub fn encode(&self, value: &SettingValue, sequence: u8) -> Result<Report> {
        let bytes: &[u8] = match (&self.values, value) {
            (ValueLayout::Single(_), SettingValue::Single(v)) => std::slice::from_ref(v),
            (ValueLayout::Multi(offsets), SettingValue::Tuple(vs)) if vs.len() == offsets.len() => {
                vs
            }
            _ => {
                return Err(Error::Protocol(format!(
                    "value mismatch for {}: expected {} value(s), got {}",
                    self.key,
                    self.values.arity(),
                    value.arity()
                )))
            }
        };

        let mut buf = header(self.type_byte, self.command, mode::WRITE, sequence);

        let mut value_sum = 0u32;
        for (&offset, &byte) in self.values.offsets().iter().zip(bytes) {
            buf[offset] = byte;
            value_sum += byte as u32;
        }

        for &(offset, byte) in self.spacers {
            buf[offset] = byte;
        }

        buf[self.checksum_offset] = write_checksum(sequence, value_sum, self.checksum_constant);
        Ok(buf)
    }
}

/// Encode a write for the setting named `name`.
pub fn encode_write(name: &str, value: &SettingValue, sequence: u8) -> Result<Report> {
    descriptor(name)?.encode(value, sequence)
}

/// Encode a status read request for `command`.
pub fn encode_read_request(command: u8) -> Report {
    let mut buf = header(READ_TYPE, command, mode::READ, READ_SEQUENCE);
    buf[HEADER_LEN] = 0x00;
    buf[READ_CHECKSUM_OFFSET] = read_checksum(command);
    buf
}

/// Rolling sequence number embedded in every write.
///
/// Starts at 1 and wraps from 254 back to 1; 0 and 255 never appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence(u8);

impl Sequence {
    pub const FIRST: u8 = 1;
    pub const LAST: u8 = 254;

    pub fn new() -> Self {
        Self(Self::FIRST)
    }

    pub fn current(&self) -> u8 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 = if self.0 >= Self::LAST {
            Self::FIRST
        } else {
            self.0 + 1
        };
    }

    pub fn reset(&mut self) {
        self.0 = Self::FIRST;
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQ: u8 = 0x05;

    fn one(v: u8) -> SettingValue {
        SettingValue::Single(v)
    }

    fn pair(a: u8, b: u8) -> SettingValue {
        SettingValue::Tuple(vec![a, b])
    }

    fn expected(prefix: &[u8]) -> Report {
        let mut buf = [0u8; REPORT_LEN];
        buf[..prefix.len()].copy_from_slice(prefix);
        buf
    }

    #[test]
    fn table_rows_follow_key_order() {
        assert_eq!(WRITE_MAP.len(), SettingKey::ALL.len());
        for (row, key) in WRITE_MAP.iter().zip(SettingKey::ALL) {
            assert_eq!(row.key, *key);
            assert_eq!(descriptor_for(*key).key, *key);
        }
    }

    #[test]
    fn table_offsets_stay_clear_of_header() {
        for d in &WRITE_MAP {
            let mut used: Vec<usize> = d.values.offsets().to_vec();
            used.extend(d.spacers.iter().map(|&(o, _)| o));
            used.push(d.checksum_offset);
            for &offset in &used {
                assert!(
                    (HEADER_LEN..REPORT_LEN).contains(&offset),
                    "{}: offset {offset} out of payload",
                    d.key
                );
            }
            let mut dedup = used.clone();
            dedup.sort_unstable();
            dedup.dedup();
            assert_eq!(dedup.len(), used.len(), "{}: colliding offsets", d.key);
        }
    }

    #[test]
    fn checksum_constants_match_framing_sum() {
        for d in &WRITE_MAP {
            let zeros = SettingValue::Tuple(vec![0; d.values.arity()]);
            let zero = if d.values.arity() == 1 {
                SettingValue::Single(0)
            } else {
                zeros
            };
            let mut buf = d.encode(&zero, 0).unwrap();
            buf[d.checksum_offset] = 0;
            let framing: u32 = buf[6..d.checksum_offset].iter().map(|&b| b as u32).sum();
            assert_eq!(
                (framing & 0xFF) as u8,
                d.checksum_constant,
                "{}: checksum constant",
                d.key
            );
        }
    }

    #[test]
    fn encode_boundary_values() {
        #[rustfmt::skip]
        let cases: Vec<(&str, SettingValue, Vec<u8>)> = vec![
            ("nc_mode", one(0), vec![0x02, 0x10, 0x01, 0x00, 0xFC, 0x0C, 0x96, 0xC3, 0x41, 0x41, 0x02, SEQ, 0x00, 0x00, 0x14, 0xFF, 0x00, 0xF5]),
            ("nc_mode", one(2), vec![0x02, 0x10, 0x01, 0x00, 0xFC, 0x0C, 0x96, 0xC3, 0x41, 0x41, 0x02, SEQ, 0x00, 0x02, 0x14, 0xFF, 0x00, 0xF7]),
            ("volume", one(0), vec![0x02, 0x0F, 0x01, 0x00, 0xFC, 0x0B, 0x96, 0xC3, 0x41, 0x21, 0x02, SEQ, 0x00, 0x00, 0x00, 0xFF, 0xC1]),
            ("volume", one(30), vec![0x02, 0x0F, 0x01, 0x00, 0xFC, 0x0B, 0x96, 0xC3, 0x41, 0x21, 0x02, SEQ, 0x00, 0x00, 0x1E, 0xFF, 0xDF]),
            ("balance", one(0), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x22, 0x02, SEQ, 0x00, 0x00, 0xC3]),
            ("balance", one(100), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x22, 0x02, SEQ, 0x00, 0x64, 0x27]),
            ("sidetone", one(0), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x23, 0x02, SEQ, 0x00, 0x00, 0xFF, 0xC3]),
            ("sidetone", one(10), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x23, 0x02, SEQ, 0x00, 0x0A, 0xFF, 0xCD]),
            ("auto_off", one(0), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x81, 0x02, SEQ, 0x00, 0x00, 0x05, 0x27]),
            ("auto_off", one(180), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x81, 0x02, SEQ, 0x00, 0xB4, 0x05, 0xDB]),
            ("notif_voice", one(0), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x84, 0x02, SEQ, 0x00, 0x00, 0x25]),
            ("notif_voice", one(1), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x84, 0x02, SEQ, 0x00, 0x01, 0x26]),
            ("voice_lang", one(0), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x83, 0x02, SEQ, 0x00, 0x00, 0x24]),
            ("voice_lang", one(2), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x83, 0x02, SEQ, 0x00, 0x02, 0x26]),
            ("boot_nc", one(0), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x43, 0x02, SEQ, 0x00, 0x00, 0xE4]),
            ("boot_nc", one(3), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x43, 0x02, SEQ, 0x00, 0x03, 0xE7]),
            ("boot_bt", one(0), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x63, 0x02, SEQ, 0x00, 0x00, 0x04]),
            ("boot_bt", one(2), vec![0x02, 0x0D, 0x01, 0x00, 0xFC, 0x09, 0x96, 0xC3, 0x41, 0x63, 0x02, SEQ, 0x00, 0x02, 0x06]),
            ("ambient_sound", pair(0, 0), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x42, 0x02, SEQ, 0x00, 0x00, 0x00, 0xE3]),
            ("ambient_sound", pair(20, 1), vec![0x02, 0x0E, 0x01, 0x00, 0xFC, 0x0A, 0x96, 0xC3, 0x41, 0x42, 0x02, SEQ, 0x00, 0x14, 0x01, 0xF8]),
        ];

        for (name, value, prefix) in cases {
            let encoded = encode_write(name, &value, SEQ).unwrap();
            assert_eq!(encoded, expected(&prefix), "{name} = {value:?}");
        }
    }

    #[test]
    fn checksum_wraps_modulo_256() {
        // 0xFE + 100 + 0xBE = 0x220
        let encoded = encode_write("balance", &one(100), 0xFE).unwrap();
        assert_eq!(encoded[14], 0x20);
    }

    #[test]
    fn encode_rejects_unknown_key() {
        let err = encode_write("bass_boost", &one(1), SEQ).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn encode_rejects_arity_mismatch() {
        let err = encode_write("volume", &pair(1, 2), SEQ).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let err = encode_write("ambient_sound", &one(5), SEQ).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let err = encode_write("ambient_sound", &SettingValue::Tuple(vec![1, 1, 1]), SEQ)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn read_request_layout() {
        let req = encode_read_request(request::AUDIO_STATUS);
        assert_eq!(
            req,
            expected(&[
                0x02, 0x0C, 0x01, 0x00, 0xFC, 0x08, 0x96, 0xC3, 0x41, 0x06, 0x01, 0x01, 0x00, 0xA2
            ])
        );
        assert_eq!(read_checksum(request::NC_STATUS), 0xA3);
        assert_eq!(read_checksum(request::SYSTEM_STATUS), 0xA4);
    }

    #[test]
    fn sequence_wraps_after_254_advances() {
        let mut seq = Sequence::new();
        assert_eq!(seq.current(), 1);
        for _ in 0..254 {
            assert_ne!(seq.current(), 0);
            assert_ne!(seq.current(), 255);
            seq.advance();
        }
        assert_eq!(seq.current(), 1);
    }

    #[test]
    fn sequence_254_wraps_to_1() {
        let mut seq = Sequence::new();
        for _ in 0..253 {
            seq.advance();
        }
        assert_eq!(seq.current(), Sequence::LAST);
        seq.advance();
        assert_eq!(seq.current(), Sequence::FIRST);
    }

    #[test]
    fn setting_key_names_roundtrip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::from_name(key.name()), Some(*key));
        }
        assert_eq!(SettingKey::from_name("eq"), None);
    }
}
