//! Connection to one headset: transport lifecycle, sequence counter, and the
//! typed getter/setter/listen surface.
//!
//! Every operation takes `&mut self`, so exchanges on one connection are
//! serialized. Callers that need background event delivery alongside
//! requests should hand the connection to [`crate::worker`].

use crate::comm::{self, Timing};
use crate::device::{BootBtMode, BootNcMode, Language, NcMode};
use crate::error::{Error, Result};
use crate::event::{self, Event, EventStream, StopToken};
use crate::protocol::{self, request, Sequence, SettingKey, SettingValue};
use crate::safety;
use crate::status::{AudioStatus, FullStatus, NcStatus, SystemStatus};
use crate::transport::{HidApiOpener, ReportTransport, TransportOpener};
use crate::{PRODUCT_ID, VENDOR_ID};
use tracing::{debug, info, trace};

fn not_connected() -> Error {
    Error::DeviceNotFound("device not connected".into())
}

/// A headset connection.
pub struct Headset<O: TransportOpener = HidApiOpener> {
    opener: O,
    transport: Option<O::Transport>,
    sequence: Sequence,
    timing: Timing,
}

impl Headset<HidApiOpener> {
    /// A closed connection to real hardware.
    pub fn new() -> Self {
        Self::with_opener(HidApiOpener)
    }

    /// Open the attached headset.
    pub fn connect() -> Result<Self> {
        let mut headset = Self::new();
        headset.open()?;
        Ok(headset)
    }
}

impl Default for Headset<HidApiOpener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: TransportOpener> Headset<O> {
    /// A closed connection that acquires its transport from `opener`.
    pub fn with_opener(opener: O) -> Self {
        Self {
            opener,
            transport: None,
            sequence: Sequence::new(),
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Acquire the transport. Reopening an open connection replaces its handle.
    pub fn open(&mut self) -> Result<()> {
        self.transport = None;
        let transport = self.opener.open(VENDOR_ID, PRODUCT_ID)?;
        self.transport = Some(transport);
        self.sequence.reset();
        info!(
            vid = format_args!("0x{:04X}", VENDOR_ID),
            pid = format_args!("0x{:04X}", PRODUCT_ID),
            "Headset connected"
        );
        Ok(())
    }

    /// Release the transport. Closing a closed connection does nothing.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Headset connection closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Sequence number the next write will carry.
    pub fn sequence(&self) -> u8 {
        self.sequence.current()
    }

    /// Encode and send one write for the setting named `name`.
    ///
    /// The sequence advances once the write is attempted, whether or not it
    /// succeeds. Values are sent as given; the typed setters clamp first.
    pub fn send_setting(&mut self, name: &str, value: SettingValue) -> Result<()> {
        let report = protocol::encode_write(name, &value, self.sequence.current())?;
        let transport = self.transport.as_mut().ok_or_else(not_connected)?;

        trace!(
            setting = name,
            seq = self.sequence.current(),
            report_hex = format_args!("{:02X?}", &report[..protocol::HEADER_LEN + 6]),
            "write TX"
        );
        let sent = transport.write_report(&report);
        self.sequence.advance();
        sent?;

        comm::drain_echo(transport, &self.timing);
        Ok(())
    }

    fn send(&mut self, key: SettingKey, value: SettingValue) -> Result<()> {
        debug!(setting = %key, ?value, "Setting value");
        self.send_setting(key.name(), value)
    }

    /// Clamp `value` into the setting's range, then send it.
    fn send_clamped(&mut self, key: SettingKey, value: i32) -> Result<()> {
        let v = safety::clamp(value, &safety::range_for(key));
        self.send(key, v.into())
    }

    pub fn set_volume(&mut self, value: i32) -> Result<()> {
        self.send_clamped(SettingKey::Volume, value)
    }

    pub fn set_balance(&mut self, value: i32) -> Result<()> {
        self.send_clamped(SettingKey::Balance, value)
    }

    pub fn set_sidetone(&mut self, value: i32) -> Result<()> {
        self.send_clamped(SettingKey::Sidetone, value)
    }

    pub fn set_noise_cancelling(&mut self, mode: i32) -> Result<()> {
        self.send_clamped(SettingKey::NcMode, mode)
    }

    pub fn set_nc_mode(&mut self, mode: NcMode) -> Result<()> {
        self.set_noise_cancelling(mode.raw() as i32)
    }

    /// Set the auto power-off delay, snapped to the nearest firmware preset.
    pub fn set_auto_power_off(&mut self, minutes: i32) -> Result<()> {
        let preset = safety::nearest_auto_off_preset(minutes);
        if preset as i32 != minutes {
            debug!(requested = minutes, preset, "Auto power-off snapped to preset");
        }
        self.send_clamped(SettingKey::AutoOff, preset as i32)
    }

    pub fn set_notification_voice(&mut self, enabled: bool) -> Result<()> {
        self.send_clamped(SettingKey::NotifVoice, i32::from(enabled))
    }

    pub fn set_voice_language(&mut self, lang: i32) -> Result<()> {
        self.send_clamped(SettingKey::VoiceLang, lang)
    }

    pub fn set_language(&mut self, lang: Language) -> Result<()> {
        self.set_voice_language(lang.raw() as i32)
    }

    pub fn set_boot_nc_mode(&mut self, mode: i32) -> Result<()> {
        self.send_clamped(SettingKey::BootNc, mode)
    }

    pub fn set_boot_nc(&mut self, mode: BootNcMode) -> Result<()> {
        self.set_boot_nc_mode(mode.raw() as i32)
    }

    pub fn set_boot_bt_mode(&mut self, mode: i32) -> Result<()> {
        self.send_clamped(SettingKey::BootBt, mode)
    }

    pub fn set_boot_bt(&mut self, mode: BootBtMode) -> Result<()> {
        self.set_boot_bt_mode(mode.raw() as i32)
    }

    /// Set ambient level and focus-on-voice in one write.
    pub fn set_ambient_sound(&mut self, level: i32, focus: bool) -> Result<()> {
        let level = safety::clamp(level, &safety::range_for(SettingKey::AmbientSound));
        let focus = safety::clamp(i32::from(focus), &safety::FLAG);
        self.send(SettingKey::AmbientSound, (level, focus).into())
    }

    /// Set the ambient level with focus-on-voice off.
    pub fn set_ambient_sound_level(&mut self, level: i32) -> Result<()> {
        self.set_ambient_sound(level, false)
    }

    /// Set focus-on-voice at the maximum ambient level.
    pub fn set_ambient_sound_focus(&mut self, focus: bool) -> Result<()> {
        self.set_ambient_sound(safety::AMBIENT_LEVEL_DEFAULT as i32, focus)
    }

    /// Round-trip one status request and return the raw response.
    pub fn read_status_report(&mut self, command: u8) -> Result<Vec<u8>> {
        let transport = self.transport.as_mut().ok_or_else(not_connected)?;
        comm::request_report(transport, command, &self.timing)
    }

    pub fn get_audio_status(&mut self) -> Result<AudioStatus> {
        AudioStatus::decode(&self.read_status_report(request::AUDIO_STATUS)?)
    }

    pub fn get_nc_status(&mut self) -> Result<NcStatus> {
        NcStatus::decode(&self.read_status_report(request::NC_STATUS)?)
    }

    pub fn get_system_status(&mut self) -> Result<SystemStatus> {
        SystemStatus::decode(&self.read_status_report(request::SYSTEM_STATUS)?)
    }

    /// Read all three categories. Not atomic across categories.
    pub fn get_all(&mut self) -> Result<FullStatus> {
        Ok(FullStatus {
            audio: self.get_audio_status()?,
            nc: self.get_nc_status()?,
            system: self.get_system_status()?,
        })
    }

    /// Read one report and decode it if it is an event.
    ///
    /// `Ok(None)` covers timeouts and reports that are not events.
    pub fn poll_event(&mut self, timeout_ms: i32) -> Result<Option<Event>> {
        let transport = self.transport.as_mut().ok_or_else(not_connected)?;
        let data = transport.read_report(timeout_ms)?;
        if data.is_empty() {
            return Ok(None);
        }
        Ok(event::decode_event(&data))
    }

    /// Stream events until `stop` is set or the transport fails.
    pub fn listen(&mut self, stop: StopToken) -> Result<EventStream<'_, O>> {
        if !self.is_open() {
            return Err(not_connected());
        }
        debug!("Listening for headset events");
        Ok(EventStream::new(self, stop))
    }
}
