//! Unsolicited device events.
//!
//! The headset pushes event reports whenever state changes on the device
//! itself (buttons, dials, charger, Bluetooth). Event reports carry
//! direction byte 0x04 at offset 2 and category 0x14 at offset 8; the
//! command byte at offset 9 selects the payload layout.

use crate::device::NcMode;
use crate::error::Result;
use crate::headset::Headset;
use crate::protocol::{events, offsets};
use crate::transport::TransportOpener;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// First payload byte of an event.
const PAYLOAD_0: usize = 13;
/// Second payload byte of an event.
const PAYLOAD_1: usize = 14;

/// A typed device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Power { charging: bool, battery_level: u8 },
    Volume { value: u8 },
    Balance { value: u8 },
    NcMode { mode: NcMode },
    MicMute { muted: bool },
    MicConnected { connected: bool },
    Bluetooth { enabled: bool, connected: bool },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let on_off = |b: bool| if b { "On" } else { "Off" };
        match self {
            Self::Power {
                charging,
                battery_level,
            } => write!(
                f,
                "power -> {battery_level}%{}",
                if *charging { " (charging)" } else { "" }
            ),
            Self::Volume { value } => write!(f, "volume -> {value}"),
            Self::Balance { value } => write!(f, "balance -> {value}"),
            Self::NcMode { mode } => write!(f, "nc_mode -> {mode}"),
            Self::MicMute { muted } => write!(f, "mic_muted -> {}", on_off(*muted)),
            Self::MicConnected { connected } => {
                write!(f, "mic_connected -> {}", on_off(*connected))
            }
            Self::Bluetooth { enabled, connected } => write!(
                f,
                "bluetooth -> enabled: {}, connected: {}",
                on_off(*enabled),
                on_off(*connected)
            ),
        }
    }
}

/// Whether `data` is framed as an event report.
pub fn is_event_report(data: &[u8]) -> bool {
    data.len() >= events::MIN_LEN
        && data[offsets::DIRECTION] == events::MARKER
        && data[offsets::CATEGORY] == events::CATEGORY
}

/// Decode one inbound report.
///
/// Returns `None` for reports that are not events (responses and echoes of
/// other exchanges) and for event commands this library does not know.
pub fn decode_event(data: &[u8]) -> Option<Event> {
    if !is_event_report(data) {
        return None;
    }

    let command = data[offsets::COMMAND];
    let p0 = data[PAYLOAD_0];
    let p1 = data[PAYLOAD_1];

    let event = match command {
        events::POWER => Event::Power {
            charging: p0 != 0,
            battery_level: p1,
        },
        events::VOLUME_CHANGED => Event::Volume { value: p1 },
        events::BALANCE_CHANGED => Event::Balance { value: p0 },
        events::NC_CHANGED => match NcMode::from_raw(p0) {
            Ok(mode) => Event::NcMode { mode },
            Err(e) => {
                warn!(error = %e, "Dropping NC event");
                return None;
            }
        },
        events::MIC_MUTE => Event::MicMute { muted: p0 != 0 },
        events::MIC_CONNECTION => Event::MicConnected { connected: p0 == 0 },
        events::BT_STATE => Event::Bluetooth {
            enabled: p0 != 0,
            connected: p1 != 0,
        },
        other => {
            debug!(command = format_args!("0x{:02X}", other), "Unknown event command");
            return None;
        }
    };

    trace!(?event, "event decoded");
    Some(event)
}

/// Shared stop flag for an event stream.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the stream to stop; observed before its next read.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Blocking iterator over device events.
///
/// Each `next` call reads until an event arrives, the stop token is set, or
/// the transport fails. A transport failure is yielded once, after which the
/// stream is finished. The stream holds the connection exclusively, so no
/// other exchange can consume its reports.
pub struct EventStream<'a, O: TransportOpener> {
    headset: &'a mut Headset<O>,
    stop: StopToken,
    finished: bool,
}

impl<'a, O: TransportOpener> EventStream<'a, O> {
    pub(crate) fn new(headset: &'a mut Headset<O>, stop: StopToken) -> Self {
        Self {
            headset,
            stop,
            finished: false,
        }
    }
}

impl<O: TransportOpener> Iterator for EventStream<'_, O> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        let timeout_ms = self.headset.timing().event_timeout_ms;
        loop {
            if self.finished || self.stop.is_stopped() {
                return None;
            }
            match self.headset.poll_event(timeout_ms) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
