//! Report exchange over the shared HID handle.
//!
//! The handle carries no framing beyond fixed-size reports: status
//! responses, write echoes and unsolicited events all arrive on the same
//! read path. A status read therefore flushes stale input, sends its
//! request, then polls a bounded number of times for the report whose
//! command byte matches.

use crate::error::{Error, Result};
use crate::protocol::{self, offsets, REPORT_LEN};
use crate::transport::ReportTransport;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Timeouts and retry budget for report exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Per-read timeout while flushing stale input before a request.
    pub flush_timeout_ms: i32,
    /// Per-read timeout while waiting for a status response.
    pub response_timeout_ms: i32,
    /// Reads attempted before a status request times out.
    pub response_attempts: u32,
    /// Timeout for discarding the echo that follows a write.
    pub echo_timeout_ms: i32,
    /// Per-read timeout of the event listen loop.
    pub event_timeout_ms: i32,
    /// Event poll timeout of the worker thread between requests.
    pub worker_poll_ms: i32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            flush_timeout_ms: 10,
            response_timeout_ms: 15,
            response_attempts: 10,
            echo_timeout_ms: 20,
            event_timeout_ms: 1000,
            worker_poll_ms: 50,
        }
    }
}

/// Whether `data` is the response to status request `command`.
pub fn is_response_to(data: &[u8], command: u8) -> bool {
    data.len() >= REPORT_LEN && data[offsets::COMMAND] == command
}

/// Read and discard everything already buffered on the handle.
pub fn flush_pending(transport: &mut dyn ReportTransport, timing: &Timing) -> Result<usize> {
    let mut flushed = 0;
    loop {
        let data = transport.read_report(timing.flush_timeout_ms)?;
        if data.is_empty() {
            break;
        }
        trace!(report_hex = format_args!("{:02X?}", data), "flushed stale report");
        flushed += 1;
    }
    if flushed > 0 {
        debug!(flushed, "Discarded stale reports before request");
    }
    Ok(flushed)
}

/// Discard at most one report following a write. Best effort: a missing
/// echo or a read failure is ignored.
pub fn drain_echo(transport: &mut dyn ReportTransport, timing: &Timing) {
    match transport.read_report(timing.echo_timeout_ms) {
        Ok(data) if !data.is_empty() => {
            trace!(report_hex = format_args!("{:02X?}", data), "write echo discarded");
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "echo drain failed; ignored"),
    }
}

/// Send the status request for `command` and wait for its response.
pub fn request_report(
    transport: &mut dyn ReportTransport,
    command: u8,
    timing: &Timing,
) -> Result<Vec<u8>> {
    let request = protocol::encode_read_request(command);

    flush_pending(transport, timing)?;

    trace!(
        command = format_args!("0x{:02X}", command),
        report_hex = format_args!("{:02X?}", &request[..protocol::READ_CHECKSUM_OFFSET + 1]),
        "status TX"
    );
    transport.write_report(&request)?;

    for attempt in 1..=timing.response_attempts {
        let data = transport.read_report(timing.response_timeout_ms)?;
        if data.is_empty() {
            continue;
        }
        if is_response_to(&data, command) {
            trace!(
                command = format_args!("0x{:02X}", command),
                attempt,
                report_hex = format_args!("{:02X?}", data),
                "status RX"
            );
            return Ok(data);
        }
        debug!(
            command = format_args!("0x{:02X}", command),
            len = data.len(),
            got = format_args!("0x{:02X}", data.get(offsets::COMMAND).copied().unwrap_or(0)),
            "Skipping unrelated report"
        );
    }

    warn!(
        command = format_args!("0x{:02X}", command),
        attempts = timing.response_attempts,
        "No status response"
    );
    Err(Error::Timeout {
        command,
        attempts: timing.response_attempts,
    })
}

/// Classification of failures for callers deciding whether to carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Device gone or connection closed; reopen before retrying.
    Disconnected,
    /// Handle could not be opened for lack of permission.
    PermissionDenied,
    /// Bad request or undecodable data; the handle is still usable.
    Protocol,
    /// A read or write failed for another reason.
    Transport,
}

impl ErrorClass {
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::DeviceNotFound(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("permission") || lower.contains("access denied") {
                    Self::PermissionDenied
                } else {
                    Self::Disconnected
                }
            }
            Error::Hid(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("disconnect")
                    || lower.contains("no such device")
                    || lower.contains("not found")
                {
                    Self::Disconnected
                } else if lower.contains("permission") || lower.contains("access denied") {
                    Self::PermissionDenied
                } else {
                    Self::Transport
                }
            }
            Error::WorkerStopped => Self::Disconnected,
            Error::Protocol(_) | Error::Timeout { .. } | Error::UnknownValue { .. } => {
                Self::Protocol
            }
        }
    }

    /// Whether the connection can keep serving requests after this error.
    pub fn keeps_connection(&self) -> bool {
        matches!(self, Self::Protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_read_request, request};
    use crate::status::fixtures;
    use crate::transport::mock::MockTransport;

    #[test]
    fn request_returns_matching_response() {
        let mut mock = MockTransport::new();
        mock.on_request(
            encode_read_request(request::AUDIO_STATUS),
            vec![fixtures::audio()],
        );

        let data = request_report(&mut mock, request::AUDIO_STATUS, &Timing::default()).unwrap();
        assert_eq!(data, fixtures::audio());
        assert_eq!(mock.written(), vec![encode_read_request(request::AUDIO_STATUS)]);
    }

    #[test]
    fn stale_reports_flushed_before_request() {
        let mut mock = MockTransport::new();
        // A stale audio response left over from an earlier exchange.
        let mut stale = fixtures::audio();
        stale[15] = 99;
        mock.queue(stale);
        mock.queue(vec![0x02, 0x0D, 0x04]);
        mock.on_request(
            encode_read_request(request::AUDIO_STATUS),
            vec![fixtures::audio()],
        );

        let timing = Timing::default();
        let data = request_report(&mut mock, request::AUDIO_STATUS, &timing).unwrap();
        assert_eq!(data[15], 50);
        assert_eq!(mock.pending(), 0);
    }

    #[test]
    fn unrelated_and_short_reports_skipped() {
        let mut mock = MockTransport::new();
        let mut short = fixtures::nc();
        short.truncate(32);
        mock.on_request(
            encode_read_request(request::NC_STATUS),
            vec![fixtures::audio(), short, fixtures::nc()],
        );

        let data = request_report(&mut mock, request::NC_STATUS, &Timing::default()).unwrap();
        assert_eq!(data, fixtures::nc());
    }

    #[test]
    fn exhausted_budget_times_out() {
        let mut mock = MockTransport::new();
        mock.on_request(
            encode_read_request(request::SYSTEM_STATUS),
            vec![fixtures::audio()],
        );

        let timing = Timing::default();
        let err = request_report(&mut mock, request::SYSTEM_STATUS, &timing).unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                command: request::SYSTEM_STATUS,
                attempts: 10
            }
        ));
        assert!(err.is_protocol());
        // One empty flush read plus the full retry budget.
        assert_eq!(mock.reads(), 1 + timing.response_attempts as usize);
    }

    #[test]
    fn drain_echo_swallows_errors() {
        let mut mock = MockTransport::new();
        mock.fail_reads();
        drain_echo(&mut mock, &Timing::default());
        assert_eq!(mock.reads(), 1);
    }

    #[test]
    fn drain_echo_consumes_one_report() {
        let mut mock = MockTransport::new();
        mock.queue(vec![0x02; 16]);
        mock.queue(vec![0x03; 16]);
        drain_echo(&mut mock, &Timing::default());
        assert_eq!(mock.pending(), 1);
    }

    #[test]
    fn timing_deserializes_partial_overrides() {
        let timing: Timing = serde_json::from_str(r#"{"event_timeout_ms": 250}"#).unwrap();
        assert_eq!(timing.event_timeout_ms, 250);
        assert_eq!(timing.response_attempts, 10);
    }

    #[test]
    fn classify_errors() {
        assert_eq!(
            ErrorClass::classify(&Error::DeviceNotFound("H9".into())),
            ErrorClass::Disconnected
        );
        assert_eq!(
            ErrorClass::classify(&Error::DeviceNotFound(
                "open failed: Permission denied".into()
            )),
            ErrorClass::PermissionDenied
        );
        assert_eq!(
            ErrorClass::classify(&Error::Hid("read_timeout: No such device".into())),
            ErrorClass::Disconnected
        );
        assert_eq!(
            ErrorClass::classify(&Error::Hid("write: broken pipe".into())),
            ErrorClass::Transport
        );
        let timeout = Error::Timeout {
            command: 0x06,
            attempts: 10,
        };
        assert_eq!(ErrorClass::classify(&timeout), ErrorClass::Protocol);
        assert!(ErrorClass::classify(&timeout).keeps_connection());
        assert!(!ErrorClass::Disconnected.keeps_connection());
    }
}
