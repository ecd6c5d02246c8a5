//! Error types for zoneout-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Device absent, not accessible, or the connection is closed.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// HID transport failure on an open handle.
    #[error("HID error: {0}")]
    Hid(String),

    /// Unknown setting key, value arity mismatch, or malformed report.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No matching response arrived within the read retry budget.
    #[error("timeout waiting for report 0x{command:02X} after {attempts} reads")]
    Timeout { command: u8, attempts: u32 },

    /// A raw byte that does not map onto a known enumerated setting.
    #[error("unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: u8 },

    /// The worker thread owning the connection has exited.
    #[error("headset worker stopped")]
    WorkerStopped,
}

impl Error {
    /// Whether this error belongs to the protocol kind (bad key, arity,
    /// undecodable data, or an exhausted read).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Timeout { .. } | Self::UnknownValue { .. }
        )
    }
}

impl From<hidapi::HidError> for Error {
    fn from(e: hidapi::HidError) -> Self {
        Error::Hid(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
