//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that the real hidapi handle and
//! scripted mock devices share the same interface.

use crate::error::{Error, Result};
use crate::protocol::{Report, REPORT_LEN};
use tracing::debug;

/// Abstraction over raw HID report read/write on an open handle.
pub trait ReportTransport: Send {
    /// Write one full outbound report.
    fn write_report(&mut self, report: &Report) -> Result<()>;

    /// Read one inbound report, waiting at most `timeout_ms`.
    ///
    /// Returns an empty buffer when the timeout expires with no data.
    fn read_report(&mut self, timeout_ms: i32) -> Result<Vec<u8>>;
}

/// Acquires a transport for a vendor/product pair.
pub trait TransportOpener {
    type Transport: ReportTransport;

    /// Open the device; fails with [`Error::DeviceNotFound`] when the device
    /// is absent, inaccessible, or already claimed.
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Self::Transport>;
}

/// Transport backed by a hidapi device handle. Dropping it closes the handle.
pub struct HidTransport {
    device: hidapi::HidDevice,
}

impl HidTransport {
    /// Open the first device matching `vendor_id:product_id` in blocking mode.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self> {
        let not_found = |e: hidapi::HidError| {
            Error::DeviceNotFound(format!(
                "could not open headset (VID=0x{vendor_id:04X} PID=0x{product_id:04X}): {e}. \
                 Check USB connection and permissions (udev rules)"
            ))
        };

        let api = hidapi::HidApi::new().map_err(not_found)?;
        let device = api.open(vendor_id, product_id).map_err(not_found)?;
        device.set_blocking_mode(true)?;

        debug!(
            vid = format_args!("0x{:04X}", vendor_id),
            pid = format_args!("0x{:04X}", product_id),
            "HID handle opened"
        );
        Ok(Self { device })
    }
}

impl ReportTransport for HidTransport {
    fn write_report(&mut self, report: &Report) -> Result<()> {
        self.device
            .write(report)
            .map_err(|e| Error::Hid(format!("write: {e}")))?;
        Ok(())
    }

    fn read_report(&mut self, timeout_ms: i32) -> Result<Vec<u8>> {
        let mut buf = [0u8; REPORT_LEN];
        let n = self
            .device
            .read_timeout(&mut buf, timeout_ms)
            .map_err(|e| Error::Hid(format!("read_timeout: {e}")))?;
        Ok(buf[..n].to_vec())
    }
}

/// Default opener: real hardware through hidapi.
#[derive(Debug, Clone, Copy, Default)]
pub struct HidApiOpener;

impl TransportOpener for HidApiOpener {
    type Transport = HidTransport;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<HidTransport> {
        HidTransport::open(vendor_id, product_id)
    }
}

/// A scripted HID transport for testing.
///
/// Inbound reports are either queued directly (stale data, unsolicited
/// events) or registered against an exact outbound report and delivered
/// once that report is written.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockState {
        written: Vec<Report>,
        inbound: VecDeque<Vec<u8>>,
        responses: HashMap<Vec<u8>, Vec<Vec<u8>>>,
        reads: usize,
        fail_writes: bool,
        fail_reads: bool,
    }

    /// Mock transport; clones share the same scripted device.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `report` available to the next read.
        pub fn queue(&self, report: Vec<u8>) {
            self.state.lock().unwrap().inbound.push_back(report);
        }

        /// Deliver `responses` after `request` is written.
        pub fn on_request(&self, request: Report, responses: Vec<Vec<u8>>) {
            self.state
                .lock()
                .unwrap()
                .responses
                .insert(request.to_vec(), responses);
        }

        pub fn fail_writes(&self) {
            self.state.lock().unwrap().fail_writes = true;
        }

        pub fn fail_reads(&self) {
            self.state.lock().unwrap().fail_reads = true;
        }

        /// Every report written so far.
        pub fn written(&self) -> Vec<Report> {
            self.state.lock().unwrap().written.clone()
        }

        /// Number of read calls so far.
        pub fn reads(&self) -> usize {
            self.state.lock().unwrap().reads
        }

        /// Inbound reports not yet consumed.
        pub fn pending(&self) -> usize {
            self.state.lock().unwrap().inbound.len()
        }
    }

    impl ReportTransport for MockTransport {
        fn write_report(&mut self, report: &Report) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.fail_writes {
                return Err(Error::Hid("mock: write failed".into()));
            }
            state.written.push(*report);
            if let Some(responses) = state.responses.get(&report.to_vec()).cloned() {
                state.inbound.extend(responses);
            }
            Ok(())
        }

        fn read_report(&mut self, _timeout_ms: i32) -> Result<Vec<u8>> {
            let mut state = self.state.lock().unwrap();
            state.reads += 1;
            if state.fail_reads {
                return Err(Error::Hid("mock: device disconnected".into()));
            }
            Ok(state.inbound.pop_front().unwrap_or_default())
        }
    }

    /// Opener handing out clones of one mock transport.
    #[derive(Clone, Default)]
    pub struct MockOpener {
        pub transport: MockTransport,
        pub absent: bool,
    }

    impl MockOpener {
        pub fn new(transport: MockTransport) -> Self {
            Self {
                transport,
                absent: false,
            }
        }

        pub fn absent() -> Self {
            Self {
                transport: MockTransport::new(),
                absent: true,
            }
        }
    }

    impl TransportOpener for MockOpener {
        type Transport = MockTransport;

        fn open(&self, vendor_id: u16, product_id: u16) -> Result<MockTransport> {
            if self.absent {
                return Err(Error::DeviceNotFound(format!(
                    "mock: no device {vendor_id:04X}:{product_id:04X}"
                )));
            }
            Ok(self.transport.clone())
        }
    }
}
