//! zoneout-core: USB HID protocol for the Sony INZONE H9 II headset.
//!
//! This crate talks to the headset over its vendor HID interface: it encodes
//! setting writes, reads and decodes the three status categories, and turns
//! unsolicited reports into typed events.

pub mod comm;
pub mod device;
pub mod error;
pub mod event;
pub mod headset;
pub mod protocol;
pub mod safety;
pub mod status;
pub mod transport;
pub mod worker;

pub use error::{Error, Result};
pub use event::{Event, EventStream, StopToken};
pub use headset::Headset;
pub use worker::HeadsetWorker;

/// Sony USB Vendor ID.
pub const VENDOR_ID: u16 = 0x054C;
/// INZONE H9 II Product ID.
pub const PRODUCT_ID: u16 = 0x0FA8;
