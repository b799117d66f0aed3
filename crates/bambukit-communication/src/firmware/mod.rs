//! Firmware implementations for supported printers
//!
//! Supported printers:
//! - Bambu Lab X1, X1 Carbon and P1P over the LAN MQTT interface

pub mod bambu;
pub mod capabilities;

pub use capabilities::{supports, CapabilitiesTrait, DeviceCapabilities, Feature};
