//! # BambuKit Communication
//!
//! Printer-side logic for BambuKit: the transport seam, the capability
//! table, and the Bambu Lab telemetry model, job cache and controller.

pub mod communication;
pub mod firmware;

pub use communication::{report_topic, request_topic, ChannelTransport, OutboundMessage, Transport};

pub use firmware::bambu::{
    build_start_command, BambuController, Device, DeviceSnapshot, Fragment, FsJobCache, JobCache,
    PrintJobRecord, PrinterCommand, Report, UpdateSummary,
};
pub use firmware::{CapabilitiesTrait, DeviceCapabilities, Feature};
