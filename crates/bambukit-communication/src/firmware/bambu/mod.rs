//! Bambu Lab printer support
//!
//! Report parsing, the merged device model, the AMS registry, the job
//! cache and command gate, and the controller that ties them to a
//! transport.

pub mod ams;
pub mod commands;
pub mod controller;
pub mod device;
pub mod models;
pub mod print_job;
pub mod report;
pub mod utils;

pub use ams::{AmsLive, AmsRegistry, AmsSnapshot, AmsUnit, AmsUnitState, Tray};
pub use commands::{build_start_command, check_supported, start_gate, PrinterCommand};
pub use controller::BambuController;
pub use device::{Device, DeviceSnapshot, UpdateSummary};
pub use models::{Fan, Fans, Info, Lights, Speed, StageAction, Temperature};
pub use print_job::{gcode_file_reference, FsJobCache, JobCache, PrintJobRecord};
pub use report::{Fragment, Report, Scalar};
