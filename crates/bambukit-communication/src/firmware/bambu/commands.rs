//! Bambu printer commands
//!
//! Builds the JSON documents published on the request topic. Commands that
//! depend on printer state or hardware go through a gate first; a refused
//! command never produces a document.

use super::device::Device;
use super::print_job::{gcode_file_reference, JobCache};
use crate::firmware::capabilities::Feature;
use bambukit_core::{CommandError, GcodeState, LightMode};
use serde_json::{json, Value};

/// Command to send to the printer
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterCommand {
    /// Request a full status push
    PushAll,
    /// Request the module list
    GetVersion,
    /// Pause the current print
    Pause,
    /// Resume a paused print
    Resume,
    /// Stop the current print
    Stop,
    /// Set an LED mode
    SetLight {
        /// LED node, `chamber_light` or `work_light`
        node: String,
        /// Requested mode
        mode: LightMode,
    },
    /// Start a cached project from the SD card
    ProjectFile {
        /// Job name, also the project file name on the SD card
        job: String,
        /// Gcode entry inside the project
        gcode_file: String,
    },
}

impl PrinterCommand {
    /// Value of the `command` field
    pub fn name(&self) -> &'static str {
        match self {
            PrinterCommand::PushAll => "pushall",
            PrinterCommand::GetVersion => "get_version",
            PrinterCommand::Pause => "pause",
            PrinterCommand::Resume => "resume",
            PrinterCommand::Stop => "stop",
            PrinterCommand::SetLight { .. } => "ledctrl",
            PrinterCommand::ProjectFile { .. } => "project_file",
        }
    }

    /// Feature the printer needs for this command
    pub fn required_feature(&self) -> Option<Feature> {
        match self {
            PrinterCommand::SetLight { .. } => Some(Feature::ChamberLight),
            _ => None,
        }
    }

    /// Build the JSON document
    pub fn to_json(&self) -> Value {
        match self {
            PrinterCommand::PushAll => json!({
                "pushing": {
                    "sequence_id": "0",
                    "command": "pushall"
                }
            }),

            PrinterCommand::GetVersion => json!({
                "info": {
                    "sequence_id": "0",
                    "command": "get_version"
                }
            }),

            PrinterCommand::Pause | PrinterCommand::Resume | PrinterCommand::Stop => json!({
                "print": {
                    "sequence_id": "0",
                    "command": self.name()
                }
            }),

            PrinterCommand::SetLight { node, mode } => json!({
                "system": {
                    "sequence_id": "0",
                    "command": "ledctrl",
                    "led_node": node,
                    "led_mode": mode.as_str(),
                    "led_on_time": 500,
                    "led_off_time": 500,
                    "loop_times": 0,
                    "interval_time": 0
                }
            }),

            PrinterCommand::ProjectFile { job, gcode_file } => json!({
                "print": {
                    "sequence_id": "0",
                    "command": "project_file",
                    "param": gcode_file,
                    "subtask_name": job,
                    "url": format!("file:///sdcard/{}.gcode.3mf", job),
                    "timelapse": false,
                    "bed_leveling": true,
                    "flow_cali": false,
                    "vibration_cali": false,
                    "layer_inspect": false,
                    "use_ams": false,
                    "profile_id": "0",
                    "project_id": "0",
                    "subtask_id": "0",
                    "task_id": "0"
                }
            }),
        }
    }
}

/// Refuse unless the printer is idle
pub fn start_gate(state: GcodeState) -> Result<(), CommandError> {
    if state.is_idle() {
        Ok(())
    } else {
        Err(CommandError::NotIdle { state })
    }
}

/// Read a cached job and build its start command
///
/// Does not check printer state; see [`build_start_command`].
pub fn project_file_command(
    cache: &dyn JobCache,
    job_name: &str,
) -> Result<PrinterCommand, CommandError> {
    let settings =
        cache
            .read_model_settings(job_name)
            .map_err(|e| CommandError::MissingArtifact {
                job: job_name.to_string(),
                reason: e.to_string(),
            })?;

    let gcode_file = gcode_file_reference(&settings)
        .map_err(|e| CommandError::MissingArtifact {
            job: job_name.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| CommandError::MissingGcodeReference {
            job: job_name.to_string(),
        })?;

    Ok(PrinterCommand::ProjectFile {
        job: job_name.to_string(),
        gcode_file,
    })
}

/// Build the command that starts a cached job
///
/// The gate is checked before the cache is touched.
pub fn build_start_command(
    device: &Device,
    cache: &dyn JobCache,
    job_name: &str,
) -> Result<PrinterCommand, CommandError> {
    start_gate(device.info().gcode_state())?;
    project_file_command(cache, job_name)
}

/// Refuse a command the printer has no hardware for
pub fn check_supported(device: &Device, command: &PrinterCommand) -> Result<(), CommandError> {
    match command.required_feature() {
        Some(feature) if !device.supports_feature(feature) => {
            Err(CommandError::UnsupportedFeature {
                device_type: device.device_type().to_string(),
                feature: feature.to_string(),
            })
        }
        _ => Ok(()),
    }
}
