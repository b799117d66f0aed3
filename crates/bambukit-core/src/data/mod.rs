//! Shared printer data types
//!
//! Enumerations that describe a printer's identity and job lifecycle.
//! These are used by every layer: the telemetry model, the command gate,
//! the event bus and the settings file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Printer model family
///
/// The set is closed: any identifier the firmware or a config file uses
/// that is not listed here parses to [`DeviceType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceType {
    /// X1
    X1,
    /// X1 Carbon
    X1C,
    /// P1P
    P1P,
    /// Placeholder used before the model has been identified
    #[default]
    Unknown,
}

impl DeviceType {
    /// Check if this is a concrete, identified model
    pub fn is_known(&self) -> bool {
        !matches!(self, DeviceType::Unknown)
    }
}

impl FromStr for DeviceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "X1" => DeviceType::X1,
            "X1C" => DeviceType::X1C,
            "P1P" => DeviceType::P1P,
            _ => DeviceType::Unknown,
        })
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X1 => write!(f, "X1"),
            Self::X1C => write!(f, "X1C"),
            Self::P1P => write!(f, "P1P"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Job phase reported in `gcode_state`
///
/// The firmware reports these as upper-case strings; parsing is
/// case-insensitive so traces captured by other tools still match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GcodeState {
    /// No job loaded, ready to start a print
    Idle,
    /// Job is being prepared (file download, heating)
    Prepare,
    /// Cloud slicing in progress
    Slicing,
    /// Printing
    Running,
    /// Paused by the user or by the firmware
    Pause,
    /// Last job completed
    Finish,
    /// Last job failed
    Failed,
    /// Not yet reported or not recognised
    #[default]
    Unknown,
}

impl GcodeState {
    /// Parse the firmware string
    pub fn from_report(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Self::Idle,
            "PREPARE" => Self::Prepare,
            "SLICING" => Self::Slicing,
            "RUNNING" => Self::Running,
            "PAUSE" => Self::Pause,
            "FINISH" => Self::Finish,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Check if a new print may be started from this phase
    pub fn is_idle(&self) -> bool {
        matches!(self, GcodeState::Idle)
    }

    /// Check if a job is currently in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            GcodeState::Prepare | GcodeState::Slicing | GcodeState::Running | GcodeState::Pause
        )
    }
}

impl fmt::Display for GcodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Prepare => write!(f, "PREPARE"),
            Self::Slicing => write!(f, "SLICING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Pause => write!(f, "PAUSE"),
            Self::Finish => write!(f, "FINISH"),
            Self::Failed => write!(f, "FAILED"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Mode of an LED channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    /// Light is on
    On,
    /// Light is off
    Off,
    /// Light is blinking
    Flashing,
    /// Not yet reported
    #[default]
    Unknown,
}

impl LightMode {
    /// Parse the `mode` string of a lights report entry
    pub fn from_report(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" => Self::On,
            "off" => Self::Off,
            "flashing" => Self::Flashing,
            _ => Self::Unknown,
        }
    }

    /// Wire name used in `ledctrl` commands
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Flashing => "flashing",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_parse() {
        assert_eq!("X1C".parse::<DeviceType>().unwrap(), DeviceType::X1C);
        assert_eq!("p1p".parse::<DeviceType>().unwrap(), DeviceType::P1P);
        assert_eq!("A1".parse::<DeviceType>().unwrap(), DeviceType::Unknown);
        assert!(!DeviceType::Unknown.is_known());
    }

    #[test]
    fn test_gcode_state_parse() {
        assert_eq!(GcodeState::from_report("IDLE"), GcodeState::Idle);
        assert_eq!(GcodeState::from_report("idle"), GcodeState::Idle);
        assert_eq!(GcodeState::from_report("RUNNING"), GcodeState::Running);
        assert_eq!(GcodeState::from_report("bogus"), GcodeState::Unknown);
        assert!(GcodeState::Pause.is_active());
        assert!(!GcodeState::Finish.is_idle());
    }

    #[test]
    fn test_light_mode_parse() {
        assert_eq!(LightMode::from_report("on"), LightMode::On);
        assert_eq!(LightMode::from_report("OFF"), LightMode::Off);
        assert_eq!(LightMode::from_report("strobe"), LightMode::Unknown);
    }
}
