//! Event type definitions for the event bus.
//!
//! Events are grouped by category so subscribers can filter cheaply.
//! All events carry the printer serial they belong to, which lets one
//! bus serve several sessions.

use serde::{Deserialize, Serialize};

use crate::data::{DeviceType, GcodeState};

/// Root event enum for all printer events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Material registry changes
    Registry(RegistryEvent),
    /// Device model changes
    Device(DeviceEvent),
    /// Outbound command outcomes
    Command(CommandEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Registry(_) => EventCategory::Registry,
            AppEvent::Device(_) => EventCategory::Device,
            AppEvent::Command(_) => EventCategory::Command,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Registry(e) => e.description(),
            AppEvent::Device(e) => e.description(),
            AppEvent::Command(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Material registry events.
    Registry,
    /// Device model events.
    Device,
    /// Command events.
    Command,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Registry => write!(f, "Registry"),
            EventCategory::Device => write!(f, "Device"),
            EventCategory::Command => write!(f, "Command"),
        }
    }
}

/// Material registry events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// An AMS unit index became known for the first time.
    AmsUnitDiscovered {
        /// Printer serial.
        serial: String,
        /// Unit index taken from the module name.
        index: u8,
    },
}

impl RegistryEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            RegistryEvent::AmsUnitDiscovered { serial, index } => {
                format!("{}: AMS unit {} discovered", serial, index)
            }
        }
    }
}

/// Device model events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// A placeholder device type was replaced by the identified model.
    TypeResolved {
        /// Printer serial.
        serial: String,
        /// The identified model.
        device_type: DeviceType,
    },
    /// The job phase changed.
    GcodeStateChanged {
        /// Printer serial.
        serial: String,
        /// Previous phase.
        from: GcodeState,
        /// New phase.
        to: GcodeState,
    },
    /// A payload could not be decoded and was skipped.
    ReportRejected {
        /// Printer serial.
        serial: String,
        /// Decoder message.
        reason: String,
    },
}

impl DeviceEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            DeviceEvent::TypeResolved {
                serial,
                device_type,
            } => format!("{}: identified as {}", serial, device_type),
            DeviceEvent::GcodeStateChanged { serial, from, to } => {
                format!("{}: {} -> {}", serial, from, to)
            }
            DeviceEvent::ReportRejected { serial, reason } => {
                format!("{}: report rejected ({})", serial, reason)
            }
        }
    }
}

/// Outbound command events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandEvent {
    /// A command document was handed to the transport.
    Published {
        /// Printer serial.
        serial: String,
        /// Command name as sent in the `command` field.
        command: String,
    },
    /// A command was refused before reaching the transport.
    Rejected {
        /// Printer serial.
        serial: String,
        /// Why it was refused.
        reason: String,
    },
}

impl CommandEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            CommandEvent::Published { serial, command } => {
                format!("{}: sent {}", serial, command)
            }
            CommandEvent::Rejected { serial, reason } => {
                format!("{}: refused ({})", serial, reason)
            }
        }
    }
}
