//! Error handling for BambuKit
//!
//! Provides error types for each layer of the printer link:
//! - Model errors (report decoding)
//! - Command errors (start gate, job artifacts, capability checks)
//! - Transport errors (outbound channel)
//!
//! Malformed fields inside a well-formed report are not errors at all; the
//! model keeps the previous value. Only a payload that cannot be decoded as
//! a report surfaces as [`ModelError`], and the ingestion loop logs and
//! skips it.
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::GcodeState;
use thiserror::Error;

/// Report decoding error
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    /// Payload is not valid JSON
    #[error("Invalid report payload: {reason}")]
    InvalidPayload {
        /// The decoder message.
        reason: String,
    },

    /// Payload is JSON but not an object
    #[error("Report must be a JSON object, got {kind}")]
    NotAnObject {
        /// The JSON kind that was received.
        kind: String,
    },
}

/// Command construction error
///
/// Every variant means no document was handed to the transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// The printer is not idle
    #[error("Printer is not idle (state: {state})")]
    NotIdle {
        /// The job phase observed when the command was requested.
        state: GcodeState,
    },

    /// The job's configuration artifact is missing or unreadable
    #[error("Missing artifact for job '{job}': {reason}")]
    MissingArtifact {
        /// The job name.
        job: String,
        /// Why the artifact could not be used.
        reason: String,
    },

    /// The configuration artifact has no gcode reference
    #[error("No gcode_file reference in configuration for job '{job}'")]
    MissingGcodeReference {
        /// The job name.
        job: String,
    },

    /// The device does not have the control the command needs
    #[error("Feature not supported by {device_type}: {feature}")]
    UnsupportedFeature {
        /// The device type.
        device_type: String,
        /// The missing feature.
        feature: String,
    },
}

impl CommandError {
    /// Check if the command was refused because of the machine state
    pub fn is_precondition_violation(&self) -> bool {
        matches!(self, CommandError::NotIdle { .. })
    }

    /// Check if the command was refused because of the job artifact
    pub fn is_missing_artifact(&self) -> bool {
        matches!(
            self,
            CommandError::MissingArtifact { .. } | CommandError::MissingGcodeReference { .. }
        )
    }
}

/// Transport error type
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The transport owner has gone away
    #[error("Transport channel closed")]
    ChannelClosed,

    /// Document could not be encoded
    #[error("Failed to encode command: {reason}")]
    Encode {
        /// The encoder message.
        reason: String,
    },
}

/// Main error type for BambuKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Model error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a command error
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_))
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
