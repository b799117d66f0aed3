//! # BambuKit
//!
//! Telemetry merge engine for Bambu Lab 3D printers:
//! - Incremental merge of partial JSON status reports into one device model
//! - Model-based capability resolution (X1, X1C, P1P)
//! - AMS unit discovery and tray tracking
//! - Gated construction of the print-start command from a local job cache
//!
//! ## Architecture
//!
//! BambuKit is organized as a workspace with multiple crates:
//!
//! 1. **bambukit-core** - Shared enums, error types, event bus
//! 2. **bambukit-communication** - Transport seam, device model, controller
//! 3. **bambukit-settings** - Configuration file handling
//! 4. **bambukit** - This crate: logging setup, trace replay, CLI binary

pub mod replay;

pub use bambukit_communication::firmware;
pub use bambukit_core::data;

pub use bambukit_core::{
    AppEvent, CommandError, CommandEvent, DeviceEvent, DeviceType, Error, EventBus,
    EventCategory, EventFilter, GcodeState, LightMode, ModelError, RegistryEvent, Result,
    SubscriptionId, TransportError,
};

pub use bambukit_communication::{
    build_start_command, report_topic, request_topic, BambuController, ChannelTransport, Device,
    DeviceCapabilities, DeviceSnapshot, Feature, Fragment, FsJobCache, JobCache, OutboundMessage,
    PrintJobRecord, PrinterCommand, Report, Transport, UpdateSummary,
};

pub use bambukit_settings::{
    default_config_path, CacheSettings, Config, ConnectionSettings, LoggingSettings,
    SettingsError,
};

pub use replay::{replay_trace, ReplaySummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging from the logging section of the config
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support, falling back to `settings.filter`
/// - Pretty console output on stderr, or JSON lines when `settings.json` is set
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))?;

    // stdout carries command output, so logs go to stderr
    if settings.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true)
            .pretty();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
