//! # BambuKit Core
//!
//! Core types shared by every BambuKit crate: printer identity and job
//! phase enums, the error taxonomy, and the event bus.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{DeviceType, GcodeState, LightMode};

pub use error::{CommandError, Error, ModelError, Result, TransportError};

// Re-export event bus for convenience
pub use event_bus::{
    AppEvent, CommandEvent, DeviceEvent, EventBus, EventCategory, EventFilter, RegistryEvent,
    SubscriptionId,
};
