//! # Event Bus Module
//!
//! Publish/subscribe channel between the printer session and its observers.
//!
//! ## Overview
//!
//! - The coordinator publishes typed events without knowing who listens
//! - Subscribers filter by category and receive the events they asked for
//! - Handlers run synchronously; tokio tasks can take a broadcast receiver
//!
//! ## Usage
//!
//! ```rust
//! use bambukit_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, RegistryEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Registry]),
//!     |event| {
//!         if let AppEvent::Registry(RegistryEvent::AmsUnitDiscovered { index, .. }) = event {
//!             println!("AMS {} online", index);
//!         }
//!     },
//! );
//!
//! bus.publish(AppEvent::Registry(RegistryEvent::AmsUnitDiscovered {
//!     serial: "01S00C000000001".to_string(),
//!     index: 0,
//! }));
//!
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
