//! Observability for aeromap
//!
//! - Structured JSON logging
//! - Monotonic metrics counters
//! - Typed lifecycle events
//!
//! Observability is read-only: it never changes the outcome of an operation.
//!
//! # Usage
//!
//! ```ignore
//! use aeromap::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::EntityInserted, &[("storage", "users")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.add_inserted(1);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
