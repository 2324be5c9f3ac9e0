//! Observability for the sensor node
//!
//! Structured logging through `tracing`, with span macros for the publish
//! tick, connectivity recovery and broker operations.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{connectivity_span, mqtt_span, tick_span};
