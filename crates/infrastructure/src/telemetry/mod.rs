//! Telemetry: structured logging to stdout

mod logging;

pub use logging::{TelemetryError, init_tracing};
