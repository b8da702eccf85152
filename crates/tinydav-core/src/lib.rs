//! Core types: time ranges, event times, tracing setup

pub mod time;
pub mod tracing;

pub use time::{EventTime, ICAL_BASIC_FORMAT, TimeError, TimeRange, format_basic, parse_basic};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
