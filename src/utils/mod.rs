//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: process-wide atomic counters and per-connection stats
//! - **Timeout**: default durations and async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{global_metrics, ConnStats};
