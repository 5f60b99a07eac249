//! Structured logging setup.
//!
//! The library itself only emits `tracing` events. Binaries and tests call
//! [`init_logging`] once to install a subscriber, then run their work inside
//! [`app_span`] so every line carries the configured application name.

use tracing::level_filters::LevelFilter;
use tracing::{info, info_span, Span};

use crate::config::LoggingConfig;

/// Install a global `fmt` subscriber writing to stderr.
///
/// Returns `false` when a subscriber was already installed, which is harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from_level(config.log_level))
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        info!(
            app_name = %config.app_name,
            level = %config.log_level,
            json = config.json_format,
            "Logging initialized"
        );
    }
    installed
}

/// Root span tagging everything recorded inside it with `app_name`.
pub fn app_span(config: &LoggingConfig) -> Span {
    info_span!("app", app_name = %config.app_name)
}
