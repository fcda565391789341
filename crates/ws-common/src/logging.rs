//! Structured Logging Configuration
//!
//! - JSON output for log aggregation (`LOG_FORMAT=json`)
//! - Human-readable output otherwise
//! - `RUST_LOG` filtering, default `info`
//!
//! ```rust,ignore
//! ws_common::logging::init_logging("ws-endpoint");
//! tracing::info!(subscription_id = %id, "Subscription confirmed");
//! ```

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the global subscriber for `service_name`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(service_name: &str) {
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let installed = if json {
        init_json_logging(default_filter())
    } else {
        init_text_logging(default_filter())
    };

    if installed {
        tracing::debug!(service = service_name, json, "Logging initialized");
    }
}

/// Text logs on stderr for command-line tools whose stdout carries output.
///
/// `RUST_LOG` still applies; otherwise `default_level` is used.
pub fn init_stderr_logging(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_json_logging(env_filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .try_init()
        .is_ok()
}

fn init_text_logging(env_filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(true),
        )
        .try_init()
        .is_ok()
}
