use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize structured logging from the logging section of the config.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .wrap_err_with(|| format!("Invalid log level: {}", config.level))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(config.include_spans)
                    .with_span_list(config.include_spans),
            )
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?,
        LogFormat::Pretty => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?,
    }

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        "Junction logging initialized"
    );
    Ok(())
}

/// Initialize console-friendly logging for CLI subcommands
pub fn init_console_tracing() -> Result<()> {
    init_tracing(&LoggingConfig {
        level: "warn".to_string(),
        format: LogFormat::Pretty,
        include_spans: false,
    })
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
        http.status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}

/// Create an upstream request span
pub fn create_upstream_span(upstream_url: &str, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "upstream_request",
        upstream.url = upstream_url,
        http.method = method,
        http.path = path,
        http.status_code = tracing::field::Empty,
    )
}
