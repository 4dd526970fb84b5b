// Logging for the command-line front end.
//
// Everything goes to stderr so stdout stays clean for command output.
// `tracing_log::LogTracer` forwards the library's `log::*` calls into the
// same subscriber as its tracing spans.

use labeltrack::config::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Picks the filter directive: `--log-level`, then `RUST_LOG`, then the config.
pub fn resolve_level(cli_level: Option<&str>, env_level: Option<&str>, config_level: &str) -> String {
    cli_level
        .or(env_level)
        .filter(|level| !level.trim().is_empty())
        .unwrap_or(config_level)
        .to_string()
}

fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let filter = format!("{},rusqlite=warn", level);
    EnvFilter::try_new(&filter)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", level, e))
}

pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = build_env_filter(level)?;

    tracing_log::LogTracer::init().ok();

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    tracing::trace!(level, ?format, "logging initialized");
    Ok(())
}
