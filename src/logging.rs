//! Tracing subscriber setup
//!
//! Logs go to stderr so that `--json` output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::Result;
use std::io;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    #[must_use]
    pub fn parse(format: &str) -> Self {
        match format {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber; `verbose` forces `debug`
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match LogFormat::parse(&config.format) {
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .json();
            registry.with(json_layer).try_init()?;
        }
        LogFormat::Pretty => {
            let pretty_layer = fmt::layer()
                .with_file(verbose)
                .with_line_number(verbose)
                .with_target(true)
                .with_writer(io::stderr);
            registry.with(pretty_layer).try_init()?;
        }
        LogFormat::Compact => {
            let compact_layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(io::stderr);
            registry.with(compact_layer).try_init()?;
        }
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        format = %config.format,
        "Logging initialized"
    );
    Ok(())
}
