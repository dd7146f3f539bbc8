//! Structured logging setup.

use crate::error::{RegistryError, Result};
use clap::{Args, ValueEnum};
use std::io;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output for development
    Pretty,
    /// One line per event
    Compact,
    /// JSON objects for log collectors
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Default level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl LoggingArgs {
    fn filter(&self) -> EnvFilter {
        let base = std::env::var("RUST_LOG").unwrap_or_else(|_| self.log_level.clone());
        EnvFilter::new(base)
            .add_directive(
                "hyper=warn"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::WARN.into()),
            )
            .add_directive(
                "sqlx::query=warn"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::WARN.into()),
            )
            .add_directive(
                "tower_http=info"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::INFO.into()),
            )
    }

    /// Installs the global subscriber. Logs go to stderr.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a global subscriber is already installed.
    pub fn init(&self) -> Result<()> {
        let registry = tracing_subscriber::registry().with(self.filter());
        let installed = match self.log_format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_writer(io::stderr))
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(io::stderr),
                )
                .try_init(),
        };
        installed.map_err(|e| RegistryError::ConfigError(format!("logging: {}", e)))?;

        info!(
            service.version = env!("CARGO_PKG_VERSION"),
            log.format = ?self.log_format,
            "logging initialized"
        );
        Ok(())
    }
}
