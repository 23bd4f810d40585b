// ABOUTME: Logging configuration and structured logging setup for the integration layer
// ABOUTME: Configures log level filtering and output format from environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Healthsync Contributors

use std::env;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for production logging.
    Json,
    /// Pretty format for development.
    Pretty,
    /// Compact format for space-constrained environments.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    pub format: LogFormat,
    /// Include source file and line numbers.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Build configuration from `RUST_LOG` / `HEALTHSYNC_LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        let format = match env::var("HEALTHSYNC_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self {
            level,
            format,
            include_location: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are ignored so tests that
/// each initialize logging do not panic.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_file(config.include_location))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_file(config.include_location))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_file(config.include_location))
            .try_init(),
    };

    // Already-initialized is fine; anything else is not worth failing startup for.
    drop(result);
}
