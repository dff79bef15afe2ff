// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subscriber initialization for hosts that don't bring their own.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include the event target (`dbloupe::query`, `dbloupe::internal`).
    pub include_target: bool,

    pub ansi_colors: bool,

    pub compact: bool,

    /// Write to stderr instead of stdout.
    pub stderr: bool,

    /// Custom filter directive (overrides default_level).
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            stderr: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output: every query entry plus internal diagnostics.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_file_line: true,
            compact: false,
            filter_directive: Some("dbloupe=debug".to_string()),
            ..Self::default()
        }
    }

    /// Warnings and failures only.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Install a global `tracing` subscriber. Call once at startup.
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<()> {
    let layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line);

    let registry = tracing_subscriber::registry().with(config.filter());
    let result = match (config.compact, config.stderr) {
        (true, true) => registry.with(layer.compact().with_writer(io::stderr)).try_init(),
        (true, false) => registry.with(layer.compact()).try_init(),
        (false, true) => registry.with(layer.with_writer(io::stderr)).try_init(),
        (false, false) => registry.with(layer).try_init(),
    };

    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
