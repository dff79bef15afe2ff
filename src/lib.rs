// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! dbloupe - database call instrumentation.
//!
//! Observes every command a database driver executes, measures how long it took,
//! and emits a correlated log trail plus one metric record per operation. The
//! instrumentation never changes the outcome of the observed call.
//!
//! # Architecture
//!
//! - [`types`] - Driver-neutral command, value, and failure types
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`interceptor`] - Hooks, correlation table, captions, and sinks
//! - [`telemetry`] - Subscriber setup, metric aggregation, correlation ids
//! - [`sqlite`] - Instrumented `rusqlite` connection (feature `sqlite`)
//!
//! # Example
//!
//! ```rust,ignore
//! use dbloupe::interceptor;
//! use dbloupe::sqlite::InstrumentedConnection;
//!
//! interceptor::install();
//!
//! let conn = InstrumentedConnection::open("app.db")?;
//! conn.execute("UPDATE Customers SET Active = 1", &[])?;
//! ```

pub mod config;
pub mod error;
pub mod interceptor;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, InterceptError, Result, SinkError};
pub use interceptor::{
    install, install_with_sinks, CommandInterceptor, MetricInterceptor, MetricRecord, Severity,
};
pub use types::{Command, CommandKind, DbFailure, DbValue, OperationId, Parameter};

/// dbloupe version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
