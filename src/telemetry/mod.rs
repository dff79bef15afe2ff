// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry infrastructure.
//!
//! - **Tracing**: subscriber setup for hosts that don't install their own
//! - **Metrics**: in-process aggregation of finished query records
//! - **Correlation IDs**: joining an operation's log entries and metric
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbloupe::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! // ... run instrumented queries ...
//! println!("{}", GLOBAL_METRICS.snapshot().format_report());
//! ```

mod correlation;
mod init;
pub mod metrics;

pub use correlation::CorrelationId;
pub use init::{init_telemetry, TelemetryConfig};
pub use metrics::{Histogram, Metrics, MetricsSnapshot, QueryMetrics, GLOBAL_METRICS};
