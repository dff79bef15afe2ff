// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command interception and metric correlation.
//!
//! The interceptor receives "executing" and "executed" notifications for database
//! commands, correlates each pair by [`OperationId`](crate::types::OperationId),
//! measures the duration, and emits one [`MetricRecord`] per operation along with
//! diagnostic log entries. It never changes the outcome of the observed call.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbloupe::interceptor;
//!
//! // Once at startup; further calls are no-ops.
//! interceptor::install();
//!
//! // Drivers dispatch to every registered interceptor.
//! for hook in interceptor::interceptors() {
//!     hook.non_query_executing(&command);
//! }
//! ```

pub mod caption;
mod chain;
pub mod message;
mod record;
pub mod sink;
mod tracker;

pub use caption::{render_parameters, shorten_query, Caption, MAX_CAPTION_CHARS, TRUNCATION_MARKER};
pub use chain::{
    add_interceptor, install, install_with_sinks, installed, interceptors, is_installed,
    CommandInterceptor,
};
pub use record::{MetricRecord, SUCCESS};
pub use sink::{
    AggregatingMetricSink, FanoutMetricSink, JsonLinesMetricSink, LogEntry, LogSink, MetricSink,
    Severity, TracingLogSink, LOG_CATEGORY, LOG_SYSTEM,
};
pub use tracker::MetricInterceptor;
