// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log and metric sinks.
//!
//! The interceptor hands finished log entries and metric records to these
//! collaborators. Sinks may fail or even panic; the interceptor absorbs both.

use std::io::Write;
use std::panic::Location;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::telemetry::{CorrelationId, Metrics, GLOBAL_METRICS};

use super::record::MetricRecord;

/// Logical system tag written with every entry.
pub const LOG_SYSTEM: &str = "Loupe";

/// Log category for query entries.
pub const LOG_CATEGORY: &str = "Data Access.Query";

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Corresponding tracing level.
    pub fn level(&self) -> tracing::Level {
        match self {
            Self::Verbose => tracing::Level::DEBUG,
            Self::Information => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

/// A structured log write.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub system: &'static str,
    pub category: &'static str,
    pub title: String,
    pub detail: String,
    /// Ties together the entries and metric of one operation.
    pub correlation_id: Option<CorrelationId>,
    /// Application call site the entry is attributed to.
    pub caller: Option<&'static Location<'static>>,
}

impl LogEntry {
    pub fn new(severity: Severity, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity,
            system: LOG_SYSTEM,
            category: LOG_CATEGORY,
            title: title.into(),
            detail: detail.into(),
            correlation_id: None,
            caller: None,
        }
    }

    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn caller(mut self, caller: Option<&'static Location<'static>>) -> Self {
        self.caller = caller;
        self
    }
}

/// Receives free-text diagnostic entries.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    fn write(&self, entry: LogEntry) -> Result<(), SinkError>;
}

/// Receives finished metric records, one call per record.
#[cfg_attr(test, mockall::automock)]
pub trait MetricSink: Send + Sync {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError>;
}

/// Log sink that forwards entries to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

macro_rules! emit_entry {
    ($level:expr, $system:ident, $category:ident, $corr:ident, $file:ident, $line:ident, $detail:ident, $title:ident) => {
        tracing::event!(
            target: "dbloupe::query",
            $level,
            system = $system,
            category = $category,
            correlation_id = %$corr,
            caller.file = $file,
            caller.line = $line,
            detail = %$detail,
            "{}",
            $title
        )
    };
}

impl LogSink for TracingLogSink {
    fn write(&self, entry: LogEntry) -> Result<(), SinkError> {
        let corr = entry
            .correlation_id
            .map(|id| id.short())
            .unwrap_or_default();
        let file = entry.caller.map(|c| c.file()).unwrap_or("");
        let line = entry.caller.map(|c| c.line()).unwrap_or(0);
        let (system, category) = (entry.system, entry.category);
        let (title, detail) = (entry.title.as_str(), entry.detail.as_str());

        // tracing needs the level as a constant at each call site.
        match entry.severity {
            Severity::Error | Severity::Critical => {
                emit_entry!(tracing::Level::ERROR, system, category, corr, file, line, detail, title)
            }
            Severity::Warning => {
                emit_entry!(tracing::Level::WARN, system, category, corr, file, line, detail, title)
            }
            Severity::Information => {
                emit_entry!(tracing::Level::INFO, system, category, corr, file, line, detail, title)
            }
            Severity::Verbose => {
                emit_entry!(tracing::Level::DEBUG, system, category, corr, file, line, detail, title)
            }
        }
        Ok(())
    }
}

/// Metric sink that aggregates records into a [`Metrics`] collector.
#[derive(Debug, Clone, Copy)]
pub struct AggregatingMetricSink {
    metrics: &'static Metrics,
}

impl AggregatingMetricSink {
    /// Aggregate into the given collector.
    pub fn new(metrics: &'static Metrics) -> Self {
        Self { metrics }
    }

    /// Aggregate into [`GLOBAL_METRICS`].
    pub fn global() -> Self {
        Self::new(&GLOBAL_METRICS)
    }
}

impl Default for AggregatingMetricSink {
    fn default() -> Self {
        Self::global()
    }
}

impl MetricSink for AggregatingMetricSink {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError> {
        self.metrics.record_query(record);
        Ok(())
    }
}

/// Metric sink that writes one JSON object per line.
pub struct JsonLinesMetricSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesMetricSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> MetricSink for JsonLinesMetricSink<W> {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Fans each record out to several sinks. The first error is reported after
/// every sink has been offered the record.
#[derive(Default)]
pub struct FanoutMetricSink {
    sinks: Vec<Box<dyn MetricSink>>,
}

impl FanoutMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl MetricSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MetricSink for FanoutMetricSink {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
