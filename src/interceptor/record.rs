// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-operation metric record.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::SinkError;
use crate::telemetry::CorrelationId;
use crate::types::{Command, DbFailure, OperationId};

use super::caption::Caption;
use super::sink::MetricSink;

/// Result value of a record that completed without a failure or count.
pub const SUCCESS: &str = "Success";

/// Timing and outcome of one database operation.
///
/// Created when the operation starts, stopped when it finishes, and emitted to a
/// [`MetricSink`] exactly once. A record is retired after [`MetricRecord::emit`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricRecord {
    pub id: CorrelationId,
    pub operation: OperationId,
    /// Shortened query or procedure name.
    pub query: String,
    pub caption: String,
    #[serde(skip)]
    pub raw_text: String,
    pub parameters: Option<String>,
    pub rows: Option<i64>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    duration: Option<Duration>,
    /// `Success`, a row count, or the stringified failure.
    pub result: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
    #[serde(skip)]
    running: bool,
    #[serde(skip)]
    failed: bool,
}

fn serialize_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_f64(d.as_secs_f64() * 1000.0),
        None => serializer.serialize_none(),
    }
}

impl MetricRecord {
    /// Start timing an operation.
    pub fn start(command: &Command, caption: Caption, parameters: Option<String>) -> Self {
        Self {
            id: CorrelationId::new(),
            operation: command.id,
            query: caption.shortened,
            caption: caption.title,
            raw_text: command.text.clone(),
            parameters,
            rows: None,
            duration: None,
            result: SUCCESS.to_string(),
            recorded_at: Utc::now(),
            started: Instant::now(),
            running: true,
            failed: false,
        }
    }

    /// Freeze the duration. Only the first call has an effect.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        // saturating: never negative even if the clock misbehaves
        self.duration = Some(Instant::now().saturating_duration_since(self.started));
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Duration, once stopped.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Record a row or record count as the result.
    pub fn set_count(&mut self, count: i64) {
        self.rows = Some(count);
        self.result = count.to_string();
    }

    /// Record a failure as the result.
    pub fn set_failure(&mut self, failure: &DbFailure) {
        self.result = failure.to_string();
        self.failed = true;
    }

    pub fn is_success(&self) -> bool {
        !self.failed
    }

    /// Stop the timer and hand the record to the sink as a single write.
    pub fn emit(mut self, sink: &dyn MetricSink) -> Result<(), SinkError> {
        self.stop();
        sink.record(&self)
    }
}
