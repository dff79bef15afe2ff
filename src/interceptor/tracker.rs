// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Correlation of start/finish notifications into metric records.
//!
//! [`MetricInterceptor`] keeps one [`MetricRecord`] per in-flight operation, keyed by
//! the command's [`OperationId`]. Both tracking entry points are failure boundaries:
//! internal errors and panics are logged on the `dbloupe::internal` target in debug
//! builds and otherwise discarded, so the database call itself is never affected.
//!
//! Ids derived from hashes may collide between concurrently active operations. A
//! colliding start replaces the earlier entry (last write wins), so one operation's
//! metric can be attributed to the other and the evicted one completes on the
//! degraded path. Commands built with [`Command::new`] carry sequence ids and do not
//! collide.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::InterceptorConfig;
use crate::error::InterceptError;
use crate::types::{Command, DbFailure, OperationId};

use super::caption::{render_parameters, shorten_query, Caption};
use super::message::{capture_call_stack, failure_body, failure_title, starting_body};
use super::record::MetricRecord;
use super::sink::{AggregatingMetricSink, LogEntry, LogSink, MetricSink, Severity, TracingLogSink};

/// Records performance and diagnostic information for database commands.
pub struct MetricInterceptor {
    config: InterceptorConfig,
    log_sink: Arc<dyn LogSink>,
    metric_sink: Arc<dyn MetricSink>,
    in_flight: Mutex<HashMap<OperationId, MetricRecord>>,
}

impl MetricInterceptor {
    /// Create an interceptor writing to `tracing` and the global metrics collector.
    pub fn new(config: InterceptorConfig) -> Self {
        Self::with_sinks(
            config,
            Arc::new(TracingLogSink),
            Arc::new(AggregatingMetricSink::global()),
        )
    }

    /// Create an interceptor with explicit sinks.
    pub fn with_sinks(
        config: InterceptorConfig,
        log_sink: Arc<dyn LogSink>,
        metric_sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            config,
            log_sink,
            metric_sink,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Number of operations started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.table().len()
    }

    /// Whether an operation is currently tracked.
    pub fn is_tracking(&self, id: OperationId) -> bool {
        self.table().contains_key(&id)
    }

    /// Begin tracking a command. Never fails and never panics.
    pub fn start_tracking(&self, command: &Command) {
        guarded("start_tracking", command.id, || self.try_start(command));
    }

    /// Finish tracking a command and emit its metric. Never fails and never panics.
    ///
    /// `count` is the row or record count when the operation produced one; `failure`
    /// is the error that terminated it.
    pub fn stop_tracking(&self, command: &Command, count: Option<i64>, failure: Option<&DbFailure>) {
        guarded("stop_tracking", command.id, || self.try_stop(command, count, failure));
    }

    fn try_start(&self, command: &Command) -> Result<(), InterceptError> {
        let caption = Caption::for_command(command);
        let parameters = render_parameters(&command.parameters)?;
        let call_stack = self.config.include_call_stack.then(capture_call_stack);
        let body = starting_body(command, &caption, call_stack.as_deref())?;

        let title = caption.title.clone();
        let record = MetricRecord::start(command, caption, parameters);
        let entry = LogEntry::new(self.config.query_severity, title, body)
            .correlation_id(record.id)
            .caller(command.caller);

        // The record is stored even when the log write fails.
        let logged = self.write_log(entry);

        if self.table().insert(command.id, record).is_some() {
            internal_debug("start_tracking", command.id, "replaced an in-flight record with the same id");
        }

        logged
    }

    fn try_stop(
        &self,
        command: &Command,
        count: Option<i64>,
        failure: Option<&DbFailure>,
    ) -> Result<(), InterceptError> {
        let mut record = self.table().remove(&command.id);
        let mut first_error: Option<InterceptError> = None;

        if let Some(record) = record.as_mut() {
            record.stop();
            if let Some(count) = count {
                record.set_count(count);
            }
        }

        let mut logged = false;
        if let Some(failure) = failure {
            if let Some(record) = record.as_mut() {
                record.set_failure(failure);
            }

            if self.config.log_exceptions {
                let shortened = match record.as_ref() {
                    Some(record) => record.query.clone(),
                    None => shorten_query(&command.text).0,
                };
                let parameters = record.as_ref().and_then(|r| r.parameters.as_deref());
                let result = failure_body(&command.text, &shortened, parameters, failure)
                    .map_err(InterceptError::from)
                    .and_then(|body| {
                        let mut entry = LogEntry::new(
                            self.config.exception_severity,
                            failure_title(failure, &shortened),
                            body,
                        )
                        .caller(command.caller);
                        if let Some(record) = record.as_ref() {
                            entry = entry.correlation_id(record.id);
                        }
                        self.write_log(entry)
                    });
                logged = true;
                if let Err(e) = result {
                    first_error.get_or_insert(e);
                }
            }
        }

        match record {
            Some(record) => {
                if let Err(e) = self.write_metric(record) {
                    first_error.get_or_insert(e);
                }
            }
            None if !logged => {
                let (shortened, _) = shorten_query(&command.text);
                let entry = LogEntry::new(
                    Severity::Verbose,
                    format!("Database call completed without tracking data: {}", shortened),
                    command.text.clone(),
                )
                .caller(command.caller);
                if let Err(e) = self.write_log(entry) {
                    first_error.get_or_insert(e);
                }
            }
            None => {}
        }

        first_error.map_or(Ok(()), Err)
    }

    fn write_log(&self, entry: LogEntry) -> Result<(), InterceptError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.log_sink.write(entry)))
            .map_err(InterceptError::from_panic)?
            .map_err(InterceptError::from)
    }

    fn write_metric(&self, record: MetricRecord) -> Result<(), InterceptError> {
        let sink = self.metric_sink.as_ref();
        panic::catch_unwind(AssertUnwindSafe(|| record.emit(sink)))
            .map_err(InterceptError::from_panic)?
            .map_err(InterceptError::from)
    }

    fn table(&self) -> MutexGuard<'_, HashMap<OperationId, MetricRecord>> {
        // No sink runs under this lock, so poisoning leaves the map consistent.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MetricInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricInterceptor")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Run a hook body, absorbing errors and panics.
fn guarded<F>(hook: &'static str, id: OperationId, body: F)
where
    F: FnOnce() -> Result<(), InterceptError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(InterceptError::from_panic(payload)));
    if let Err(err) = outcome {
        internal_debug(hook, id, &err.to_string());
    }
}

fn internal_debug(hook: &'static str, id: OperationId, message: &str) {
    if cfg!(debug_assertions) {
        tracing::debug!(
            target: "dbloupe::internal",
            hook,
            operation = %id,
            "Unable to record database event: {}",
            message
        );
    }
}
