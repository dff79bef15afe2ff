// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end behavior of the metric interceptor through its public hooks.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use dbloupe::config::InterceptorConfig;
use dbloupe::interceptor::{
    CommandInterceptor, LogEntry, LogSink, MetricInterceptor, MetricRecord, MetricSink, Severity,
    MAX_CAPTION_CHARS, SUCCESS, TRUNCATION_MARKER,
};
use dbloupe::types::{Command, CommandKind, DbFailure, OperationId};
use dbloupe::SinkError;

#[derive(Default)]
struct CaptureLog(Mutex<Vec<LogEntry>>);

impl CaptureLog {
    fn entries(&self) -> Vec<LogEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl LogSink for CaptureLog {
    fn write(&self, entry: LogEntry) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
struct CaptureMetrics(Mutex<Vec<MetricRecord>>);

impl CaptureMetrics {
    fn records(&self) -> Vec<MetricRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl MetricSink for CaptureMetrics {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct PanickingLog;

impl LogSink for PanickingLog {
    fn write(&self, _: LogEntry) -> Result<(), SinkError> {
        panic!("log sink exploded");
    }
}

struct FailingMetrics;

impl MetricSink for FailingMetrics {
    fn record(&self, _: &MetricRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("metrics backend down".to_string()))
    }
}

fn interceptor_with(
    config: InterceptorConfig,
) -> (MetricInterceptor, Arc<CaptureLog>, Arc<CaptureMetrics>) {
    let log = Arc::new(CaptureLog::default());
    let metrics = Arc::new(CaptureMetrics::default());
    let interceptor = MetricInterceptor::with_sinks(config, log.clone(), metrics.clone());
    (interceptor, log, metrics)
}

#[test]
fn test_adhoc_query_emits_one_metric_with_count() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let command = Command::with_id(OperationId(1), "SELECT * FROM Customers");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, Some(91), None);

    let records = metrics.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].caption, "Executing Sql: 'SELECT * FROM Customers'");
    assert_eq!(records[0].result, "91");
    assert!(records[0].duration().is_some());
    assert_eq!(interceptor.in_flight(), 0);

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Verbose);
    assert_eq!(entries[0].title, "Executing Sql: 'SELECT * FROM Customers'");
    assert_eq!(entries[0].correlation_id, Some(records[0].id));
}

#[test]
fn test_failed_procedure_emits_metric_and_warning() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let command = Command::with_id(OperationId(2), "usp_AddCustomer")
        .kind(CommandKind::StoredProcedure)
        .param("@Name", "Acme");
    let failure = DbFailure::new("SqlTimeoutException", "Timeout expired");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, Some(&failure));

    let records = metrics.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result, failure.to_string());
    assert_eq!(records[0].caption, "Executing Procedure 'usp_AddCustomer'");
    assert!(!records[0].is_success());

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].detail.contains("Parameters:\n    @Name: Acme\n"));

    let warning = &entries[1];
    assert_eq!(warning.severity, Severity::Warning);
    assert!(warning.title.contains("SqlTimeoutException"));
    assert!(warning.title.contains("usp_AddCustomer"));
    assert!(warning.detail.contains("@Name='Acme'"));
    assert!(warning.detail.ends_with("Exception: Timeout expired"));
    assert_eq!(warning.correlation_id, Some(records[0].id));
}

#[test]
fn test_concurrent_operations_resolve_to_their_own_records() {
    let (interceptor, _log, metrics) = interceptor_with(InterceptorConfig::default());
    let interceptor = Arc::new(interceptor);
    let barrier = Arc::new(Barrier::new(2));

    let spawn = |id: u64, text: &'static str, count: i64, stop_first: bool| {
        let interceptor = interceptor.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            let command = Command::with_id(OperationId(id), text);
            interceptor.start_tracking(&command);
            barrier.wait();
            // the other thread finishes first when this one is asked to wait
            if !stop_first {
                barrier.wait();
            }
            interceptor.stop_tracking(&command, Some(count), None);
            if stop_first {
                barrier.wait();
            }
        })
    };

    let a = spawn(3, "SELECT * FROM Orders", 7, false);
    let b = spawn(4, "SELECT * FROM Invoices", 11, true);
    a.join().unwrap();
    b.join().unwrap();

    let records = metrics.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].query, "SELECT * FROM Invoices");
    assert_eq!(records[0].result, "11");
    assert_eq!(records[1].query, "SELECT * FROM Orders");
    assert_eq!(records[1].result, "7");
    assert_ne!(records[0].id, records[1].id);
    assert_eq!(interceptor.in_flight(), 0);
}

#[test]
fn test_many_threads_never_cross_contaminate() {
    let (interceptor, _log, metrics) = interceptor_with(InterceptorConfig::default());
    let interceptor = Arc::new(interceptor);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let interceptor = interceptor.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    let command = Command::new(format!("SELECT {} FROM t{}", i, t));
                    interceptor.start_tracking(&command);
                    interceptor.stop_tracking(&command, Some(i), None);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = metrics.records();
    assert_eq!(records.len(), 400);
    for record in records {
        let i: i64 = record.query.split(' ').nth(1).unwrap().parse().unwrap();
        assert_eq!(record.result, i.to_string());
    }
}

#[test]
fn test_finish_without_start_logs_degraded_entry() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let command = Command::new("UPDATE t SET x = 1");

    interceptor.stop_tracking(&command, Some(3), None);

    assert!(metrics.records().is_empty());
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].title,
        "Database call completed without tracking data: UPDATE t SET x = 1"
    );
}

#[test]
fn test_failure_without_start_writes_only_the_failure_entry() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let text = format!("DELETE FROM Audit WHERE Id IN ({})", "1, ".repeat(400_000));
    let command = Command::new(text.clone());
    let failure = DbFailure::new("SqliteFailure", "database is locked");

    interceptor.stop_tracking(&command, None, Some(&failure));

    assert!(metrics.records().is_empty());
    let entries = log.entries();
    // no degraded entry next to the failure entry
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.severity, Severity::Warning);
    assert!(entry
        .title
        .starts_with("Database Call failed due to SqliteFailure: DELETE FROM Audit WHERE Id IN (1, 1,"));
    assert!(entry.title.ends_with(TRUNCATION_MARKER));
    assert!(entry.title.len() < MAX_CAPTION_CHARS * 2);
    assert!(entry.detail.starts_with("Full Query:\n\n"));
    assert!(entry.detail.contains(&text));
    assert!(entry.detail.ends_with("Exception: database is locked"));
    assert!(entry.correlation_id.is_none());
}

#[test]
fn test_failure_just_over_the_cap_keeps_full_text() {
    let (interceptor, log, _metrics) = interceptor_with(InterceptorConfig::default());
    let text = "y".repeat(MAX_CAPTION_CHARS + 1);
    let command = Command::new(text.clone());
    let failure = DbFailure::new("SqliteFailure", "disk I/O error");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, Some(&failure));

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[1].title.ends_with(TRUNCATION_MARKER));
    assert!(entries[1]
        .detail
        .starts_with(&format!("Full Query:\n\n{}\n\n", text)));
}

#[test]
fn test_finish_twice_emits_once() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let command = Command::new("SELECT 1");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, None);
    interceptor.stop_tracking(&command, None, None);

    assert_eq!(metrics.records().len(), 1);
    assert_eq!(metrics.records()[0].result, SUCCESS);
    // starting entry plus one degraded entry for the second finish
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn test_long_query_is_truncated_with_full_text_in_body() {
    let (interceptor, log, metrics) = interceptor_with(InterceptorConfig::default());
    let text = format!("SELECT {} FROM Wide", "col, ".repeat(200));
    let command = Command::new(text.clone());

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, None);

    let record = &metrics.records()[0];
    assert!(record.query.ends_with(TRUNCATION_MARKER));
    assert_eq!(
        record.query.chars().count(),
        MAX_CAPTION_CHARS + TRUNCATION_MARKER.chars().count()
    );

    let entry = &log.entries()[0];
    assert!(entry.detail.starts_with("Full Query:\n\n"));
    assert!(entry.detail.contains(&text));
}

#[test]
fn test_multiline_query_is_flattened() {
    let (interceptor, _log, metrics) = interceptor_with(InterceptorConfig::default());
    let command = Command::new("SELECT *\r\n  FROM Customers\n  WHERE Id = 1");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, None);

    assert_eq!(
        metrics.records()[0].query,
        "SELECT * FROM Customers WHERE Id = 1"
    );
}

#[test]
fn test_panicking_log_sink_never_reaches_caller() {
    let metrics = Arc::new(CaptureMetrics::default());
    let interceptor = MetricInterceptor::with_sinks(
        InterceptorConfig::default(),
        Arc::new(PanickingLog),
        metrics.clone(),
    );
    let command = Command::new("SELECT 1");
    let failure = DbFailure::new("SqliteFailure", "disk I/O error");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, Some(&failure));

    // the record survives the failed starting entry and is still emitted
    assert_eq!(metrics.records().len(), 1);
    assert_eq!(interceptor.in_flight(), 0);
}

#[test]
fn test_failing_metric_sink_is_absorbed() {
    let log = Arc::new(CaptureLog::default());
    let interceptor = MetricInterceptor::with_sinks(
        InterceptorConfig::default(),
        log.clone(),
        Arc::new(FailingMetrics),
    );
    let command = Command::new("SELECT 1");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, Some(1), None);

    assert_eq!(interceptor.in_flight(), 0);
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn test_exception_logging_can_be_disabled() {
    let config = InterceptorConfig {
        log_exceptions: false,
        ..InterceptorConfig::default()
    };
    let (interceptor, log, metrics) = interceptor_with(config);
    let command = Command::new("DELETE FROM Orders");
    let failure = DbFailure::new("SqliteFailure", "database is locked");

    interceptor.start_tracking(&command);
    interceptor.stop_tracking(&command, None, Some(&failure));

    assert_eq!(log.entries().len(), 1);
    assert_eq!(metrics.records()[0].result, failure.to_string());
}

#[test]
fn test_configured_severities_are_used() {
    let config = InterceptorConfig {
        query_severity: Severity::Information,
        exception_severity: Severity::Error,
        ..InterceptorConfig::default()
    };
    let (interceptor, log, _metrics) = interceptor_with(config);
    let command = Command::new("SELECT 1");

    interceptor.non_query_executing(&command);
    interceptor.non_query_executed(&command, Err(&DbFailure::new("SqliteFailure", "boom")));

    let severities: Vec<Severity> = log.entries().iter().map(|e| e.severity).collect();
    assert_eq!(severities, vec![Severity::Information, Severity::Error]);
}
