// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

#![cfg(feature = "sqlite")]

//! The metric interceptor observing a real SQLite connection.

use std::sync::{Arc, Mutex};

use dbloupe::config::InterceptorConfig;
use dbloupe::interceptor::{LogEntry, LogSink, MetricInterceptor, MetricRecord, MetricSink, Severity};
use dbloupe::sqlite::InstrumentedConnection;
use dbloupe::{DbValue, SinkError};
use tempfile::TempDir;

#[derive(Default)]
struct CaptureLog(Mutex<Vec<LogEntry>>);

impl LogSink for CaptureLog {
    fn write(&self, entry: LogEntry) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
struct CaptureMetrics(Mutex<Vec<MetricRecord>>);

impl MetricSink for CaptureMetrics {
    fn record(&self, record: &MetricRecord) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

struct Harness {
    conn: InstrumentedConnection,
    log: Arc<CaptureLog>,
    metrics: Arc<CaptureMetrics>,
}

impl Harness {
    fn new(config: InterceptorConfig) -> Self {
        let log = Arc::new(CaptureLog::default());
        let metrics = Arc::new(CaptureMetrics::default());
        let interceptor = MetricInterceptor::with_sinks(config, log.clone(), metrics.clone());
        let conn = InstrumentedConnection::open_in_memory()
            .unwrap()
            .with_interceptor(Arc::new(interceptor));
        Self { conn, log, metrics }
    }

    fn entries(&self) -> Vec<LogEntry> {
        self.log.0.lock().unwrap().clone()
    }

    fn records(&self) -> Vec<MetricRecord> {
        self.metrics.0.lock().unwrap().clone()
    }
}

#[test]
fn test_statements_produce_metrics() {
    let h = Harness::new(InterceptorConfig::default());
    h.conn
        .run_script(
            "CREATE TABLE Customers (Id INTEGER PRIMARY KEY, Name TEXT);
             INSERT INTO Customers (Name) VALUES ('Acme'), ('Globex');
             SELECT * FROM Customers;",
        )
        .unwrap();

    let records = h.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].result, "2");
    assert_eq!(records[1].rows, Some(2));
    // readers report no count
    assert_eq!(records[2].result, "Success");
    assert_eq!(records[2].query, "SELECT * FROM Customers");
}

#[test]
fn test_starting_entry_describes_connection() {
    let h = Harness::new(InterceptorConfig::default());
    h.conn
        .query_scalar("SELECT ?1", &[DbValue::from("x")])
        .unwrap();

    let entry = &h.entries()[0];
    assert_eq!(entry.title, "Executing Sql: 'SELECT ?1'");
    assert!(entry.detail.contains("Parameters:\n    ?1: x\n"));
    assert!(entry.detail.contains("Server:\n    DataSource: :memory:\n"));
    assert!(entry.detail.contains("    Command Timeout: 5 Seconds\n"));
    assert!(entry.detail.contains("    Provider: rusqlite\n"));
    assert!(entry
        .detail
        .contains(&format!("    Server Version: {}\n", rusqlite::version())));
    assert!(!entry.detail.contains("Transaction:"));
    assert_eq!(entry.caller.unwrap().file(), file!());
}

#[test]
fn test_transaction_section_inside_transaction() {
    let h = Harness::new(InterceptorConfig::default());
    h.conn.execute("CREATE TABLE t (x INTEGER)", &[]).unwrap();
    h.conn.begin().unwrap();
    h.conn.execute("INSERT INTO t VALUES (1)", &[]).unwrap();
    h.conn.rollback().unwrap();

    let insert = h
        .entries()
        .into_iter()
        .find(|e| e.title == "Executing Sql: 'INSERT INTO t VALUES (1)'")
        .unwrap();
    assert!(insert
        .detail
        .contains("Transaction:\n    Id: 1\n    Isolation Level: Serializable\n"));
}

#[test]
fn test_failed_statement_logs_warning_and_returns_error() {
    let h = Harness::new(InterceptorConfig::default());
    let result = h.conn.execute("DELETE FROM Missing WHERE Id = ?1", &[DbValue::Integer(4)]);

    assert!(result.is_err());
    let records = h.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(records[0].result.contains("no such table"));

    let entries = h.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].severity, Severity::Warning);
    assert!(entries[1]
        .title
        .starts_with("Database Call failed due to "));
    assert!(entries[1].title.ends_with(": DELETE FROM Missing WHERE Id = ?1"));
    assert!(entries[1].detail.contains("Parameters: ?1='4'"));
}

#[test]
fn test_call_stack_included_when_enabled() {
    let h = Harness::new(InterceptorConfig {
        include_call_stack: true,
        ..InterceptorConfig::default()
    });
    h.conn.execute("CREATE TABLE t (x INTEGER)", &[]).unwrap();

    let entry = &h.entries()[0];
    assert!(entry.detail.contains("Call Stack:\n"));
}

#[test]
fn test_file_database_reports_its_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    let conn = InstrumentedConnection::open(&path).unwrap();

    assert_eq!(conn.info().data_source, path.display().to_string());
    assert_eq!(conn.info().provider, "rusqlite");
}
