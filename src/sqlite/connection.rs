// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A `rusqlite::Connection` that raises interception hooks around each call.

use std::panic::{self, AssertUnwindSafe, Location};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params_from_iter, Connection, Row, ToSql};

use crate::interceptor::{self, CommandInterceptor};
use crate::types::{
    Command, ConnectionInfo, DbFailure, DbValue, IsolationLevel, Parameter, TransactionInfo,
};

use super::script::split_statements;
use super::PROVIDER;

/// rusqlite's busy timeout on a fresh connection.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Instrumented SQLite connection.
///
/// Every `execute`, `query_map` and `query_scalar` call is reported to the
/// interceptors: the process-wide chain by default, or an explicit list set with
/// [`InstrumentedConnection::with_interceptor`]. The caller's source location is
/// recorded on each command.
pub struct InstrumentedConnection {
    conn: Connection,
    info: ConnectionInfo,
    interceptors: Option<Vec<Arc<dyn CommandInterceptor>>>,
    transactions: AtomicU64,
    current_transaction: AtomicU64,
}

impl InstrumentedConnection {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn, path.display().to_string()))
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?, ":memory:"))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection, data_source: impl Into<String>) -> Self {
        Self {
            conn,
            info: ConnectionInfo {
                data_source: data_source.into(),
                provider: PROVIDER.to_string(),
                server_version: Some(rusqlite::version().to_string()),
                timeout: DEFAULT_BUSY_TIMEOUT,
            },
            interceptors: None,
            transactions: AtomicU64::new(0),
            current_transaction: AtomicU64::new(0),
        }
    }

    /// Report to this interceptor instead of the process-wide chain.
    ///
    /// May be called repeatedly; interceptors run in the order added.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn CommandInterceptor>) -> Self {
        self.interceptors.get_or_insert_with(Vec::new).push(interceptor);
        self
    }

    pub fn set_busy_timeout(&mut self, timeout: Duration) -> rusqlite::Result<()> {
        self.conn.busy_timeout(timeout)?;
        self.info.timeout = timeout;
        Ok(())
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// The wrapped connection. Calls made through it are not intercepted.
    pub fn inner(&self) -> &Connection {
        &self.conn
    }

    /// Execute a statement with positional parameters; returns the affected row count.
    #[track_caller]
    pub fn execute(&self, sql: &str, params: &[DbValue]) -> rusqlite::Result<usize> {
        let command = self.command(sql, positional(params), Location::caller());
        let hooks = self.hooks();

        dispatch(&hooks, |hook| hook.non_query_executing(&command));
        let result = self
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())));
        match &result {
            Ok(count) => dispatch(&hooks, |hook| hook.non_query_executed(&command, Ok(*count))),
            Err(err) => {
                let failure = DbFailure::from(err);
                dispatch(&hooks, |hook| hook.non_query_executed(&command, Err(&failure)));
            }
        }
        result
    }

    /// Execute a statement with named parameters (`:name`, `@name` or `$name`).
    #[track_caller]
    pub fn execute_named(&self, sql: &str, params: &[(&str, DbValue)]) -> rusqlite::Result<usize> {
        let parameters = params
            .iter()
            .map(|(name, value)| Parameter::new(*name, value.clone()))
            .collect();
        let command = self.command(sql, parameters, Location::caller());
        let hooks = self.hooks();

        let bound: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .map(|(name, value)| (*name, value as &dyn ToSql))
            .collect();

        dispatch(&hooks, |hook| hook.non_query_executing(&command));
        let result = self
            .conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(bound.as_slice()));
        match &result {
            Ok(count) => dispatch(&hooks, |hook| hook.non_query_executed(&command, Ok(*count))),
            Err(err) => {
                let failure = DbFailure::from(err);
                dispatch(&hooks, |hook| hook.non_query_executed(&command, Err(&failure)));
            }
        }
        result
    }

    /// Run a query and map every row.
    #[track_caller]
    pub fn query_map<T, F>(&self, sql: &str, params: &[DbValue], f: F) -> rusqlite::Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let command = self.command(sql, positional(params), Location::caller());
        let hooks = self.hooks();

        dispatch(&hooks, |hook| hook.reader_executing(&command));
        let result = self.read_rows(sql, params, f);
        match &result {
            Ok(_) => dispatch(&hooks, |hook| hook.reader_executed(&command, Ok(()))),
            Err(err) => {
                let failure = DbFailure::from(err);
                dispatch(&hooks, |hook| hook.reader_executed(&command, Err(&failure)));
            }
        }
        result
    }

    /// Run a query returning the first column of the first row.
    #[track_caller]
    pub fn query_scalar(&self, sql: &str, params: &[DbValue]) -> rusqlite::Result<DbValue> {
        let command = self.command(sql, positional(params), Location::caller());
        let hooks = self.hooks();

        dispatch(&hooks, |hook| hook.scalar_executing(&command));
        let result = self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get::<_, DbValue>(0));
        match &result {
            Ok(value) => dispatch(&hooks, |hook| hook.scalar_executed(&command, Ok(value))),
            Err(err) => {
                let failure = DbFailure::from(err);
                dispatch(&hooks, |hook| hook.scalar_executed(&command, Err(&failure)));
            }
        }
        result
    }

    /// Run each statement of a script in order, stopping at the first failure.
    ///
    /// Statements that produce columns run as readers, the rest as non-queries.
    /// Returns one outcome per statement that ran. Statements are prepared through
    /// the connection's statement cache, so the column check and the intercepted
    /// call share one compiled statement.
    #[track_caller]
    pub fn run_script(&self, script: &str) -> rusqlite::Result<Vec<StatementOutcome>> {
        let mut outcomes = Vec::new();
        for statement in split_statements(script) {
            let returns_rows = self
                .conn
                .prepare_cached(&statement)
                .map(|stmt| stmt.column_count() > 0)
                .unwrap_or(false);

            let outcome = if returns_rows {
                let rows = self.query_map(&statement, &[], |_| Ok(()))?;
                StatementOutcome::Rows(rows.len())
            } else {
                StatementOutcome::Affected(self.execute(&statement, &[])?)
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Start a deferred transaction. Subsequent commands carry its id.
    #[track_caller]
    pub fn begin(&self) -> rusqlite::Result<()> {
        let id = self.transactions.fetch_add(1, Ordering::Relaxed) + 1;
        self.current_transaction.store(id, Ordering::Relaxed);
        self.execute("BEGIN", &[]).map(|_| ())
    }

    #[track_caller]
    pub fn commit(&self) -> rusqlite::Result<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    #[track_caller]
    pub fn rollback(&self) -> rusqlite::Result<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }

    fn read_rows<T, F>(&self, sql: &str, params: &[DbValue], f: F) -> rusqlite::Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), f)?;
        rows.collect()
    }

    fn command(
        &self,
        sql: &str,
        parameters: Vec<Parameter>,
        caller: &'static Location<'static>,
    ) -> Command {
        let mut command = Command::new(sql)
            .parameters(parameters)
            .connection(self.info.clone())
            .caller(caller);
        if !self.conn.is_autocommit() {
            // SQLite transactions are serializable
            command = command.transaction(TransactionInfo {
                id: self.current_transaction.load(Ordering::Relaxed),
                isolation_level: IsolationLevel::Serializable,
            });
        }
        command
    }

    fn hooks(&self) -> Vec<Arc<dyn CommandInterceptor>> {
        match &self.interceptors {
            Some(list) => list.clone(),
            None => interceptor::interceptors(),
        }
    }
}

impl std::fmt::Debug for InstrumentedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedConnection")
            .field("info", &self.info)
            .field(
                "interceptors",
                &self.interceptors.as_ref().map(|list| list.len()),
            )
            .finish_non_exhaustive()
    }
}

/// Result of one statement run by [`InstrumentedConnection::run_script`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome {
    /// Rows changed by a non-query.
    Affected(usize),
    /// Rows returned by a reader.
    Rows(usize),
}

fn positional(params: &[DbValue]) -> Vec<Parameter> {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| Parameter::new(format!("?{}", i + 1), value.clone()))
        .collect()
}

/// Hooks run in order; a panicking hook is skipped so the database call still completes.
fn dispatch(hooks: &[Arc<dyn CommandInterceptor>], f: impl Fn(&dyn CommandInterceptor)) {
    for hook in hooks {
        if panic::catch_unwind(AssertUnwindSafe(|| f(hook.as_ref()))).is_err() {
            tracing::debug!(target: "dbloupe::internal", "Interceptor hook panicked");
        }
    }
}
