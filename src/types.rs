// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core type definitions for the driver-facing data model.
//!
//! A driver describes each database operation with a [`Command`]. The command is the
//! carrier passed to both the "executing" and "executed" hooks, and its [`OperationId`]
//! is the only key used to correlate the two.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum characters of a text parameter value shown in diagnostics.
pub const MAX_VALUE_CHARS: usize = 1024;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one in-flight operation.
///
/// Stable between the executing and executed hook of one operation. Ids minted by
/// [`OperationId::next`] are unique for the life of the process; ids derived with
/// [`OperationId::of`] are hashes and two concurrent operations may share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl OperationId {
    /// Mint a new id from the process-wide sequence.
    pub fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Derive an id by hashing a driver object.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// How the command text is interpreted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Ad-hoc SQL text.
    #[default]
    Text,
    /// Named stored procedure.
    StoredProcedure,
    /// Direct table access by name.
    TableDirect,
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
}

impl fmt::Display for DbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("(null)"),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Blob(bytes) => write!(f, "({} bytes)", bytes.len()),
            Self::Text(s) => match s.char_indices().nth(MAX_VALUE_CHARS) {
                Some((cut, _)) => write!(f, "{}(...)", &s[..cut]),
                None => f.write_str(s),
            },
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// A named parameter bound to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: DbValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Transaction isolation level reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "Unspecified",
            Self::ReadUncommitted => "ReadUncommitted",
            Self::ReadCommitted => "ReadCommitted",
            Self::RepeatableRead => "RepeatableRead",
            Self::Serializable => "Serializable",
            Self::Snapshot => "Snapshot",
        };
        f.write_str(name)
    }
}

/// Transaction metadata attached to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Opaque transaction id (typically a hash of the driver's transaction object).
    pub id: u64,
    pub isolation_level: IsolationLevel,
}

/// Connection metadata attached to a command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub data_source: String,
    pub provider: String,
    pub server_version: Option<String>,
    pub timeout: Duration,
}

/// The failure that terminated a database operation, as observed by the hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbFailure {
    /// Kind of failure, e.g. `SqlTimeoutException` or `SqliteFailure`.
    pub kind: String,
    pub message: String,
    /// Additional driver detail (error codes, inner errors).
    pub detail: Option<String>,
}

impl DbFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for DbFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, "\n{}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for DbFailure {}

/// One database operation as described by the driver.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: OperationId,
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<Parameter>,
    pub transaction: Option<TransactionInfo>,
    pub connection: Option<ConnectionInfo>,
    /// Application call site that issued the command.
    pub caller: Option<&'static Location<'static>>,
}

impl Command {
    /// Create a command with a freshly minted identity.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(OperationId::next(), text)
    }

    /// Create a command with a driver-supplied identity.
    pub fn with_id(id: OperationId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            kind: CommandKind::Text,
            parameters: Vec::new(),
            transaction: None,
            connection: None,
            caller: None,
        }
    }

    /// Shorthand for a stored procedure command.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(name).kind(CommandKind::StoredProcedure)
    }

    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<DbValue>) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    pub fn parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn transaction(mut self, transaction: TransactionInfo) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn connection(mut self, connection: ConnectionInfo) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn caller(mut self, caller: &'static Location<'static>) -> Self {
        self.caller = Some(caller);
        self
    }
}
