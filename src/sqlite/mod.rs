// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SQLite driver adapter.
//!
//! Wraps a `rusqlite::Connection` and raises the interception hooks around every
//! call, so the metric interceptor can observe real database traffic.

mod connection;
mod script;

pub use connection::{InstrumentedConnection, StatementOutcome};
pub use script::split_statements;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

use crate::types::{DbFailure, DbValue};

/// Provider name reported in connection metadata.
pub const PROVIDER: &str = "rusqlite";

impl ToSql for DbValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DbValue::Null => ToSqlOutput::Owned(Value::Null),
            DbValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            DbValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            DbValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            DbValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            DbValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for DbValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => DbValue::Null,
            ValueRef::Integer(v) => DbValue::Integer(v),
            ValueRef::Real(v) => DbValue::Real(v),
            ValueRef::Text(t) => DbValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => DbValue::Blob(b.to_vec()),
        })
    }
}

impl From<&rusqlite::Error> for DbFailure {
    fn from(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message) => {
                let message = message
                    .clone()
                    .unwrap_or_else(|| code.to_string());
                DbFailure::new("SqliteFailure", message).with_detail(format!(
                    "Error Code: {:?} (extended {})",
                    code.code, code.extended_code
                ))
            }
            rusqlite::Error::QueryReturnedNoRows => {
                DbFailure::new("QueryReturnedNoRows", err.to_string())
            }
            rusqlite::Error::ExecuteReturnedResults => {
                DbFailure::new("ExecuteReturnedResults", err.to_string())
            }
            rusqlite::Error::InvalidParameterName(_) | rusqlite::Error::InvalidParameterCount(..) => {
                DbFailure::new("InvalidParameter", err.to_string())
            }
            rusqlite::Error::SqlInputError { .. } => DbFailure::new("SqlInputError", err.to_string()),
            _ => DbFailure::new("SqliteError", err.to_string()),
        }
    }
}
