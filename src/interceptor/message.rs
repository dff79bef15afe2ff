// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Diagnostic message bodies for the starting and failure log entries.

use std::backtrace::Backtrace;
use std::fmt::Write;

use crate::types::{Command, DbFailure};

use super::caption::Caption;

/// Frames belonging to this crate, the std backtrace machinery, or the unwinding
/// runtime are dropped from captured call stacks.
const INTERNAL_FRAME_PREFIXES: &[&str] = &[
    "dbloupe::interceptor::",
    "dbloupe::sqlite::",
    "std::backtrace",
    "std::panicking",
    "std::panic::",
    "core::panic",
    "core::ops::function",
];

/// Build the detail body of the "starting" entry.
///
/// Sections appear in a fixed order and each is followed by a blank line:
/// full query (only when the caption was truncated), parameters, transaction,
/// server, and call stack.
pub fn starting_body(
    command: &Command,
    caption: &Caption,
    call_stack: Option<&str>,
) -> Result<String, std::fmt::Error> {
    let mut body = String::with_capacity(1024);

    if caption.truncated {
        write!(body, "Full Query:\n\n{}\n\n", command.text)?;
    }

    if !command.parameters.is_empty() {
        body.push_str("Parameters:\n");
        for parameter in &command.parameters {
            writeln!(body, "    {}: {}", parameter.name, parameter.value)?;
        }
        body.push('\n');
    }

    if let Some(ref transaction) = command.transaction {
        write!(
            body,
            "Transaction:\n    Id: {:X}\n    Isolation Level: {}\n\n",
            transaction.id, transaction.isolation_level
        )?;
    }

    if let Some(ref connection) = command.connection {
        write!(
            body,
            "Server:\n    DataSource: {}\n    Command Timeout: {} Seconds\n    Provider: {}\n    Server Version: {}\n\n",
            connection.data_source,
            connection.timeout.as_secs(),
            connection.provider,
            connection.server_version.as_deref().unwrap_or("(unknown)"),
        )?;
    }

    if let Some(stack) = call_stack {
        write!(body, "Call Stack:\n{}\n\n", stack)?;
    }

    Ok(body)
}

/// Title of the failure entry.
pub fn failure_title(failure: &DbFailure, shortened: &str) -> String {
    format!("Database Call failed due to {}: {}", failure.kind, shortened)
}

/// Detail body of the failure entry.
///
/// The full command text is included whenever the title carried a different
/// (flattened or truncated) form, so nothing is lost.
pub fn failure_body(
    command_text: &str,
    shortened: &str,
    parameters: Option<&str>,
    failure: &DbFailure,
) -> Result<String, std::fmt::Error> {
    let mut body = String::new();
    if shortened != command_text {
        write!(body, "Full Query:\n\n{}\n\n", command_text)?;
    }
    write!(
        body,
        "Parameters: {}\n\nException: {}",
        parameters.unwrap_or("(none)"),
        failure.message
    )?;
    Ok(body)
}

/// Capture the current call stack, excluding this crate's own interception frames.
pub fn capture_call_stack() -> String {
    let rendered = Backtrace::force_capture().to_string();
    let mut kept = String::with_capacity(rendered.len());
    let mut skipping = false;

    for line in rendered.lines() {
        let trimmed = line.trim_start();
        // Frame lines look like "12: path::to::fn"; location lines start with "at ".
        let is_location = trimmed.starts_with("at ");
        if !is_location {
            let symbol = trimmed
                .split_once(": ")
                .map(|(_, symbol)| symbol)
                .unwrap_or(trimmed);
            skipping = INTERNAL_FRAME_PREFIXES
                .iter()
                .any(|prefix| symbol.starts_with(prefix));
        }
        if !skipping {
            kept.push_str(line);
            kept.push('\n');
        }
    }

    let kept = kept.trim_end();
    if kept.is_empty() {
        "(unavailable)".to_string()
    } else {
        kept.to_string()
    }
}
