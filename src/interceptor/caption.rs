// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caption and parameter rendering.
//!
//! Turns arbitrary command text into a bounded single-line summary for log titles.

use std::fmt::Write;

use crate::types::{Command, CommandKind, Parameter};

/// Maximum characters kept in a shortened query.
pub const MAX_CAPTION_CHARS: usize = 512;

/// Marker appended to a truncated query.
pub const TRUNCATION_MARKER: &str = "(...)";

/// The shortened and captioned forms of a command's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    /// One-line form of the text; the metric's query name.
    pub shortened: String,
    /// Log title, e.g. `Executing Sql: 'SELECT 1'`.
    pub title: String,
    /// True when `shortened` dropped part of the text.
    pub truncated: bool,
}

impl Caption {
    /// Build the caption for a command.
    pub fn for_command(command: &Command) -> Self {
        match command.kind {
            CommandKind::StoredProcedure => Self {
                shortened: command.text.clone(),
                title: format!("Executing Procedure '{}'", command.text),
                truncated: false,
            },
            CommandKind::Text | CommandKind::TableDirect => {
                let (shortened, truncated) = shorten_query(&command.text);
                Self {
                    title: format!("Executing Sql: '{}'", shortened),
                    shortened,
                    truncated,
                }
            }
        }
    }
}

/// Collapse a multi-line query into one line, bounded to [`MAX_CAPTION_CHARS`].
///
/// Returns the shortened text and whether it was truncated.
pub fn shorten_query(text: &str) -> (String, bool) {
    let mut joined = String::with_capacity(text.len().min(MAX_CAPTION_CHARS * 2));
    for line in text.split(['\r', '\n']) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(line);

        // Stop collecting once the cap is safely exceeded; megabyte scripts stay cheap.
        if joined.len() > MAX_CAPTION_CHARS * 4 {
            break;
        }
    }

    match joined.char_indices().nth(MAX_CAPTION_CHARS) {
        Some((cut, _)) => {
            joined.truncate(cut);
            joined.push_str(TRUNCATION_MARKER);
            (joined, true)
        }
        None => (joined, false),
    }
}

/// Render parameters as `name='value'` pairs joined by `, `.
///
/// Returns `None` when there are no parameters.
pub fn render_parameters(parameters: &[Parameter]) -> Result<Option<String>, std::fmt::Error> {
    if parameters.is_empty() {
        return Ok(None);
    }

    let mut rendered = String::new();
    for (i, parameter) in parameters.iter().enumerate() {
        if i > 0 {
            rendered.push_str(", ");
        }
        write!(rendered, "{}='{}'", parameter.name, parameter.value)?;
    }
    Ok(Some(rendered))
}
