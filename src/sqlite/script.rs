// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Splitting SQL scripts into statements.

/// Split a script on `;` terminators.
///
/// Semicolons inside quoted strings, quoted identifiers, `--` line comments and
/// `/* */` block comments do not terminate a statement. Statements are trimmed;
/// empty ones and comment-only ones are dropped. `CREATE TRIGGER` bodies are not
/// understood and will be split at their inner semicolons.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                has_code = true;
                current.push(c);
                // doubled quote is an escaped quote and simply re-enters the loop
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                has_code = true;
                current.push(c);
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                current.push(c);
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                current.push(c);
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    current.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            }
            _ => {
                if !c.is_whitespace() {
                    has_code = true;
                }
                current.push(c);
            }
        }
    }

    if has_code {
        statements.push(current.trim().to_string());
    }
    statements
}
