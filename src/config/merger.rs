// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{AgentConfig, InterceptorConfig};
use crate::interceptor::Severity;

/// Explicit overrides (CLI flags, host application settings).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub enabled: Option<bool>,
    pub include_call_stack: Option<bool>,
    pub log_exceptions: Option<bool>,
    pub query_severity: Option<Severity>,
    pub exception_severity: Option<Severity>,
}

/// Default configuration values.
pub fn default_config() -> InterceptorConfig {
    InterceptorConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. Overrides
/// 2. Local config (.dbloupe.local.json)
/// 3. Workspace config (.dbloupe.json)
/// 4. Global config (~/.dbloupe/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<AgentConfig>,
    workspace: Option<AgentConfig>,
    local: Option<AgentConfig>,
    overrides: Overrides,
) -> InterceptorConfig {
    let mut result = default_config();

    for config in [global, workspace, local].iter().flatten() {
        apply_agent_config(&mut result, config);
    }

    apply_overrides(&mut result, &overrides);

    result
}

fn apply_agent_config(result: &mut InterceptorConfig, config: &AgentConfig) {
    if let Some(enabled) = config.enabled {
        result.enabled = enabled;
    }

    if let Some(call_stack) = config.log_call_stack {
        result.include_call_stack = call_stack;
    }

    if let Some(log_exceptions) = config.log_exceptions {
        result.log_exceptions = log_exceptions;
    }

    if let Some(severity) = config.query_message_severity {
        result.query_severity = severity;
    }

    if let Some(severity) = config.exception_severity {
        result.exception_severity = severity;
    }
}

fn apply_overrides(result: &mut InterceptorConfig, overrides: &Overrides) {
    if let Some(enabled) = overrides.enabled {
        result.enabled = enabled;
    }

    if let Some(call_stack) = overrides.include_call_stack {
        result.include_call_stack = call_stack;
    }

    if let Some(log_exceptions) = overrides.log_exceptions {
        result.log_exceptions = log_exceptions;
    }

    if let Some(severity) = overrides.query_severity {
        result.query_severity = severity;
    }

    if let Some(severity) = overrides.exception_severity {
        result.exception_severity = severity;
    }
}
