// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of agent and resolved interceptor configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};

use crate::interceptor::Severity;

/// Agent configuration as written in a config file.
/// Can be defined in .dbloupe.json or .dbloupe/config.json in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Whether any instrumentation is installed. Individual options are
    /// ignored when this is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Record the call stack that issued each command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_call_stack: Option<bool>,

    /// Write a log entry when a command fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_exceptions: Option<bool>,

    /// Severity of the per-command "starting" entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_message_severity: Option<Severity>,

    /// Severity of the entry written when a command fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_severity: Option<Severity>,
}

/// Resolved configuration read by the interceptor on every hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorConfig {
    pub enabled: bool,
    pub include_call_stack: bool,
    pub log_exceptions: bool,
    pub query_severity: Severity,
    pub exception_severity: Severity,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_call_stack: false,
            log_exceptions: true,
            query_severity: Severity::Verbose,
            exception_severity: Severity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert!(config.enabled.is_none());
        assert!(config.log_call_stack.is_none());
    }

    #[test]
    fn test_agent_config_json_serialization() {
        let config = AgentConfig {
            log_call_stack: Some(true),
            exception_severity: Some(Severity::Error),
            ..Default::default()
        };

        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"logCallStack\": true"));
        assert!(json.contains("\"exceptionSeverity\": \"Error\""));
        assert!(!json.contains("enabled"));

        let parsed: AgentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_agent_config_yaml_serialization() {
        let yaml = "enabled: false\nqueryMessageSeverity: Information\n";
        let parsed: AgentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.enabled, Some(false));
        assert_eq!(parsed.query_message_severity, Some(Severity::Information));
    }

    #[test]
    fn test_interceptor_config_default() {
        let config = InterceptorConfig::default();
        assert!(config.enabled);
        assert!(!config.include_call_stack);
        assert!(config.log_exceptions);
        assert_eq!(config.query_severity, Severity::Verbose);
        assert_eq!(config.exception_severity, Severity::Warning);
    }
}
