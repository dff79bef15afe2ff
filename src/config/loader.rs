// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AgentConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".dbloupe.json",
    ".dbloupe/config.json",
    "dbloupe.config.json",
    ".dbloupe.yaml",
];

/// Local config file name (for per-directory overrides).
pub const LOCAL_CONFIG_FILE: &str = ".dbloupe.local.json";

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".dbloupe";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config directory path.
pub fn get_global_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR))
}

/// Get the global config file path.
pub fn get_global_config_path() -> Option<PathBuf> {
    get_global_config_dir().map(|dir| dir.join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration from ~/.dbloupe/config.json.
pub fn load_global_config() -> Result<Option<AgentConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load workspace configuration from the workspace root.
///
/// The first file of [`CONFIG_FILES`] that exists wins.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<AgentConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load local configuration from .dbloupe.local.json.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<AgentConfig>, ConfigError> {
    let path = workspace_root.join(LOCAL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Save agent configuration to a file in the workspace root.
pub fn save_workspace_config(
    workspace_root: &Path,
    config: &AgentConfig,
    filename: Option<&str>,
) -> Result<PathBuf, ConfigError> {
    let filename = filename.unwrap_or(".dbloupe.json");
    let path = workspace_root.join(filename);

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;

    Ok(path)
}

/// Initialize a new config file with the example configuration.
pub fn init_config(workspace_root: &Path) -> Result<PathBuf, ConfigError> {
    save_workspace_config(workspace_root, &get_example_config(), None)
}

/// Get an example configuration with every option spelled out.
pub fn get_example_config() -> AgentConfig {
    use crate::interceptor::Severity;

    AgentConfig {
        enabled: Some(true),
        log_call_stack: Some(false),
        log_exceptions: Some(true),
        query_message_severity: Some(Severity::Verbose),
        exception_severity: Some(Severity::Warning),
    }
}
