// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for dbloupe.
//!
//! Handles loading and merging of configuration from multiple sources:
//! - Global config: ~/.dbloupe/config.json
//! - Workspace config: .dbloupe.json, .dbloupe/config.json, dbloupe.config.json or .dbloupe.yaml
//! - Local config: .dbloupe.local.json (gitignored, for personal overrides)
//! - Overrides: command-line flags or host application settings
//!
//! Configuration is merged with precedence (overrides > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    get_example_config, get_global_config_dir, get_global_config_path, init_config,
    load_config_file, load_global_config, load_local_config, load_workspace_config,
    save_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, Overrides};

pub use types::{AgentConfig, InterceptorConfig};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
pub fn load_config(workspace_root: &Path, overrides: Overrides) -> Result<InterceptorConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    Ok(merge_config(global, workspace, local, overrides))
}

/// Load configuration, falling back to defaults if any source can't be read.
///
/// Instrumentation must come up even with a broken config file, so the error
/// is logged instead of returned.
pub fn safe_load(workspace_root: &Path) -> InterceptorConfig {
    match load_config(workspace_root, Overrides::default()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                error = %e,
                root = %workspace_root.display(),
                "Unable to load dbloupe configuration, using defaults"
            );
            default_config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let result = load_config(temp.path(), Overrides::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_config_with_workspace_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".dbloupe.json"),
            r#"{"logCallStack": true}"#,
        )
        .unwrap();

        let config = load_config(temp.path(), Overrides::default()).unwrap();
        assert!(config.include_call_stack);
    }

    #[test]
    fn test_load_config_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".dbloupe.json"), r#"{"logExceptions": true}"#).unwrap();

        let overrides = Overrides {
            log_exceptions: Some(false),
            ..Default::default()
        };
        let config = load_config(temp.path(), overrides).unwrap();
        assert!(!config.log_exceptions);
    }

    #[test]
    fn test_safe_load_falls_back_on_broken_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".dbloupe.json"), "{ broken").unwrap();

        let config = safe_load(temp.path());
        assert_eq!(config, default_config());
    }
}
