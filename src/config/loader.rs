// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading configuration from JSON and YAML files in various locations.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::EngineConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[
    ".modpatch.json",
    ".modpatch/config.json",
    "modpatch.config.json",
    ".modpatch.yaml",
];

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".modpatch";

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

/// Load global configuration from ~/.modpatch/config.json.
pub fn load_global_config() -> Result<Option<EngineConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load configuration from a directory, using the first file of
/// [`CONFIG_FILES`] that exists.
pub fn load_workspace_config(dir: &Path) -> Result<Option<EngineConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = dir.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let config: EngineConfig = match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_files_order() {
        assert_eq!(CONFIG_FILES[0], ".modpatch.json");
        assert!(CONFIG_FILES.contains(&".modpatch.yaml"));
    }

    #[test]
    fn test_global_config_dir() {
        if let Some(dir) = get_global_config_dir() {
            assert!(dir.ends_with(".modpatch"));
        }
    }

    #[test]
    fn test_load_workspace_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_workspace_config(temp.path());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_load_workspace_config_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".modpatch.json"),
            r#"{"instrumentations": {"http": {"enabled": false}}}"#,
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        let instrumentations = config.instrumentations.unwrap();
        assert_eq!(instrumentations["http"].enabled, Some(false));
    }

    #[test]
    fn test_load_workspace_config_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".modpatch.yaml"),
            "interceptor:\n  maintainInsertionOrder: false\n",
        )
        .unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert_eq!(
            config.interceptor.unwrap().maintain_insertion_order,
            Some(false)
        );
    }

    #[test]
    fn test_json_wins_over_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".modpatch.json"), r#"{"interceptor": {}}"#).unwrap();
        std::fs::write(temp.path().join(".modpatch.yaml"), "instrumentations: {}\n").unwrap();

        let config = load_workspace_config(temp.path()).unwrap().unwrap();
        assert!(config.interceptor.is_some());
        assert!(config.instrumentations.is_none());
    }

    #[test]
    fn test_load_config_file_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigError::JsonError(_))));
    }

    #[test]
    fn test_load_config_file_rejects_unaddressable_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".modpatch.json");
        std::fs::write(&path, r#"{"instrumentations": {"http,pg": {"enabled": false}}}"#).unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::InvalidValue { .. })
        ));

        std::fs::write(&path, r#"{"instrumentations": {" ": {}}}"#).unwrap();
        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
