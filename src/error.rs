// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the modpatch engine.
//!
//! This module provides strongly-typed errors for different parts of the engine,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.
//!
//! None of these errors are allowed to escape through a module load: the
//! observer path turns them into diagnostics and carries on with the
//! unpatched exports.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while parsing version strings and range clauses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Version component out of range: {0}")]
    Overflow(String),
}

/// Errors that can occur while resolving a package's version from its manifest.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading {}: {message}", path.display())]
    IoError { path: PathBuf, message: String },

    #[error("Invalid manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Manifest {} has no string version field", .0.display())]
    MissingVersion(PathBuf),
}

impl PackageError {
    /// Build a package error from an IO failure on `path`.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::IoError {
                path,
                message: err.to_string(),
            },
        }
    }
}

/// Errors raised by the module host when it cannot produce a module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
