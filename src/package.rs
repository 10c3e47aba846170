// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Package manifest access.
//!
//! The only I/O on the load path: reading `<base_dir>/package.json` to learn
//! which version of a package was just loaded.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::PackageError;

/// Manifest file name inside a package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// The manifest fields the engine cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,

    /// Kept as raw JSON: a non-string version counts as missing, not as a
    /// malformed manifest.
    #[serde(default)]
    pub version: Option<serde_json::Value>,
}

impl PackageManifest {
    /// The version, if it is a string.
    pub fn version_str(&self) -> Option<&str> {
        self.version.as_ref().and_then(|v| v.as_str())
    }
}

/// Resolves a package's version from its base directory.
#[cfg_attr(test, mockall::automock)]
pub trait PackageReader: Send + Sync {
    /// Read the `version` field of the manifest in `base_dir`.
    fn read_version(&self, base_dir: &Path) -> Result<String, PackageError>;
}

/// Reads manifests from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPackageReader;

impl FsPackageReader {
    /// Path of the manifest for a package directory.
    pub fn manifest_path(base_dir: &Path) -> PathBuf {
        base_dir.join(MANIFEST_FILE)
    }

    /// Load and parse the manifest in `base_dir`.
    pub fn read_manifest(&self, base_dir: &Path) -> Result<PackageManifest, PackageError> {
        let path = Self::manifest_path(base_dir);
        let content = std::fs::read_to_string(&path).map_err(|e| PackageError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| PackageError::InvalidManifest {
            path,
            message: e.to_string(),
        })
    }
}

impl PackageReader for FsPackageReader {
    fn read_version(&self, base_dir: &Path) -> Result<String, PackageError> {
        let manifest = self.read_manifest(base_dir)?;
        manifest
            .version_str()
            .map(str::to_string)
            .ok_or_else(|| PackageError::MissingVersion(Self::manifest_path(base_dir)))
    }
}
