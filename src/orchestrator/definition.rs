// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Module and file definitions: what an instrumentation patches, and for
//! which versions.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::exports::Exports;
use crate::interceptor::normalize_path_separators;

/// Applies instrumentation: `(exports, version) -> exports`.
pub type PatchFn = Arc<dyn Fn(Exports, Option<&str>) -> Exports + Send + Sync>;

/// Removes instrumentation: `(exports, version)`.
pub type UnpatchFn = Arc<dyn Fn(Exports, Option<&str>) + Send + Sync>;

/// Exports captured the first time a module was seen loading.
#[derive(Debug, Clone)]
pub struct CachedExports {
    pub exports: Exports,
    pub version: Option<String>,
}

#[derive(Debug, Default)]
struct ExportsCache(RwLock<Option<CachedExports>>);

impl ExportsCache {
    fn get(&self) -> Option<CachedExports> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, exports: Exports, version: Option<&str>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedExports {
            exports,
            version: version.map(str::to_string),
        });
    }
}

/// One internal file of a package, patched separately from the entry point.
pub struct FileDefinition {
    name: String,
    supported_versions: Vec<String>,
    patch: PatchFn,
    unpatch: UnpatchFn,
    cache: ExportsCache,
}

impl FileDefinition {
    /// Define a file by its path including the package name
    /// (`pkg/lib/client.js`).
    pub fn new<P, U>(name: &str, supported_versions: &[&str], patch: P, unpatch: U) -> Self
    where
        P: Fn(Exports, Option<&str>) -> Exports + Send + Sync + 'static,
        U: Fn(Exports, Option<&str>) + Send + Sync + 'static,
    {
        Self {
            name: normalize_path_separators(name),
            supported_versions: supported_versions.iter().map(|s| s.to_string()).collect(),
            patch: Arc::new(patch),
            unpatch: Arc::new(unpatch),
            cache: ExportsCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_versions(&self) -> &[String] {
        &self.supported_versions
    }

    pub(crate) fn patch_fn(&self) -> PatchFn {
        Arc::clone(&self.patch)
    }

    pub(crate) fn unpatch_fn(&self) -> UnpatchFn {
        Arc::clone(&self.unpatch)
    }

    /// Exports captured on the last observed load, if any.
    pub fn cached(&self) -> Option<CachedExports> {
        self.cache.get()
    }

    pub(crate) fn cache(&self, exports: Exports, version: Option<&str>) {
        self.cache.set(exports, version);
    }
}

impl fmt::Debug for FileDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDefinition")
            .field("name", &self.name)
            .field("supported_versions", &self.supported_versions)
            .field("cached", &self.cache.get().is_some())
            .finish()
    }
}

/// An instrumented package: its name, supported version ranges, the
/// entry-point patch and any internal files.
///
/// # Example
///
/// ```rust
/// use modpatch::orchestrator::ModuleDefinition;
/// use serde_json::json;
///
/// let definition = ModuleDefinition::new("demo-lib", &["^2.0.0"]).with_patch(|exports, _version| {
///     exports.set_value("patched", json!(true));
///     exports
/// });
/// assert_eq!(definition.name(), "demo-lib");
/// ```
pub struct ModuleDefinition {
    name: String,
    supported_versions: Vec<String>,
    patch: Option<PatchFn>,
    unpatch: Option<UnpatchFn>,
    files: Vec<FileDefinition>,
    include_prerelease: bool,
    cache: ExportsCache,
}

impl ModuleDefinition {
    /// Define a module with its supported version ranges.
    pub fn new(name: &str, supported_versions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            supported_versions: supported_versions.iter().map(|s| s.to_string()).collect(),
            patch: None,
            unpatch: None,
            files: Vec::new(),
            include_prerelease: false,
            cache: ExportsCache::default(),
        }
    }

    /// Set the entry-point patch.
    pub fn with_patch<P>(mut self, patch: P) -> Self
    where
        P: Fn(Exports, Option<&str>) -> Exports + Send + Sync + 'static,
    {
        self.patch = Some(Arc::new(patch));
        self
    }

    /// Set the entry-point unpatch.
    pub fn with_unpatch<U>(mut self, unpatch: U) -> Self
    where
        U: Fn(Exports, Option<&str>) + Send + Sync + 'static,
    {
        self.unpatch = Some(Arc::new(unpatch));
        self
    }

    /// Add an internal file.
    pub fn with_file(mut self, file: FileDefinition) -> Self {
        self.files.push(file);
        self
    }

    /// Let prerelease versions match the supported ranges.
    pub fn include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_versions(&self) -> &[String] {
        &self.supported_versions
    }

    pub fn files(&self) -> &[FileDefinition] {
        &self.files
    }

    pub fn includes_prerelease(&self) -> bool {
        self.include_prerelease
    }

    pub fn has_patch(&self) -> bool {
        self.patch.is_some()
    }

    pub(crate) fn patch_fn(&self) -> Option<PatchFn> {
        self.patch.clone()
    }

    pub(crate) fn unpatch_fn(&self) -> Option<UnpatchFn> {
        self.unpatch.clone()
    }

    /// Exports captured on the last observed load, if any.
    pub fn cached(&self) -> Option<CachedExports> {
        self.cache.get()
    }

    pub(crate) fn cache(&self, exports: Exports, version: Option<&str>) {
        self.cache.set(exports, version);
    }

    /// Whether the name is an absolute filesystem path rather than a package
    /// name.
    pub fn is_absolute(&self) -> bool {
        std::path::Path::new(&self.name).is_absolute()
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .field("supported_versions", &self.supported_versions)
            .field("has_patch", &self.patch.is_some())
            .field("has_unpatch", &self.unpatch.is_some())
            .field("files", &self.files)
            .field("include_prerelease", &self.include_prerelease)
            .field("cached", &self.cache.get().is_some())
            .finish()
    }
}
