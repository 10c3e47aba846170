// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process module host.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use super::{ModuleHost, ModuleLoadObserver};
use crate::error::HostError;
use crate::exports::Exports;

/// Builds a module's exports. Receives the host so a module can load its
/// siblings while it initializes.
pub type ModuleFactory = Arc<dyn Fn(&MemoryHost) -> Exports + Send + Sync>;

/// How a module was requested. Each kind keeps its own cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// Synchronous, `require`-style.
    Require,
    /// ESM-style `import`.
    Import,
}

#[derive(Clone)]
struct ModuleEntry {
    base_dir: Option<PathBuf>,
    factory: ModuleFactory,
}

/// A module system that lives entirely in memory.
///
/// Modules are defined up front under the name they are requested by:
/// core modules without a base directory, package entry points and package
/// internal files (`pkg/lib/file.js`) with the package directory as base.
///
/// No lock is held while factories or observers run.
#[derive(Default)]
pub struct MemoryHost {
    modules: RwLock<HashMap<String, ModuleEntry>>,
    cache: RwLock<HashMap<(LoadKind, String), Exports>>,
    observers: RwLock<Vec<Arc<dyn ModuleLoadObserver>>>,
    path_observers: RwLock<HashMap<PathBuf, Vec<Arc<dyn ModuleLoadObserver>>>>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    fn define(&self, name: &str, base_dir: Option<PathBuf>, factory: ModuleFactory) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), ModuleEntry { base_dir, factory });
    }

    /// Define a core module (no base directory).
    pub fn define_core<F>(&self, name: &str, factory: F)
    where
        F: Fn(&MemoryHost) -> Exports + Send + Sync + 'static,
    {
        self.define(name, None, Arc::new(factory));
    }

    /// Define a package entry point or one of its internal files.
    pub fn define_package<F>(&self, name: &str, base_dir: impl Into<PathBuf>, factory: F)
    where
        F: Fn(&MemoryHost) -> Exports + Send + Sync + 'static,
    {
        self.define(name, Some(base_dir.into()), Arc::new(factory));
    }

    /// Load a module synchronously.
    pub fn require(&self, name: &str) -> Result<Exports, HostError> {
        self.load(LoadKind::Require, name)
    }

    /// Load a module ESM-style.
    pub fn import(&self, name: &str) -> Result<Exports, HostError> {
        self.load(LoadKind::Import, name)
    }

    /// Load a module, running observers on the first load per kind.
    pub fn load(&self, kind: LoadKind, name: &str) -> Result<Exports, HostError> {
        let key = (kind, name.to_string());
        if let Some(cached) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(cached.clone());
        }

        let entry = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::ModuleNotFound(name.to_string()))?;

        let exports = (entry.factory)(self);
        let exports = self.dispatch(name, exports, entry.base_dir.as_deref());

        // A re-entrant load of the same name may have finished first; the
        // earlier result stays authoritative.
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(exports).clone())
    }

    fn dispatch(&self, name: &str, exports: Exports, base_dir: Option<&Path>) -> Exports {
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let scoped: Vec<_> = self
            .path_observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(Path::new(name))
            .cloned()
            .unwrap_or_default();

        observers
            .iter()
            .chain(scoped.iter())
            .fold(exports, |exports, observer| observer.on_load(name, exports, base_dir))
    }

    /// Drop every cached module so the next load runs factories and
    /// observers again.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of installed global observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ModuleHost for MemoryHost {
    fn install_observer(&self, observer: Arc<dyn ModuleLoadObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn install_path_observer(&self, path: &Path, observer: Arc<dyn ModuleLoadObserver>) {
        self.path_observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_default()
            .push(observer);
    }

    fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .any(|(_, cached)| cached == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_require_caches_exports() {
        let host = MemoryHost::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        host.define_core("os", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Exports::new()
        });

        assert!(!host.is_cached("os"));
        let first = host.require("os").unwrap();
        let second = host.require("os").unwrap();
        assert!(first.same(&second));
        assert!(host.is_cached("os"));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_require_and_import_have_separate_caches() {
        let host = MemoryHost::new();
        host.define_core("os", |_| Exports::new());
        let required = host.require("os").unwrap();
        let imported = host.import("os").unwrap();
        assert!(!required.same(&imported));
    }

    #[test]
    fn test_unknown_module() {
        let host = MemoryHost::new();
        assert_eq!(
            host.require("nope").unwrap_err(),
            HostError::ModuleNotFound("nope".to_string())
        );
    }

    #[test]
    fn test_observers_fold_in_order() {
        let host = MemoryHost::new();
        host.define_package("demo", "/node_modules/demo", |_| Exports::new());
        host.install_observer(Arc::new(|_: &str, exports: Exports, base_dir: Option<&Path>| {
            assert_eq!(base_dir, Some(Path::new("/node_modules/demo")));
            exports.set_value("order", json!(["first"]));
            exports
        }));
        host.install_observer(Arc::new(|_: &str, _exports: Exports, _: Option<&Path>| {
            Exports::new().with_value("replaced", json!(true))
        }));

        let exports = host.require("demo").unwrap();
        assert_eq!(exports.value("replaced"), Some(json!(true)));
        assert!(!exports.contains("order"));
        assert_eq!(host.observer_count(), 2);
    }

    #[test]
    fn test_path_observer_only_sees_its_path() {
        let host = MemoryHost::new();
        host.define_package("/app/lib/local.js", "/app", |_| Exports::new());
        host.define_core("os", |_| Exports::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        host.install_path_observer(
            Path::new("/app/lib/local.js"),
            Arc::new(move |_: &str, exports: Exports, _: Option<&Path>| {
                counter.fetch_add(1, Ordering::SeqCst);
                exports
            }),
        );

        host.require("os").unwrap();
        host.require("/app/lib/local.js").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_can_load_siblings() {
        let host = MemoryHost::new();
        host.define_package("pkg/lib/util.js", "/nm/pkg", |_| {
            Exports::new().with_value("util", json!(true))
        });
        host.define_package("pkg", "/nm/pkg", |host| {
            let util = host.require("pkg/lib/util.js").unwrap();
            Exports::new().with_value("util_loaded", util.value("util").unwrap())
        });

        let exports = host.require("pkg").unwrap();
        assert_eq!(exports.value("util_loaded"), Some(json!(true)));
        assert!(host.is_cached("pkg/lib/util.js"));
    }

    #[test]
    fn test_clear_cache_reloads() {
        let host = MemoryHost::new();
        host.define_core("os", |_| Exports::new());
        let first = host.require("os").unwrap();
        host.clear_cache();
        let second = host.require("os").unwrap();
        assert!(!first.same(&second));
    }
}
