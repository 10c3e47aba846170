// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host module-system abstraction.
//!
//! The engine never reaches into a loader's internals. A host only has to
//! offer one extension point: before a freshly loaded module's exports are
//! returned to the caller, run them through every installed
//! [`ModuleLoadObserver`]. Synchronous and ESM-style loads go through the
//! same observers.
//!
//! [`MemoryHost`] is a complete in-process host, used by the tests and the
//! crate examples.

mod memory;

use std::path::Path;
use std::sync::Arc;

use crate::exports::Exports;

pub use memory::{LoadKind, MemoryHost, ModuleFactory};

/// Receives every module load before its exports reach the caller.
pub trait ModuleLoadObserver: Send + Sync {
    /// Observe a load. `base_dir` is the package directory, absent for core
    /// modules. Returns the exports to hand to the caller.
    fn on_load(&self, name: &str, exports: Exports, base_dir: Option<&Path>) -> Exports;
}

impl<F> ModuleLoadObserver for F
where
    F: Fn(&str, Exports, Option<&Path>) -> Exports + Send + Sync,
{
    fn on_load(&self, name: &str, exports: Exports, base_dir: Option<&Path>) -> Exports {
        self(name, exports, base_dir)
    }
}

/// The capabilities the engine needs from a module system.
pub trait ModuleHost: Send + Sync {
    /// Install an observer that sees every load.
    fn install_observer(&self, observer: Arc<dyn ModuleLoadObserver>);

    /// Install an observer that only sees loads of one absolute path.
    fn install_path_observer(&self, path: &Path, observer: Arc<dyn ModuleLoadObserver>);

    /// Whether `name` is already present in the host's module cache.
    fn is_cached(&self, name: &str) -> bool;
}
