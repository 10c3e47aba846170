// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Patch lifecycle.
//!
//! A [`PatchOrchestrator`] owns the [`ModuleDefinition`]s of one
//! instrumentation. On the first [`enable`](PatchOrchestrator::enable) it
//! registers a hook per module; from then on every matching load is
//! version-checked and, while enabled, patched. Hooks are never removed:
//! [`disable`](PatchOrchestrator::disable) unpatches the cached exports and
//! turns the hooks into pass-throughs, and a later `enable` re-patches the
//! cached exports without a reload.
//!
//! ```text
//! Disabled --enable--> Enabled --disable--> Disabled --enable--> ...
//! ```

mod definition;
mod registry;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::InstrumentationConfig;
use crate::diag::SharedDiagLogger;
use crate::engine::Engine;
use crate::exports::Exports;
use crate::host::ModuleLoadObserver;
use crate::interceptor::{normalize_path_separators, Hook};
use crate::package::PackageReader;
use crate::semver::is_supported_reporting;
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

pub use definition::{CachedExports, FileDefinition, ModuleDefinition, PatchFn, UnpatchFn};
pub use registry::{register_instrumentations, Instrumentation, InstrumentationSet};

/// State reachable from installed hooks.
struct LoadState {
    name: String,
    enabled: AtomicBool,
    packages: Arc<dyn PackageReader>,
    diag: SharedDiagLogger,
}

impl LoadState {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn module_version(&self, base_dir: &Path) -> Option<String> {
        match self.packages.read_version(base_dir) {
            Ok(version) => Some(version),
            Err(err) => {
                self.diag
                    .warn(&self.name, &format!("Failed extracting version: {}", err));
                None
            }
        }
    }

    /// Version gate; malformed ranges or versions go to the diag sink.
    fn supports(&self, version: Option<&str>, ranges: &[String], include_prerelease: bool) -> bool {
        is_supported_reporting(version, ranges, include_prerelease, |err| {
            self.diag.error(&self.name, &err.to_string())
        })
    }

    fn apply(&self, target: &str, patch: &PatchFn, exports: Exports, version: Option<&str>) -> Exports {
        self.diag.debug(
            &self.name,
            &format!("Applying patch for {}@{}", target, version.unwrap_or("unknown")),
        );
        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_patch(target);
        patch(exports, version)
    }

    /// Handle one observed load of `module` (or one of its files).
    fn on_load(
        &self,
        module: &ModuleDefinition,
        exports: Exports,
        name: &str,
        base_dir: Option<&Path>,
    ) -> Exports {
        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_load(module.name());

        // Core module: no manifest, no version gate.
        let Some(base_dir) = base_dir else {
            let Some(patch) = module.patch_fn() else {
                return exports;
            };
            module.cache(exports.clone(), None);
            if self.is_enabled() {
                return self.apply(module.name(), &patch, exports, None);
            }
            return exports;
        };

        let version = self.module_version(base_dir);
        let version = version.as_deref();

        if name == module.name() {
            if !self.supports(version, module.supported_versions(), module.includes_prerelease()) {
                self.diag.debug(
                    &self.name,
                    &format!(
                        "Skipping {}@{}: not in {:?}",
                        module.name(),
                        version.unwrap_or("unknown"),
                        module.supported_versions()
                    ),
                );
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_skip(module.name());
                return exports;
            }
            let Some(patch) = module.patch_fn() else {
                return exports;
            };
            module.cache(exports.clone(), version);
            if self.is_enabled() {
                return self.apply(module.name(), &patch, exports, version);
            }
            return exports;
        }

        let normalized = normalize_path_separators(name);
        module
            .files()
            .iter()
            .filter(|file| file.name() == normalized)
            .filter(|file| {
                self.supports(version, file.supported_versions(), module.includes_prerelease())
            })
            .fold(exports, |exports, file| {
                file.cache(exports.clone(), version);
                if self.is_enabled() {
                    self.apply(file.name(), &file.patch_fn(), exports, version)
                } else {
                    exports
                }
            })
    }
}

/// Ties one instrumentation's patch/unpatch functions to module loads.
pub struct PatchOrchestrator {
    state: Arc<LoadState>,
    version: String,
    modules: Vec<Arc<ModuleDefinition>>,
    hooks_installed: AtomicBool,
    hooks: Mutex<Vec<Arc<Hook>>>,
    engine: Engine,
}

impl PatchOrchestrator {
    /// Create a disabled orchestrator for a set of module definitions.
    pub fn new(
        name: &str,
        version: &str,
        modules: Vec<ModuleDefinition>,
        engine: &Engine,
    ) -> Self {
        Self {
            state: Arc::new(LoadState {
                name: name.to_string(),
                enabled: AtomicBool::new(false),
                packages: Arc::clone(engine.packages()),
                diag: Arc::clone(engine.diag()),
            }),
            version: version.to_string(),
            modules: modules.into_iter().map(Arc::new).collect(),
            hooks_installed: AtomicBool::new(false),
            hooks: Mutex::new(Vec::new()),
            engine: engine.clone(),
        }
    }

    /// Build the orchestrator for an [`Instrumentation`], enabling it unless
    /// the config turns it off.
    pub fn for_instrumentation(
        instrumentation: &dyn Instrumentation,
        engine: &Engine,
        config: &InstrumentationConfig,
    ) -> Self {
        let force_prerelease = config.include_prerelease.unwrap_or(false);
        let modules = instrumentation
            .init()
            .into_iter()
            .map(|m| {
                if force_prerelease {
                    m.include_prerelease(true)
                } else {
                    m
                }
            })
            .collect();

        let orchestrator = Self::new(instrumentation.name(), instrumentation.version(), modules, engine);
        if config.is_enabled() {
            orchestrator.enable();
        }
        orchestrator
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    /// The module definitions this orchestrator manages.
    pub fn module_definitions(&self) -> &[Arc<ModuleDefinition>] {
        &self.modules
    }

    /// Hooks installed through the shared interceptor.
    pub fn hooks(&self) -> Vec<Arc<Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Start patching. Idempotent.
    pub fn enable(&self) {
        if self
            .state
            .enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if self.hooks_installed.load(Ordering::SeqCst) {
            self.repatch_cached();
            return;
        }

        self.warn_on_preloaded_modules();
        self.install_hooks();
        self.hooks_installed.store(true, Ordering::SeqCst);
    }

    /// Stop patching and unpatch everything seen so far. Idempotent.
    pub fn disable(&self) {
        if self
            .state
            .enabled
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        for module in &self.modules {
            if let (Some(cached), Some(unpatch)) = (module.cached(), module.unpatch_fn()) {
                self.state.diag.debug(
                    self.name(),
                    &format!("Removing patch for {}@{}", module.name(), version_label(&cached)),
                );
                #[cfg(feature = "telemetry")]
                GLOBAL_METRICS.record_unpatch(module.name());
                unpatch(cached.exports, cached.version.as_deref());
            }
            for file in module.files() {
                if let Some(cached) = file.cached() {
                    self.state.diag.debug(
                        self.name(),
                        &format!("Removing patch for {}@{}", file.name(), version_label(&cached)),
                    );
                    #[cfg(feature = "telemetry")]
                    GLOBAL_METRICS.record_unpatch(file.name());
                    (file.unpatch_fn())(cached.exports, cached.version.as_deref());
                }
            }
        }
    }

    fn repatch_cached(&self) {
        for module in &self.modules {
            if let (Some(cached), Some(patch)) = (module.cached(), module.patch_fn()) {
                // Patches mutate the cached exports in place; the return value
                // has nowhere to go without a reload.
                let _ = self.state.apply(
                    module.name(),
                    &patch,
                    cached.exports,
                    cached.version.as_deref(),
                );
            }
            for file in module.files() {
                if let Some(cached) = file.cached() {
                    let _ = self.state.apply(
                        file.name(),
                        &file.patch_fn(),
                        cached.exports,
                        cached.version.as_deref(),
                    );
                }
            }
        }
    }

    fn warn_on_preloaded_modules(&self) {
        let host = self.engine.host();
        for module in &self.modules {
            if host.is_cached(module.name()) {
                self.state.diag.warn(
                    self.name(),
                    &format!(
                        "Module {} has been loaded before {} so it might not work, please initialize it before loading {}",
                        module.name(),
                        self.name(),
                        module.name()
                    ),
                );
            }
        }
    }

    fn install_hooks(&self) {
        let interceptor = self.engine.interceptor();
        let host = self.engine.host();
        interceptor.attach(host.as_ref());

        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        for module in &self.modules {
            let state = Arc::clone(&self.state);
            let definition = Arc::clone(module);

            if module.is_absolute() {
                // Absolute paths have no place in the package-name trie.
                let observer = move |name: &str, exports: Exports, base_dir: Option<&Path>| {
                    state.on_load(&definition, exports, name, base_dir)
                };
                host.install_path_observer(
                    Path::new(module.name()),
                    Arc::new(observer) as Arc<dyn ModuleLoadObserver>,
                );
                continue;
            }

            let hook = interceptor.register(module.name(), move |exports, name, base_dir| {
                state.on_load(&definition, exports, name, base_dir)
            });
            hooks.push(hook);
        }
    }
}

fn version_label(cached: &CachedExports) -> &str {
    cached.version.as_deref().unwrap_or("unknown")
}

impl std::fmt::Debug for PatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchOrchestrator")
            .field("name", &self.state.name)
            .field("version", &self.version)
            .field("enabled", &self.is_enabled())
            .field("hooks_installed", &self.hooks_installed.load(Ordering::SeqCst))
            .field("modules", &self.modules)
            .finish()
    }
}
