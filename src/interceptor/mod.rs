// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Load interception and hook dispatch.
//!
//! [`ModuleInterceptor`] installs a single observer into the host and routes
//! every load through a [`ModuleNameTrie`], so the cost of a load does not
//! grow with the number of registered instrumentations.
//!
//! One interceptor per process is the convention ([`ModuleInterceptor::shared`]);
//! tests build their own with [`ModuleInterceptor::isolated`] so trie state
//! does not leak between them.

pub mod trie;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
#[cfg(feature = "telemetry")]
use std::time::Instant;

use once_cell::sync::Lazy;
#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::exports::Exports;
use crate::host::{ModuleHost, ModuleLoadObserver};
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

pub use trie::{Hook, ModuleNameTrie, OnLoadFn, SearchOptions};

static SHARED: Lazy<Arc<ModuleInterceptor>> =
    Lazy::new(|| Arc::new(ModuleInterceptor::new(InterceptorOptions::default())));

/// Interceptor behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorOptions {
    /// Fire matched hooks in registration order rather than by trie depth.
    pub maintain_insertion_order: bool,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            maintain_insertion_order: true,
        }
    }
}

/// Replace platform path separators with `/`.
pub fn normalize_path_separators(name: &str) -> String {
    name.replace('\\', "/")
}

/// Identity of a host: the address of the object behind the reference.
fn host_key(host: &dyn ModuleHost) -> usize {
    host as *const dyn ModuleHost as *const () as usize
}

/// Routes host loads to registered hooks.
pub struct ModuleInterceptor {
    trie: RwLock<ModuleNameTrie>,
    maintain_insertion_order: AtomicBool,
    /// Hosts this interceptor observes.
    hosts: Mutex<Vec<usize>>,
}

impl ModuleInterceptor {
    fn new(options: InterceptorOptions) -> Self {
        Self {
            trie: RwLock::new(ModuleNameTrie::new()),
            maintain_insertion_order: AtomicBool::new(options.maintain_insertion_order),
            hosts: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide interceptor.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// A fresh interceptor with its own trie. Meant for tests; production
    /// code should go through [`ModuleInterceptor::shared`].
    pub fn isolated() -> Arc<Self> {
        Self::isolated_with(InterceptorOptions::default())
    }

    /// A fresh interceptor with custom options.
    pub fn isolated_with(options: InterceptorOptions) -> Arc<Self> {
        Arc::new(Self::new(options))
    }

    pub fn options(&self) -> InterceptorOptions {
        InterceptorOptions {
            maintain_insertion_order: self.maintain_insertion_order.load(Ordering::Relaxed),
        }
    }

    /// Apply new options. Takes effect on the next dispatch.
    pub fn configure(&self, options: InterceptorOptions) {
        self.maintain_insertion_order
            .store(options.maintain_insertion_order, Ordering::Relaxed);
    }

    /// Install this interceptor's observer into `host`. Each host gets the
    /// observer at most once.
    pub fn attach(self: &Arc<Self>, host: &dyn ModuleHost) {
        let key = host_key(host);
        {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            if hosts.contains(&key) {
                return;
            }
            hosts.push(key);
        }
        #[cfg(feature = "telemetry")]
        debug!(hosts = self.attached_hosts(), "Attached interceptor to host");
        host.install_observer(Arc::clone(self) as Arc<dyn ModuleLoadObserver>);
    }

    /// Whether [`attach`](Self::attach) has installed the observer anywhere.
    pub fn is_attached(&self) -> bool {
        self.attached_hosts() > 0
    }

    /// Whether the observer is installed in `host`.
    pub fn is_attached_to(&self, host: &dyn ModuleHost) -> bool {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&host_key(host))
    }

    /// Number of hosts observed.
    pub fn attached_hosts(&self) -> usize {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Register a hook for `module_name`. Registrations accumulate: two hooks
    /// for the same name both fire.
    pub fn register<F>(&self, module_name: &str, on_load: F) -> Arc<Hook>
    where
        F: Fn(Exports, &str, Option<&Path>) -> Exports + Send + Sync + 'static,
    {
        self.trie
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module_name, Arc::new(on_load))
    }

    /// Number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.trie.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Hooks that would fire for a load of `name`.
    pub fn matching_hooks(&self, name: &str, base_dir: Option<&Path>) -> Vec<Arc<Hook>> {
        let normalized = normalize_path_separators(name);
        let options = SearchOptions {
            maintain_insertion_order: self.maintain_insertion_order.load(Ordering::Relaxed),
            // Core modules have no base directory and need an exact match.
            full_only: base_dir.is_none(),
        };
        self.trie
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .search(&normalized, options)
    }

    /// Run a load through every matching hook.
    pub fn dispatch(&self, name: &str, exports: Exports, base_dir: Option<&Path>) -> Exports {
        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        // The trie lock is released before any hook runs; hooks may trigger
        // nested loads that come straight back here.
        let hooks = self.matching_hooks(name, base_dir);
        let matched = hooks.len();

        let exports = hooks
            .iter()
            .fold(exports, |exports, hook| hook.call(exports, name, base_dir));

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_dispatch(start.elapsed(), matched);
            if matched > 0 {
                debug!(module = %name, hooks = matched, "Dispatched module load");
            }
        }
        #[cfg(not(feature = "telemetry"))]
        let _ = matched;

        exports
    }
}

impl ModuleLoadObserver for ModuleInterceptor {
    fn on_load(&self, name: &str, exports: Exports, base_dir: Option<&Path>) -> Exports {
        self.dispatch(name, exports, base_dir)
    }
}

impl std::fmt::Debug for ModuleInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInterceptor")
            .field("hooks", &self.hook_count())
            .field("options", &self.options())
            .field("hosts", &self.attached_hosts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use serde_json::json;
    use std::sync::Mutex;

    fn tag(label: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> impl Fn(Exports, &str, Option<&Path>) -> Exports {
        move |exports, _, _| {
            log.lock().unwrap().push(label);
            exports
        }
    }

    #[test]
    fn test_unmatched_load_passes_through() {
        let interceptor = ModuleInterceptor::isolated();
        interceptor.register("express", |_, _, _| Exports::new());
        let exports = Exports::new().with_value("x", json!(1));
        let out = interceptor.dispatch("koa", exports.clone(), Some(Path::new("/nm/koa")));
        assert!(out.same(&exports));
    }

    #[test]
    fn test_hooks_thread_exports() {
        let interceptor = ModuleInterceptor::isolated();
        interceptor.register("demo", |exports, _, _| {
            exports.set_value("first", json!(true));
            Exports::new().with_value("replaced", json!(true))
        });
        interceptor.register("demo", |exports, _, _| {
            assert_eq!(exports.value("replaced"), Some(json!(true)));
            exports.set_value("second", json!(true));
            exports
        });

        let out = interceptor.dispatch("demo", Exports::new(), Some(Path::new("/nm/demo")));
        assert_eq!(out.value("second"), Some(json!(true)));
        assert!(!out.contains("first"));
    }

    #[test]
    fn test_duplicate_registrations_both_fire_in_order() {
        let interceptor = ModuleInterceptor::isolated();
        let log = Arc::new(Mutex::new(Vec::new()));
        interceptor.register("pg/lib/client.js", tag("file", Arc::clone(&log)));
        interceptor.register("pg", tag("one", Arc::clone(&log)));
        interceptor.register("pg", tag("two", Arc::clone(&log)));

        interceptor.dispatch("pg/lib/client.js", Exports::new(), Some(Path::new("/nm/pg")));
        assert_eq!(*log.lock().unwrap(), vec!["file", "one", "two"]);
        assert_eq!(interceptor.hook_count(), 3);
    }

    #[test]
    fn test_core_modules_need_exact_match() {
        let interceptor = ModuleInterceptor::isolated();
        let log = Arc::new(Mutex::new(Vec::new()));
        interceptor.register("fs", tag("fs", Arc::clone(&log)));
        interceptor.register("fs/promises", tag("fs/promises", Arc::clone(&log)));

        interceptor.dispatch("fs/promises", Exports::new(), None);
        assert_eq!(*log.lock().unwrap(), vec!["fs/promises"]);

        log.lock().unwrap().clear();
        interceptor.dispatch("fs", Exports::new(), None);
        assert_eq!(*log.lock().unwrap(), vec!["fs"]);
    }

    #[test]
    fn test_windows_separators_normalized() {
        let interceptor = ModuleInterceptor::isolated();
        let log = Arc::new(Mutex::new(Vec::new()));
        interceptor.register("pkg/lib/a.js", tag("a", Arc::clone(&log)));
        interceptor.dispatch("pkg\\lib\\a.js", Exports::new(), Some(Path::new("C:\\nm\\pkg")));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_depth_order_when_insertion_order_disabled() {
        let interceptor = ModuleInterceptor::isolated_with(InterceptorOptions {
            maintain_insertion_order: false,
        });
        let log = Arc::new(Mutex::new(Vec::new()));
        interceptor.register("pg/lib", tag("deep", Arc::clone(&log)));
        interceptor.register("pg", tag("shallow", Arc::clone(&log)));

        interceptor.dispatch("pg/lib/x.js", Exports::new(), Some(Path::new("/nm/pg")));
        assert_eq!(*log.lock().unwrap(), vec!["shallow", "deep"]);
    }

    #[test]
    fn test_attach_installs_once() {
        let host = MemoryHost::new();
        let interceptor = ModuleInterceptor::isolated();
        interceptor.attach(&host);
        interceptor.attach(&host);
        assert_eq!(host.observer_count(), 1);
        assert!(interceptor.is_attached());

        interceptor.register("os", |exports, _, _| {
            exports.set_value("seen", json!(true));
            exports
        });
        host.define_core("os", |_| Exports::new());
        assert_eq!(host.require("os").unwrap().value("seen"), Some(json!(true)));
    }

    #[test]
    fn test_attach_to_second_host() {
        let first = MemoryHost::new();
        let second = MemoryHost::new();
        let interceptor = ModuleInterceptor::isolated();
        interceptor.attach(&first);
        interceptor.attach(&second);
        interceptor.attach(&second);

        assert_eq!(first.observer_count(), 1);
        assert_eq!(second.observer_count(), 1);
        assert!(interceptor.is_attached_to(&second));
        assert_eq!(interceptor.attached_hosts(), 2);

        interceptor.register("os", |exports, _, _| {
            exports.set_value("seen", json!(true));
            exports
        });
        second.define_core("os", |_| Exports::new());
        assert_eq!(second.require("os").unwrap().value("seen"), Some(json!(true)));
    }

    #[test]
    fn test_configure_switches_to_depth_order() {
        let interceptor = ModuleInterceptor::isolated();
        let log = Arc::new(Mutex::new(Vec::new()));
        interceptor.register("pg/lib", tag("deep", Arc::clone(&log)));
        interceptor.register("pg", tag("shallow", Arc::clone(&log)));

        interceptor.configure(InterceptorOptions {
            maintain_insertion_order: false,
        });
        assert!(!interceptor.options().maintain_insertion_order);

        interceptor.dispatch("pg/lib/x.js", Exports::new(), Some(Path::new("/nm/pg")));
        assert_eq!(*log.lock().unwrap(), vec!["shallow", "deep"]);
    }

    #[test]
    fn test_shared_is_a_singleton() {
        assert!(Arc::ptr_eq(&ModuleInterceptor::shared(), &ModuleInterceptor::shared()));
        assert!(!Arc::ptr_eq(&ModuleInterceptor::isolated(), &ModuleInterceptor::isolated()));
    }
}
