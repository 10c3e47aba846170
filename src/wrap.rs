// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reversible function wrapping.
//!
//! Patches usually replace a function export with a wrapper that calls the
//! original. [`WrapRegistry`] keeps a side table from each installed wrapper
//! to the function it replaced, so the original can be put back later
//! without attaching anything to the function value itself.
//!
//! A member is "wrapped" exactly when its current function has a record.
//! Wrapping an already-wrapped member restores the original first, so
//! wrappers never stack.
//!
//! # Example
//!
//! ```rust
//! use modpatch::exports::{export_fn, Exports};
//! use modpatch::wrap::WrapRegistry;
//! use serde_json::{json, Value};
//!
//! let exports = Exports::new().with_fn("greet", |_| json!("hello"));
//! let wraps = WrapRegistry::new();
//!
//! wraps.wrap(&exports, "greet", |original| {
//!     export_fn(move |args: &[Value]| json!(format!("{}!", original(args).as_str().unwrap_or(""))))
//! });
//! assert_eq!(exports.call("greet", &[]), Some(json!("hello!")));
//!
//! wraps.unwrap(&exports, "greet");
//! assert_eq!(exports.call("greet", &[]), Some(json!("hello")));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::diag::{SharedDiagLogger, TracingDiagLogger};
use crate::exports::{ExportFn, Exports};

const COMPONENT: &str = "wrap";

/// Process-wide wrap table.
pub static GLOBAL_WRAPS: Lazy<WrapRegistry> = Lazy::new(WrapRegistry::new);

/// What a wrapper replaced.
#[derive(Clone)]
pub struct WrapRecord {
    pub name: String,
    pub original: ExportFn,
    pub wrapped: ExportFn,
}

impl std::fmt::Debug for WrapRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapRecord")
            .field("name", &self.name)
            .field("original", &Arc::as_ptr(&self.original))
            .field("wrapped", &Arc::as_ptr(&self.wrapped))
            .finish()
    }
}

/// Function identity: the address of the closure behind the `Arc`.
fn fn_key(f: &ExportFn) -> usize {
    Arc::as_ptr(f) as *const () as usize
}

/// Side table of installed wrappers.
pub struct WrapRegistry {
    records: Mutex<HashMap<usize, WrapRecord>>,
    diag: SharedDiagLogger,
}

impl WrapRegistry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            diag: Arc::new(TracingDiagLogger),
        }
    }

    /// Use a different diagnostic sink.
    pub fn with_diag_logger(mut self, diag: SharedDiagLogger) -> Self {
        self.diag = diag;
        self
    }

    /// Replace the function member `name` with `wrapper(original)`.
    ///
    /// Returns `false` (and logs) when there is no function to wrap.
    pub fn wrap<W>(&self, exports: &Exports, name: &str, wrapper: W) -> bool
    where
        W: Fn(ExportFn) -> ExportFn,
    {
        let Some(current) = exports.function(name) else {
            self.diag
                .error(COMPONENT, &format!("no original function {} to wrap", name));
            return false;
        };

        let original = match self.take_record(&current) {
            Some(record) => {
                self.diag.debug(
                    COMPONENT,
                    &format!("{} is already wrapped, restoring the original first", name),
                );
                exports.set_fn(name, Arc::clone(&record.original));
                record.original
            }
            None => current,
        };

        let wrapped = wrapper(Arc::clone(&original));
        exports.set_fn(name, Arc::clone(&wrapped));
        self.lock().insert(
            fn_key(&wrapped),
            WrapRecord {
                name: name.to_string(),
                original,
                wrapped,
            },
        );
        true
    }

    /// Put the original function back.
    ///
    /// Returns `false` (and logs) when `name` is not currently wrapped.
    pub fn unwrap(&self, exports: &Exports, name: &str) -> bool {
        let Some(current) = exports.function(name) else {
            self.diag
                .debug(COMPONENT, &format!("no function {} to unwrap", name));
            return false;
        };

        match self.take_record(&current) {
            Some(record) => {
                exports.set_fn(name, record.original);
                true
            }
            None => {
                self.diag
                    .debug(COMPONENT, &format!("no original to unwrap to for {}", name));
                false
            }
        }
    }

    pub fn is_wrapped(&self, exports: &Exports, name: &str) -> bool {
        exports
            .function(name)
            .map(|f| self.lock().contains_key(&fn_key(&f)))
            .unwrap_or(false)
    }

    /// Wrap every `name` on every exports object.
    pub fn mass_wrap<W>(&self, modules: &[Exports], names: &[&str], wrapper: W)
    where
        W: Fn(ExportFn) -> ExportFn,
    {
        if modules.is_empty() {
            self.diag.error(COMPONENT, "must provide one or more modules to patch");
            return;
        }
        if names.is_empty() {
            self.diag.error(COMPONENT, "must provide one or more functions to wrap");
            return;
        }
        for exports in modules {
            for name in names {
                self.wrap(exports, name, &wrapper);
            }
        }
    }

    /// Unwrap every `name` on every exports object.
    pub fn mass_unwrap(&self, modules: &[Exports], names: &[&str]) {
        if modules.is_empty() {
            self.diag.error(COMPONENT, "must provide one or more modules to unpatch");
            return;
        }
        if names.is_empty() {
            self.diag.error(COMPONENT, "must provide one or more functions to unwrap");
            return;
        }
        for exports in modules {
            for name in names {
                self.unwrap(exports, name);
            }
        }
    }

    /// Number of live wrap records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take_record(&self, f: &ExportFn) -> Option<WrapRecord> {
        self.lock().remove(&fn_key(f))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, WrapRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WrapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WrapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapRegistry")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}
