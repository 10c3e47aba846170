// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The exports object a host hands back for a loaded module.
//!
//! [`Exports`] is a shared handle: clones point at the same member table, the
//! way every importer of a module sees the same object. Patches mutate the
//! table in place (or return a different handle entirely).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// A callable export.
pub type ExportFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Build an [`ExportFn`] from a closure.
pub fn export_fn<F>(f: F) -> ExportFn
where
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One member of an exports table.
#[derive(Clone)]
pub enum Export {
    Value(Value),
    Function(ExportFn),
}

impl Export {
    /// The function, if this member is callable.
    pub fn as_function(&self) -> Option<&ExportFn> {
        match self {
            Self::Function(f) => Some(f),
            Self::Value(_) => None,
        }
    }

    /// The data value, if this member is not callable.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Function(_) => None,
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({})", v),
            Self::Function(func) => write!(f, "Function({:p})", Arc::as_ptr(func)),
        }
    }
}

/// Shared, mutable exports of one loaded module.
#[derive(Clone, Default)]
pub struct Exports {
    members: Arc<RwLock<BTreeMap<String, Export>>>,
}

impl Exports {
    /// Create an empty exports table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create exports from the fields of a JSON object. Non-object values
    /// are stored under `"default"`.
    pub fn from_json(value: Value) -> Self {
        let exports = Self::new();
        match value {
            Value::Object(map) => {
                for (name, v) in map {
                    exports.set_value(name, v);
                }
            }
            other => {
                exports.set_value("default", other);
            }
        }
        exports
    }

    /// Builder-style member insertion.
    pub fn with_value(self, name: impl Into<String>, value: Value) -> Self {
        self.set_value(name, value);
        self
    }

    /// Builder-style function insertion.
    pub fn with_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.set_fn(name, export_fn(f));
        self
    }

    /// Get a member.
    pub fn get(&self, name: &str) -> Option<Export> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Get a data member.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).and_then(|e| e.as_value().cloned())
    }

    /// Get a function member.
    pub fn function(&self, name: &str) -> Option<ExportFn> {
        self.get(name).and_then(|e| e.as_function().cloned())
    }

    /// Insert or replace a member, returning the previous one.
    pub fn set(&self, name: impl Into<String>, export: Export) -> Option<Export> {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), export)
    }

    pub fn set_value(&self, name: impl Into<String>, value: Value) -> Option<Export> {
        self.set(name, Export::Value(value))
    }

    pub fn set_fn(&self, name: impl Into<String>, f: ExportFn) -> Option<Export> {
        self.set(name, Export::Function(f))
    }

    /// Remove a member.
    pub fn remove(&self, name: &str) -> Option<Export> {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Member names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Call a function member. Returns `None` if the member is missing or
    /// not callable. The table lock is released before the call, so the
    /// function may freely touch these exports (or load other modules).
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let f = self.function(name)?;
        Some(f(args))
    }

    /// Whether two handles refer to the same exports object.
    pub fn same(&self, other: &Exports) -> bool {
        Arc::ptr_eq(&self.members, &other.members)
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map().entries(members.iter()).finish()
    }
}
