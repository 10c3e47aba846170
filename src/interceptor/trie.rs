// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Prefix trie over `/`-separated module names.
//!
//! A hook registered on `"a"` sits on the node for `a` and therefore matches
//! loads of `a`, `a/b` and `a/b/c`. Nodes are created on insert and never
//! removed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::exports::Exports;

/// Callback fired for a matching load: `(exports, name, base_dir) -> exports`.
pub type OnLoadFn = Arc<dyn Fn(Exports, &str, Option<&std::path::Path>) -> Exports + Send + Sync>;

/// A registered hook.
pub struct Hook {
    module_pattern: String,
    on_load: OnLoadFn,
    insertion_id: u64,
}

impl Hook {
    /// The module name this hook was registered for.
    pub fn module_pattern(&self) -> &str {
        &self.module_pattern
    }

    /// Global insertion order, assigned by the trie.
    pub fn insertion_id(&self) -> u64 {
        self.insertion_id
    }

    /// Run the callback.
    pub fn call(&self, exports: Exports, name: &str, base_dir: Option<&std::path::Path>) -> Exports {
        (self.on_load)(exports, name, base_dir)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("module_pattern", &self.module_pattern)
            .field("insertion_id", &self.insertion_id)
            .finish()
    }
}

/// Options for [`ModuleNameTrie::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Sort all matches by global insertion order instead of by depth.
    pub maintain_insertion_order: bool,

    /// Only return hooks registered on the exact full name.
    pub full_only: bool,
}

#[derive(Default)]
struct TrieNode {
    hooks: Vec<Arc<Hook>>,
    children: HashMap<String, TrieNode>,
}

/// Trie of hooks keyed by module-name segments.
#[derive(Default)]
pub struct ModuleNameTrie {
    root: TrieNode,
    counter: u64,
    len: usize,
}

impl ModuleNameTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hook for `module_pattern`, returning the stored handle.
    pub fn insert(&mut self, module_pattern: &str, on_load: OnLoadFn) -> Arc<Hook> {
        let mut node = &mut self.root;
        for segment in module_pattern.split('/') {
            node = node.children.entry(segment.to_string()).or_default();
        }

        let hook = Arc::new(Hook {
            module_pattern: module_pattern.to_string(),
            on_load,
            insertion_id: self.counter,
        });
        self.counter += 1;
        self.len += 1;
        node.hooks.push(Arc::clone(&hook));
        hook
    }

    /// Find the hooks matching a module name.
    pub fn search(&self, module_name: &str, options: SearchOptions) -> Vec<Arc<Hook>> {
        let mut node = &self.root;
        let mut found: Vec<Arc<Hook>> = Vec::new();

        let segments: Vec<&str> = module_name.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            let Some(child) = node.children.get(*segment) else {
                if options.full_only {
                    return Vec::new();
                }
                break;
            };
            node = child;

            let last = i + 1 == segments.len();
            if !options.full_only || last {
                found.extend(node.hooks.iter().cloned());
            }
        }

        if options.maintain_insertion_order {
            found.sort_by_key(|hook| hook.insertion_id);
        }
        found
    }

    /// Number of hooks inserted so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ModuleNameTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleNameTrie")
            .field("hooks", &self.len)
            .finish()
    }
}
