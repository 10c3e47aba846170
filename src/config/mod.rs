// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for modpatch.
//!
//! Handles loading and merging configuration from multiple sources:
//! - Global config: ~/.modpatch/config.json
//! - Workspace config: .modpatch.json, .modpatch/config.json, modpatch.config.json
//!   or .modpatch.yaml
//! - Environment: `MODPATCH_DISABLED_INSTRUMENTATIONS` (comma-separated names)
//!
//! Precedence is environment > workspace > global > defaults.

mod loader;
mod types;

pub use loader::{
    get_global_config_dir, get_global_config_path, load_config_file, load_global_config,
    load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use types::{EngineConfig, InstrumentationConfig, InterceptorConfig, ResolvedConfig};

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigError;

/// Environment variable listing instrumentations that start disabled.
pub const DISABLED_INSTRUMENTATIONS_ENV: &str = "MODPATCH_DISABLED_INSTRUMENTATIONS";

/// Load and merge all configuration sources for a directory.
pub fn load_config(dir: &Path) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(dir)?;
    let disabled = std::env::var(DISABLED_INSTRUMENTATIONS_ENV).ok();

    Ok(resolve_config(global, workspace, disabled.as_deref()))
}

/// Merge config layers. `disabled` is the raw value of
/// [`DISABLED_INSTRUMENTATIONS_ENV`].
pub fn resolve_config(
    global: Option<EngineConfig>,
    workspace: Option<EngineConfig>,
    disabled: Option<&str>,
) -> ResolvedConfig {
    let mut resolved = ResolvedConfig {
        maintain_insertion_order: true,
        ..Default::default()
    };

    for layer in [global, workspace].into_iter().flatten() {
        if let Some(order) = layer.interceptor.and_then(|i| i.maintain_insertion_order) {
            resolved.maintain_insertion_order = order;
        }
        for (name, config) in layer.instrumentations.unwrap_or_default() {
            let merged = resolved
                .instrumentations
                .get(&name)
                .map(|existing| existing.merged_with(&config))
                .unwrap_or(config);
            resolved.instrumentations.insert(name, merged);
        }
    }

    resolved.disabled_instrumentations = parse_name_list(disabled.unwrap_or(""));
    resolved
}

/// Split a comma-separated list of names, dropping blanks.
pub fn parse_name_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
