// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of on-disk and resolved configuration,
//! supporting JSON and YAML formats.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interceptor::InterceptorOptions;

/// Engine configuration as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Interceptor settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interceptor: Option<InterceptorConfig>,

    /// Per-instrumentation settings, keyed by instrumentation name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumentations: Option<BTreeMap<String, InstrumentationConfig>>,
}

impl EngineConfig {
    /// Reject instrumentation names that could never be addressed: empty
    /// ones, and ones containing the `,` the environment list splits on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.instrumentations.iter().flat_map(|m| m.keys()) {
            if name.trim().is_empty() || name.contains(',') {
                return Err(ConfigError::InvalidValue {
                    field: "instrumentations".to_string(),
                    message: format!("invalid instrumentation name {:?}", name),
                });
            }
        }
        Ok(())
    }
}

/// Interceptor settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorConfig {
    /// Fire matched hooks in registration order (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_insertion_order: Option<bool>,
}

/// Settings for one instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationConfig {
    /// Enable at construction (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Let prerelease versions match every module of this instrumentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_prerelease: Option<bool>,
}

impl InstrumentationConfig {
    /// A config that keeps the instrumentation disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merged_with(&self, other: &InstrumentationConfig) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
            include_prerelease: other.include_prerelease.or(self.include_prerelease),
        }
    }
}

/// Fully resolved configuration with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub maintain_insertion_order: bool,
    pub instrumentations: BTreeMap<String, InstrumentationConfig>,

    /// Instrumentations forced off by the environment
    pub disabled_instrumentations: BTreeSet<String>,
}

impl ResolvedConfig {
    /// Effective settings for one instrumentation.
    pub fn instrumentation(&self, name: &str) -> InstrumentationConfig {
        let mut config = self.instrumentations.get(name).cloned().unwrap_or_default();
        if self.disabled_instrumentations.contains(name) {
            config.enabled = Some(false);
        }
        config
    }

    /// Interceptor options for this configuration.
    pub fn interceptor_options(&self) -> InterceptorOptions {
        InterceptorOptions {
            maintain_insertion_order: self.maintain_insertion_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_camel_case() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "interceptor": {"maintainInsertionOrder": false},
                "instrumentations": {"http": {"enabled": false, "includePrerelease": true}}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.interceptor.unwrap().maintain_insertion_order,
            Some(false)
        );
        let http = &config.instrumentations.unwrap()["http"];
        assert!(!http.is_enabled());
        assert_eq!(http.include_prerelease, Some(true));
    }

    #[test]
    fn test_instrumentation_defaults_enabled() {
        assert!(InstrumentationConfig::default().is_enabled());
        assert!(!InstrumentationConfig::disabled().is_enabled());
    }

    #[test]
    fn test_merged_with() {
        let base = InstrumentationConfig {
            enabled: Some(false),
            include_prerelease: Some(true),
        };
        let overlay = InstrumentationConfig {
            enabled: Some(true),
            include_prerelease: None,
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.enabled, Some(true));
        assert_eq!(merged.include_prerelease, Some(true));
    }

    #[test]
    fn test_resolved_env_disable_wins() {
        let mut resolved = ResolvedConfig::default();
        resolved.instrumentations.insert(
            "pg".to_string(),
            InstrumentationConfig {
                enabled: Some(true),
                include_prerelease: None,
            },
        );
        resolved.disabled_instrumentations.insert("pg".to_string());
        assert!(!resolved.instrumentation("pg").is_enabled());
        assert!(resolved.instrumentation("redis").is_enabled());
    }

    #[test]
    fn test_skip_serializing_none() {
        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
