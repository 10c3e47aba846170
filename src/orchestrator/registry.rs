// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation trait and bulk registration.
//!
//! - [`Instrumentation`] describes one plugin: its name, version and the
//!   modules it patches
//! - [`register_instrumentations`] builds an orchestrator per plugin
//! - [`InstrumentationSet`] holds the result and toggles them together

use crate::config::ResolvedConfig;
use crate::engine::Engine;

#[cfg(feature = "telemetry")]
use tracing::{debug, info};

use super::{ModuleDefinition, PatchOrchestrator};

/// A plugin that patches one or more modules.
///
/// # Example
///
/// ```rust
/// use modpatch::orchestrator::{Instrumentation, ModuleDefinition};
///
/// struct DemoInstrumentation;
///
/// impl Instrumentation for DemoInstrumentation {
///     fn name(&self) -> &str {
///         "demo"
///     }
///
///     fn version(&self) -> &str {
///         "0.1.0"
///     }
///
///     fn init(&self) -> Vec<ModuleDefinition> {
///         vec![ModuleDefinition::new("demo-lib", &["^2.0.0"]).with_patch(|e, _| e)]
///     }
/// }
/// ```
pub trait Instrumentation: Send + Sync {
    /// Unique name, used as the config key and diagnostic component.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Module definitions to hook. Called once, at construction.
    fn init(&self) -> Vec<ModuleDefinition>;
}

/// Orchestrators built by [`register_instrumentations`], in registration
/// order.
#[derive(Debug, Default)]
pub struct InstrumentationSet {
    orchestrators: Vec<PatchOrchestrator>,
}

impl InstrumentationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, orchestrator: PatchOrchestrator) {
        self.orchestrators.push(orchestrator);
    }

    /// Look up an orchestrator by instrumentation name.
    pub fn get(&self, name: &str) -> Option<&PatchOrchestrator> {
        self.orchestrators.iter().find(|o| o.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatchOrchestrator> {
        self.orchestrators.iter()
    }

    pub fn len(&self) -> usize {
        self.orchestrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orchestrators.is_empty()
    }

    /// Names of the currently enabled instrumentations.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.orchestrators
            .iter()
            .filter(|o| o.is_enabled())
            .map(|o| o.name())
            .collect()
    }

    pub fn enable_all(&self) {
        for orchestrator in &self.orchestrators {
            orchestrator.enable();
        }
    }

    pub fn disable_all(&self) {
        for orchestrator in &self.orchestrators {
            orchestrator.disable();
        }
    }
}

/// Build an orchestrator per instrumentation, enabling each one the config
/// does not turn off. The config's interceptor settings are applied to the
/// engine's interceptor first.
pub fn register_instrumentations(
    instrumentations: Vec<Box<dyn Instrumentation>>,
    engine: &Engine,
    config: &ResolvedConfig,
) -> InstrumentationSet {
    engine.interceptor().configure(config.interceptor_options());

    let mut set = InstrumentationSet::new();
    for instrumentation in instrumentations {
        let settings = config.instrumentation(instrumentation.name());

        #[cfg(feature = "telemetry")]
        {
            if settings.is_enabled() {
                debug!(
                    instrumentation = instrumentation.name(),
                    version = instrumentation.version(),
                    "Registering instrumentation"
                );
            } else {
                info!(
                    instrumentation = instrumentation.name(),
                    "Instrumentation disabled by configuration"
                );
            }
        }

        set.push(PatchOrchestrator::for_instrumentation(
            instrumentation.as_ref(),
            engine,
            &settings,
        ));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_config, EngineConfig, InstrumentationConfig, InterceptorConfig};
    use crate::host::{MemoryHost, ModuleHost};
    use crate::package::MockPackageReader;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        module: &'static str,
    }

    impl Instrumentation for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn init(&self) -> Vec<ModuleDefinition> {
            let tag = self.name;
            vec![ModuleDefinition::new(self.module, &["^1.0.0"])
                .with_patch(move |exports, _| {
                    exports.set_value(tag, json!(true));
                    exports
                })
                .with_unpatch(move |exports, _| {
                    exports.remove(tag);
                })]
        }
    }

    fn engine(host: &Arc<MemoryHost>, version: &'static str) -> Engine {
        let mut packages = MockPackageReader::new();
        packages
            .expect_read_version()
            .returning(move |_| Ok(version.to_string()));
        Engine::isolated(Arc::clone(host) as Arc<dyn ModuleHost>)
            .with_package_reader(Arc::new(packages))
    }

    fn instrumentations() -> Vec<Box<dyn Instrumentation>> {
        vec![
            Box::new(Fixed { name: "alpha", module: "lib-a" }),
            Box::new(Fixed { name: "beta", module: "lib-b" }),
        ]
    }

    #[test]
    fn test_all_enabled_by_default() {
        let host = Arc::new(MemoryHost::new());
        let engine = engine(&host, "1.0.0");
        let set = register_instrumentations(instrumentations(), &engine, &resolve_config(None, None, None));

        assert_eq!(set.len(), 2);
        assert_eq!(set.enabled_names(), vec!["alpha", "beta"]);
        assert_eq!(engine.interceptor().hook_count(), 2);
    }

    #[test]
    fn test_env_disabled_instrumentation_stays_off() {
        let host = Arc::new(MemoryHost::new());
        host.define_package("lib-b", "/nm/lib-b", |_| crate::exports::Exports::new());
        let engine = engine(&host, "1.0.0");
        let config = resolve_config(None, None, Some("beta"));
        let set = register_instrumentations(instrumentations(), &engine, &config);

        assert_eq!(set.enabled_names(), vec!["alpha"]);
        assert!(!set.get("beta").unwrap().is_enabled());
        assert!(!host.require("lib-b").unwrap().contains("beta"));
        // Never enabled, so no hooks either.
        assert_eq!(engine.interceptor().hook_count(), 1);
    }

    #[test]
    fn test_config_include_prerelease_applies_to_every_module() {
        let host = Arc::new(MemoryHost::new());
        host.define_package("lib-a", "/nm/lib-a", |_| crate::exports::Exports::new());
        let engine = engine(&host, "1.5.0-beta.1");
        let config = resolve_config(
            None,
            Some(EngineConfig {
                interceptor: None,
                instrumentations: Some(BTreeMap::from([(
                    "alpha".to_string(),
                    InstrumentationConfig {
                        enabled: None,
                        include_prerelease: Some(true),
                    },
                )])),
            }),
            None,
        );
        let set = register_instrumentations(instrumentations(), &engine, &config);

        let alpha = set.get("alpha").unwrap();
        assert!(alpha.module_definitions()[0].includes_prerelease());
        assert!(!set.get("beta").unwrap().module_definitions()[0].includes_prerelease());
        assert_eq!(host.require("lib-a").unwrap().value("alpha"), Some(json!(true)));
    }

    #[test]
    fn test_enable_all_and_disable_all() {
        let host = Arc::new(MemoryHost::new());
        host.define_package("lib-a", "/nm/lib-a", |_| crate::exports::Exports::new());
        let engine = engine(&host, "1.0.0");
        let set = register_instrumentations(instrumentations(), &engine, &resolve_config(None, None, None));

        let exports = host.require("lib-a").unwrap();
        assert!(exports.contains("alpha"));

        set.disable_all();
        assert!(set.enabled_names().is_empty());
        assert!(!exports.contains("alpha"));

        set.enable_all();
        assert!(exports.contains("alpha"));
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn test_interceptor_settings_applied() {
        let host = Arc::new(MemoryHost::new());
        let engine = engine(&host, "1.0.0");
        let config = resolve_config(
            None,
            Some(EngineConfig {
                interceptor: Some(InterceptorConfig {
                    maintain_insertion_order: Some(false),
                }),
                instrumentations: None,
            }),
            None,
        );

        register_instrumentations(instrumentations(), &engine, &config);
        assert!(!engine.interceptor().options().maintain_insertion_order);
    }
}
