// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! modpatch - module load interception, semver gating and patch lifecycle.
//!
//! Instrumentations declare which packages they patch and for which version
//! ranges. The engine watches every module load through a single observer,
//! matches the loaded name against registered hooks, checks the package
//! version and applies (or later removes) the patch.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`semver`] - Version parsing and range matching
//! - [`interceptor`] - Load observer and module name trie
//! - [`host`] - Host abstraction and the in-memory [`MemoryHost`]
//! - [`package`] - Reading versions from `package.json`
//! - [`orchestrator`] - Module definitions and the enable/disable lifecycle
//! - [`wrap`] - Reversible function wrapping
//! - [`exports`] - The exports object a load produces
//! - [`engine`] - Composition root
//! - [`config`] - Configuration loading and merging
//! - [`diag`] - Injectable diagnostic sink
//! - [`telemetry`] - Tracing setup and metrics
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use modpatch::exports::Exports;
//! use modpatch::host::{MemoryHost, ModuleHost};
//! use modpatch::orchestrator::{ModuleDefinition, PatchOrchestrator};
//! use modpatch::Engine;
//! use serde_json::json;
//!
//! let host = Arc::new(MemoryHost::new());
//! host.define_core("http", |_| Exports::new());
//!
//! let engine = Engine::isolated(host.clone() as Arc<dyn ModuleHost>);
//! let definition = ModuleDefinition::new("http", &["*"]).with_patch(|exports, _| {
//!     exports.set_value("instrumented", json!(true));
//!     exports
//! });
//! let orchestrator = PatchOrchestrator::new("http", "0.1.0", vec![definition], &engine);
//! orchestrator.enable();
//!
//! let http = host.require("http").unwrap();
//! assert_eq!(http.value("instrumented"), Some(json!(true)));
//! ```

pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod exports;
pub mod host;
pub mod interceptor;
pub mod orchestrator;
pub mod package;
pub mod semver;
pub mod telemetry;
pub mod wrap;

// Re-export commonly used types at crate root
pub use diag::{DiagLogger, SharedDiagLogger, TracingDiagLogger};
pub use engine::Engine;
pub use error::{ConfigError, HostError, PackageError, Result, VersionError};
pub use exports::{Export, ExportFn, Exports};
pub use host::{MemoryHost, ModuleHost, ModuleLoadObserver};
pub use interceptor::{InterceptorOptions, ModuleInterceptor};
pub use orchestrator::{
    register_instrumentations, FileDefinition, Instrumentation, InstrumentationSet,
    ModuleDefinition, PatchOrchestrator,
};
pub use semver::{is_supported, satisfies, SatisfiesOptions};
pub use wrap::{WrapRegistry, GLOBAL_WRAPS};

/// modpatch version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
