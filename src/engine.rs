// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Composition root.
//!
//! An [`Engine`] bundles the collaborators every orchestrator needs: the
//! interceptor, the host, the manifest reader and the diagnostic sink.
//! Production code builds one with [`Engine::new`] or [`Engine::from_config`],
//! both on the process-wide interceptor; tests use [`Engine::isolated`].

use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::diag::{SharedDiagLogger, TracingDiagLogger};
use crate::host::ModuleHost;
use crate::interceptor::ModuleInterceptor;
use crate::package::{FsPackageReader, PackageReader};

/// Shared collaborators for a set of orchestrators.
#[derive(Clone)]
pub struct Engine {
    interceptor: Arc<ModuleInterceptor>,
    host: Arc<dyn ModuleHost>,
    packages: Arc<dyn PackageReader>,
    diag: SharedDiagLogger,
}

impl Engine {
    /// Engine on the process-wide interceptor.
    pub fn new(host: Arc<dyn ModuleHost>) -> Self {
        Self::with_interceptor(host, ModuleInterceptor::shared())
    }

    /// Engine on the process-wide interceptor, configured from `config`.
    pub fn from_config(host: Arc<dyn ModuleHost>, config: &ResolvedConfig) -> Self {
        Self::new(host).with_config(config)
    }

    /// Apply the interceptor settings of `config` to this engine's
    /// interceptor.
    pub fn with_config(self, config: &ResolvedConfig) -> Self {
        self.interceptor.configure(config.interceptor_options());
        self
    }

    /// Engine on a fresh interceptor, isolated from every other engine.
    pub fn isolated(host: Arc<dyn ModuleHost>) -> Self {
        Self::with_interceptor(host, ModuleInterceptor::isolated())
    }

    /// Engine on a specific interceptor.
    pub fn with_interceptor(host: Arc<dyn ModuleHost>, interceptor: Arc<ModuleInterceptor>) -> Self {
        Self {
            interceptor,
            host,
            packages: Arc::new(FsPackageReader),
            diag: Arc::new(TracingDiagLogger),
        }
    }

    /// Replace the manifest reader.
    pub fn with_package_reader(mut self, packages: Arc<dyn PackageReader>) -> Self {
        self.packages = packages;
        self
    }

    /// Replace the diagnostic sink.
    pub fn with_diag_logger(mut self, diag: SharedDiagLogger) -> Self {
        self.diag = diag;
        self
    }

    pub fn interceptor(&self) -> &Arc<ModuleInterceptor> {
        &self.interceptor
    }

    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.host
    }

    pub fn packages(&self) -> &Arc<dyn PackageReader> {
        &self.packages
    }

    pub fn diag(&self) -> &SharedDiagLogger {
        &self.diag
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}
