// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Injectable diagnostic sink.
//!
//! Everything that goes wrong on the load path ends up here instead of being
//! returned to the host. The default sink forwards to `tracing`; tests and
//! embedders can plug in their own.

use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Debug,
    Warn,
    Error,
}

/// Receives diagnostics tagged with the component that raised them
/// (usually an instrumentation name).
pub trait DiagLogger: Send + Sync {
    fn log(&self, level: DiagLevel, component: &str, message: &str);

    fn debug(&self, component: &str, message: &str) {
        self.log(DiagLevel::Debug, component, message);
    }

    fn warn(&self, component: &str, message: &str) {
        self.log(DiagLevel::Warn, component, message);
    }

    fn error(&self, component: &str, message: &str) {
        self.log(DiagLevel::Error, component, message);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagLogger;

impl DiagLogger for TracingDiagLogger {
    fn log(&self, level: DiagLevel, component: &str, message: &str) {
        match level {
            DiagLevel::Debug => tracing::debug!(component = %component, "{}", message),
            DiagLevel::Warn => tracing::warn!(component = %component, "{}", message),
            DiagLevel::Error => tracing::error!(component = %component, "{}", message),
        }
    }
}

/// A shared diagnostic sink.
pub type SharedDiagLogger = Arc<dyn DiagLogger>;

/// One captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagRecord {
    pub level: DiagLevel,
    pub component: String,
    pub message: String,
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagLogger {
    records: Mutex<Vec<DiagRecord>>,
}

impl RecordingDiagLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics captured so far.
    pub fn records(&self) -> Vec<DiagRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured diagnostics of one level.
    pub fn at_level(&self, level: DiagLevel) -> Vec<DiagRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }
}

impl DiagLogger for RecordingDiagLogger {
    fn log(&self, level: DiagLevel, component: &str, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DiagRecord {
                level,
                component: component.to_string(),
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_logger() {
        let logger = RecordingDiagLogger::new();
        logger.warn("http", "loaded early");
        logger.error("http", "bad manifest");
        logger.debug("http", "applying patch");

        assert_eq!(logger.records().len(), 3);
        let warnings = logger.at_level(DiagLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].component, "http");
        assert_eq!(warnings[0].message, "loaded early");
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        TracingDiagLogger.error("core", "nothing listening");
    }
}
