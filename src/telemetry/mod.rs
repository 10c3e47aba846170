// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics for the engine.
//!
//! - **Logging**: `tracing` events on the load path (`debug` for dispatch
//!   and patch decisions, `warn`/`error` through the diagnostic sink)
//! - **Metrics**: per-module patch counters and dispatch latency
//!
//! # Usage
//!
//! Initialize logging once at the composition root:
//!
//! ```rust,ignore
//! use modpatch::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Metrics are only recorded with the `telemetry` feature (on by default).

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    DispatchMetrics, Histogram, Metrics, MetricsSnapshot, ModuleMetrics, GLOBAL_METRICS,
};
