//! fbstat-core: Firebird `gstat` report parsing and metric publication.
//!
//! Provides:
//! - `report`: line cursor, line classifiers and the report walker
//! - `metrics`: metric keys, value store, gauge publisher and registry
//! - `collector`: statistics sources (`gstat`, file, in-memory)
//! - `monitor`: fetch, walk and remember the last report
//!
//! With `api` feature:
//! - `api`: JSON-serializable status types with OpenAPI schemas

pub mod collector;
pub mod metrics;
pub mod monitor;
pub mod report;

#[cfg(feature = "api")]
pub mod api;

pub use monitor::{DatabaseMonitor, LastRefresh, MonitorError, WalkSummary};

/// Crate version with the git revision it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("FBSTAT_GIT_SHA"), ")");
