//! Acquisition of raw `gstat` reports.
//!
//! A [`StatisticsSource`] produces the report bytes for one database. The
//! report is fetched in full before any parsing starts.
//!
//! - [`GstatSource`] runs the Firebird `gstat` tool
//! - [`FileSource`] replays a report saved to disk
//! - [`mock::StaticSource`] serves an in-memory report (tests)

mod file;
mod gstat;
pub mod mock;

use std::fmt;
use std::time::Duration;

pub use file::FileSource;
pub use gstat::{DataSourceUrl, GstatConfig, GstatSource};

/// Produces raw statistics reports for one database.
pub trait StatisticsSource: Send + Sync {
    /// Database identifier used in metric keys and tags.
    fn database(&self) -> &str;

    /// Fetches a complete report.
    fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

/// Error type for report acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The statistics tool could not be started.
    Spawn(String),
    /// The statistics tool did not finish in time and was killed.
    Timeout(Duration),
    /// The statistics tool exited unsuccessfully.
    Failed { status: Option<i32>, stderr: String },
    /// Reading the report failed.
    Io(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Spawn(msg) => write!(f, "failed to start gstat: {}", msg),
            FetchError::Timeout(after) => write!(f, "gstat timed out after {:?}", after),
            FetchError::Failed { status, stderr } => match status {
                Some(code) => write!(f, "gstat exited with status {}: {}", code, stderr.trim()),
                None => write!(f, "gstat terminated by signal: {}", stderr.trim()),
            },
            FetchError::Io(msg) => write!(f, "failed to read report: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// Error type for connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Required environment variable not set.
    EnvNotSet(String),
    /// Data-source URL that does not name a database.
    InvalidUrl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvNotSet(var) => write!(f, "{} not set", var),
            ConfigError::InvalidUrl(url) => write!(f, "invalid data-source URL: {:?}", url),
        }
    }
}

impl std::error::Error for ConfigError {}
