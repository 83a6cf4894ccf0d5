//! Status and refresh payloads.

use serde::Serialize;
use utoipa::ToSchema;

/// Counters of one report walk.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiWalkStats {
    /// Report lines consumed.
    pub lines: usize,
    pub header_entries: u64,
    pub tables: u64,
    pub indices: u64,
    pub data_entries: u64,
    pub distribution_buckets: u64,
    /// Gauges registered for keys first seen in this walk.
    pub gauges_registered: u64,
    /// Sum of `data_page_slots` over all tables, saturating at `i64::MAX`.
    pub total_data_pages: i64,
    pub total_overflows: u64,
    /// Lines or values skipped as unparseable.
    pub skipped: u64,
    pub duplicate_ranges: u64,
}

/// A walk that ran to completion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiWalkSummary {
    pub database: String,
    /// Unix timestamp (seconds since epoch).
    pub completed_at: i64,
    pub duration_ms: u64,
    pub report_bytes: usize,
    pub stats: ApiWalkStats,
}

/// The most recent refresh attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiRefresh {
    /// Unix timestamp (seconds since epoch).
    pub at: i64,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ApiWalkSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Service status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiStatus {
    /// Database identifier published in the `database` tag.
    pub database: String,
    /// Refresh interval in seconds.
    pub interval_secs: u64,
    /// Gauges registered since start.
    pub gauges: usize,
    /// Values held in the store.
    pub values: usize,
    /// Absent until the first refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<ApiRefresh>,
}

/// Error payload for failed requests.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
}
