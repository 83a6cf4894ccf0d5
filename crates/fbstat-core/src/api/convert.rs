//! Monitor types → API types.

use crate::monitor::{LastRefresh, WalkSummary};
use crate::report::WalkStats;

use super::status::*;

impl From<&WalkStats> for ApiWalkStats {
    fn from(stats: &WalkStats) -> Self {
        Self {
            lines: stats.lines,
            header_entries: stats.header_entries,
            tables: stats.tables,
            indices: stats.indices,
            data_entries: stats.data_entries,
            distribution_buckets: stats.distribution_buckets,
            gauges_registered: stats.gauges_registered,
            total_data_pages: stats.total_data_pages,
            total_overflows: stats.total_overflows,
            skipped: stats.skipped(),
            duplicate_ranges: stats.duplicate_ranges,
        }
    }
}

impl From<&WalkSummary> for ApiWalkSummary {
    fn from(summary: &WalkSummary) -> Self {
        Self {
            database: summary.database.clone(),
            completed_at: summary.completed_at.timestamp(),
            duration_ms: summary.duration_ms,
            report_bytes: summary.report_bytes,
            stats: ApiWalkStats::from(&summary.stats),
        }
    }
}

impl From<&LastRefresh> for ApiRefresh {
    fn from(last: &LastRefresh) -> Self {
        Self {
            at: last.at.timestamp(),
            database: last.database.clone(),
            summary: last.summary.as_ref().map(ApiWalkSummary::from),
            error: last.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collector::mock::{StaticSource, sample_report};
    use crate::metrics::{GaugeRegistry, ValueStore};
    use crate::monitor::DatabaseMonitor;

    #[test]
    fn test_convert_last_refresh() {
        let monitor =
            DatabaseMonitor::new(Arc::new(GaugeRegistry::new()), Arc::new(ValueStore::new()));
        monitor
            .refresh(&StaticSource::new("db", sample_report()))
            .unwrap();
        let last = monitor.last_refresh().unwrap();

        let api = ApiRefresh::from(&last);
        assert_eq!(api.database, "db");
        assert_eq!(api.at, last.at.timestamp());
        assert!(api.error.is_none());
        let summary = api.summary.unwrap();
        assert_eq!(summary.stats.total_data_pages, 350);
        assert_eq!(summary.stats.tables, 2);
        assert_eq!(summary.stats.skipped, 4);
    }

    #[test]
    fn test_convert_failed_refresh() {
        let monitor =
            DatabaseMonitor::new(Arc::new(GaugeRegistry::new()), Arc::new(ValueStore::new()));
        assert!(monitor.refresh(&StaticSource::failing("db")).is_err());

        let api = ApiRefresh::from(&monitor.last_refresh().unwrap());
        assert!(api.summary.is_none());
        assert!(api.error.is_some());
    }
}
