//! Report-to-metrics orchestration for one monitoring instance.
//!
//! [`DatabaseMonitor`] ties a [`StatisticsSource`] to the report walker: it
//! fetches a report, remembers the raw text and walks it into the shared
//! [`ValueStore`]. Walks are serialized; scrapes read the store concurrently.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::collector::{FetchError, StatisticsSource};
use crate::metrics::{MetricPublisher, MetricRegistry, ValueStore};
use crate::report::{ReportError, WalkStats, walk_report};

/// Outcome of one completed walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkSummary {
    pub database: String,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub report_bytes: usize,
    pub stats: WalkStats,
}

/// The most recent refresh attempt, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct LastRefresh {
    pub at: DateTime<Utc>,
    pub database: String,
    /// Present if the walk ran to completion.
    pub summary: Option<WalkSummary>,
    /// Present if the fetch failed or the walk aborted.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The report could not be fetched; nothing was walked.
    Fetch(FetchError),
    /// The walk stopped early; values read before the failure are published.
    Report(ReportError),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Fetch(e) => write!(f, "fetch failed: {}", e),
            MonitorError::Report(e) => write!(f, "walk aborted: {}", e),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::Fetch(e) => Some(e),
            MonitorError::Report(e) => Some(e),
        }
    }
}

impl From<FetchError> for MonitorError {
    fn from(e: FetchError) -> Self {
        MonitorError::Fetch(e)
    }
}

impl From<ReportError> for MonitorError {
    fn from(e: ReportError) -> Self {
        MonitorError::Report(e)
    }
}

pub struct DatabaseMonitor {
    publisher: MetricPublisher,
    /// Held for the duration of a refresh or walk.
    walk_lock: Mutex<()>,
    last_report: RwLock<Option<Arc<str>>>,
    last_refresh: RwLock<Option<LastRefresh>>,
}

impl DatabaseMonitor {
    pub fn new(registry: Arc<dyn MetricRegistry>, store: Arc<ValueStore>) -> Self {
        Self {
            publisher: MetricPublisher::new(registry, store),
            walk_lock: Mutex::new(()),
            last_report: RwLock::new(None),
            last_refresh: RwLock::new(None),
        }
    }

    pub fn publisher(&self) -> &MetricPublisher {
        &self.publisher
    }

    pub fn store(&self) -> &Arc<ValueStore> {
        self.publisher.store()
    }

    /// Stores `report` as the latest raw report, then walks it for
    /// `database` and publishes every value read.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn parse_report(&self, database: &str, report: &[u8]) -> Result<WalkSummary, ReportError> {
        let _guard = self.walk_lock.lock().unwrap_or_else(|e| e.into_inner());
        let text = self.keep_report(report);
        self.walk(database, &text)
    }

    /// Fetches a fresh report from `source`, stores it and walks it.
    ///
    /// On a fetch failure nothing is walked and the previous raw report is
    /// kept.
    pub fn refresh(&self, source: &dyn StatisticsSource) -> Result<WalkSummary, MonitorError> {
        let _guard = self.walk_lock.lock().unwrap_or_else(|e| e.into_inner());
        let database = source.database();
        let bytes = match source.fetch() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(database, error = %e, "failed to fetch statistics report");
                self.record(database, Err(e.to_string()));
                return Err(e.into());
            }
        };

        let text = self.keep_report(&bytes);
        self.walk(database, &text).map_err(Into::into)
    }

    /// Raw text of the most recently fetched report.
    pub fn fetch_metrics_snapshot(&self) -> Option<String> {
        self.last_report
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
            .map(str::to_string)
    }

    pub fn last_refresh(&self) -> Option<LastRefresh> {
        self.last_refresh
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Decodes `report` once and makes it the latest raw report.
    fn keep_report(&self, report: &[u8]) -> Arc<str> {
        let text: Arc<str> = String::from_utf8_lossy(report).into();
        *self.last_report.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&text));
        text
    }

    /// Callers hold `walk_lock`.
    fn walk(&self, database: &str, text: &str) -> Result<WalkSummary, ReportError> {
        let started = Instant::now();

        match walk_report(database, text, &self.publisher) {
            Ok(stats) => {
                let summary = WalkSummary {
                    database: database.to_string(),
                    completed_at: Utc::now(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    report_bytes: text.len(),
                    stats,
                };
                info!(
                    database,
                    tables = summary.stats.tables,
                    indices = summary.stats.indices,
                    values = summary.stats.header_entries
                        + summary.stats.data_entries
                        + summary.stats.distribution_buckets,
                    new_gauges = summary.stats.gauges_registered,
                    skipped = summary.stats.skipped(),
                    total_data_pages = summary.stats.total_data_pages,
                    duration_ms = summary.duration_ms,
                    "report walked"
                );
                self.record(database, Ok(summary.clone()));
                Ok(summary)
            }
            Err(e) => {
                warn!(database, error = %e, "report walk aborted");
                self.record(database, Err(e.to_string()));
                Err(e)
            }
        }
    }

    fn record(&self, database: &str, outcome: Result<WalkSummary, String>) {
        let (summary, error) = match outcome {
            Ok(summary) => (Some(summary), None),
            Err(e) => (None, Some(e)),
        };
        *self.last_refresh.write().unwrap_or_else(|e| e.into_inner()) = Some(LastRefresh {
            at: Utc::now(),
            database: database.to_string(),
            summary,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{
        SAMPLE_DATABASE, StaticSource, sample_report, sample_report_second_run,
    };
    use crate::metrics::{GaugeRegistry, MetricGroup, MetricKey, Number};

    fn monitor() -> (Arc<GaugeRegistry>, DatabaseMonitor) {
        let registry = Arc::new(GaugeRegistry::new());
        let monitor = DatabaseMonitor::new(registry.clone(), Arc::new(ValueStore::new()));
        (registry, monitor)
    }

    #[test]
    fn test_refresh_publishes_and_keeps_report() {
        let (registry, monitor) = monitor();
        let source = StaticSource::new(SAMPLE_DATABASE, sample_report());

        let summary = monitor.refresh(&source).unwrap();
        assert_eq!(summary.database, SAMPLE_DATABASE);
        assert_eq!(summary.stats.total_data_pages, 350);
        assert_eq!(summary.report_bytes, sample_report().len());
        assert_eq!(monitor.fetch_metrics_snapshot(), Some(sample_report()));
        assert_eq!(registry.len(), summary.stats.gauges_registered as usize);

        let last = monitor.last_refresh().unwrap();
        assert_eq!(last.summary, Some(summary));
        assert!(last.error.is_none());
    }

    #[test]
    fn test_fetch_failure_keeps_previous_report() {
        let (_, monitor) = monitor();
        monitor
            .refresh(&StaticSource::new("db", sample_report()))
            .unwrap();

        let err = monitor.refresh(&StaticSource::failing("db")).unwrap_err();
        assert!(matches!(err, MonitorError::Fetch(_)));
        assert_eq!(monitor.fetch_metrics_snapshot(), Some(sample_report()));

        let last = monitor.last_refresh().unwrap();
        assert!(last.summary.is_none());
        assert!(last.error.unwrap().contains("Statistical information retrieval failed"));

        // Values from the earlier walk are still readable.
        let key = MetricKey::total_data_pages("db");
        assert_eq!(monitor.store().get(&key), Some(Number::Int(350)));
    }

    #[test]
    fn test_no_snapshot_before_first_report() {
        let (_, monitor) = monitor();
        assert_eq!(monitor.fetch_metrics_snapshot(), None);
        assert!(monitor.last_refresh().is_none());
    }

    #[test]
    fn test_parse_report_keeps_raw_report() {
        let (_, monitor) = monitor();
        monitor
            .parse_report("db", b"Analyzing database pages ...\n")
            .unwrap();
        assert_eq!(
            monitor.fetch_metrics_snapshot().as_deref(),
            Some("Analyzing database pages ...\n")
        );

        // An aborted walk still leaves the report it was given.
        let report = "Analyzing database pages ...\nBROKEN\n";
        assert!(monitor.parse_report("db", report.as_bytes()).is_err());
        assert_eq!(monitor.fetch_metrics_snapshot().as_deref(), Some(report));
    }

    #[test]
    fn test_parse_report_twice_updates_store() {
        let (registry, monitor) = monitor();
        let key = MetricKey::object("db", MetricGroup::Data, "CUSTOMERS", "data_page_slots");

        monitor
            .parse_report("db", sample_report().as_bytes())
            .unwrap();
        let gauge = monitor.publisher().gauge(&key).unwrap();
        let registered = registry.len();

        let second = monitor
            .parse_report("db", sample_report_second_run().as_bytes())
            .unwrap();
        assert_eq!(second.stats.gauges_registered, 0);
        assert_eq!(registry.len(), registered);
        assert!(Arc::ptr_eq(&gauge, &monitor.publisher().gauge(&key).unwrap()));
        assert_eq!(monitor.store().get(&key), Some(Number::Int(140)));
    }

    #[test]
    fn test_aborted_walk_is_reported() {
        let (_, monitor) = monitor();
        let report = "Analyzing database pages ...\nBROKEN\n";
        let source = StaticSource::new("db", report);

        let err = monitor.refresh(&source).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Report(ReportError::MalformedSectionHeader { line_number: 2, .. })
        ));
        // The raw report was fetched, so it is kept even though the walk failed.
        assert_eq!(monitor.fetch_metrics_snapshot().as_deref(), Some(report));
        assert!(monitor.last_refresh().unwrap().error.is_some());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (_, monitor) = monitor();
        let report = b"Database header page information:\n\tPage size\t\t4096\n\t\xff\xfe\n\n";
        let summary = monitor.parse_report("db", report).unwrap();
        assert_eq!(summary.stats.header_entries, 1);
        assert_eq!(summary.stats.skipped_header_lines, 1);
    }

    #[test]
    fn test_concurrent_scrape_during_walks() {
        let (registry, monitor) = monitor();
        let monitor = Arc::new(monitor);
        monitor
            .parse_report("db", sample_report().as_bytes())
            .unwrap();

        let writer = {
            let monitor = Arc::clone(&monitor);
            std::thread::spawn(move || {
                for i in 0..20 {
                    let report = if i % 2 == 0 {
                        sample_report_second_run()
                    } else {
                        sample_report()
                    };
                    monitor.parse_report("db", report.as_bytes()).unwrap();
                }
            })
        };
        for _ in 0..20 {
            let text = registry.render().unwrap();
            assert!(text.contains("data_total_data_pages"));
        }
        writer.join().unwrap();
    }
}
