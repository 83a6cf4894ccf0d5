//! In-memory report sources and sample `gstat` output for testing.

use super::{FetchError, StatisticsSource};

/// Database identifier used by the sample reports.
pub const SAMPLE_DATABASE: &str = "/data/weather.fdb";

/// Serves a fixed report, or fails every fetch when it has none.
#[derive(Debug, Clone)]
pub struct StaticSource {
    database: String,
    report: Option<Vec<u8>>,
}

impl StaticSource {
    pub fn new(database: impl Into<String>, report: impl Into<Vec<u8>>) -> Self {
        Self {
            database: database.into(),
            report: Some(report.into()),
        }
    }

    /// A source whose fetch always fails.
    pub fn failing(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            report: None,
        }
    }
}

impl StatisticsSource for StaticSource {
    fn database(&self) -> &str {
        &self.database
    }

    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        self.report.clone().ok_or_else(|| FetchError::Failed {
            status: Some(1),
            stderr: "Statistical information retrieval failed".to_string(),
        })
    }
}

/// Typical `gstat -d -i -r` output for a small database.
///
/// Two tables with 100 and 250 data page slots, one index each.
pub fn sample_report() -> String {
    report_with_slots(100, 250)
}

/// Same database after `CUSTOMERS` grew to 140 data page slots.
pub fn sample_report_second_run() -> String {
    report_with_slots(140, 250)
}

fn report_with_slots(customers: i64, weather_records: i64) -> String {
    format!(
        "\
Database \"/data/weather.fdb\"
Gstat execution time Mon Oct 19 03:00:01 2026

Database header page information:
\tFlags\t\t\t0
\tGeneration\t\t4711
\tSystem Change Number\t0
\tPage size\t\t8192
\tODS version\t\t12.2
\tOldest transaction\t1520
\tOldest active\t\t1521
\tOldest snapshot\t\t1521
\tNext transaction\t1530
\tSequence number\t\t0
\tNext attachment ID\t88
\tImplementation\t\tHW=AMD/Intel/x64 little-endian OS=Linux CC=gcc
\tShadow count\t\t0
\tPage buffers\t\t0
\tNext header page\t0
\tDatabase dialect\t3
\tCreation date\t\tMar 1, 2020 10:00:00
\tAttributes\t\tforce write

\tVariable header data:
\t\t*END*

Analyzing database pages ...
CUSTOMERS (128)
    Primary pointer page: 165, Index root page: 166
    Total formats: 1, used formats: 1
    Average record length: 45.20, total records: 1200
    Average version length: 0.00, total versions: 0, max versions: 0
    Average fragment length: 0.00, total fragments: 0, max fragments: 0
    Average unpacked length: 120.00, compression ratio: 2.65
    Pointer pages: 1, data page slots: {customers}
    Data pages: {customers}, average fill: 61%
    Primary pages: {customers}, secondary pages: 0, swept pages: 0
    Empty pages: 0, full pages: 12
    Fill distribution:
\t 0 - 19% = 0
\t20 - 39% = 1
\t40 - 59% = 4
\t60 - 79% = 7
\t80 - 99% = 88

    Index PK_CUSTOMERS (0)
\tRoot page: 190, depth: 1, leaf buckets: 1, nodes: 1200
\tAverage node length: 5.00, total dup: 0, max dup: 0
\tAverage key length: 3.00, compression ratio: 1.33
\tAverage prefix length: 1.00, average data length: 3.00
\tClustering factor: 14, ratio: 0.01
\tFill distribution:
\t     0 - 19% = 0
\t    20 - 39% = 0
\t    40 - 59% = 1
\t    60 - 79% = 0
\t    80 - 99% = 0

WEATHER_RECORDS (129)
    Primary pointer page: 170, Index root page: 171
    Total formats: 2, used formats: 2
    Average record length: 88.75, total records: 52000
    Average version length: 12.00, total versions: 35, max versions: 2
    Pointer pages: 2, data page slots: {weather_records}
    Data pages: {weather_records}, average fill: 84%
    Fill distribution:
\t 0 - 19% = 2
\t20 - 39% = 3
\t40 - 59% = 10
\t60 - 79% = 35
\t80 - 99% = 200

    Index IDX_WEATHER_TIME (1)
\tDepth: 2, leaf buckets: 40, nodes: 52000
\tAverage data length: 6.00, total dup: 310, max dup: 4
\tFill distribution:
\t     0 - 19% = 0
\t    20 - 39% = 2
\t    40 - 59% = 8
\t    60 - 79% = 20
\t    80 - 99% = 10
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_serves_report() {
        let source = StaticSource::new(SAMPLE_DATABASE, sample_report());
        assert_eq!(source.database(), SAMPLE_DATABASE);
        let bytes = source.fetch().unwrap();
        assert!(bytes.starts_with(b"Database \"/data/weather.fdb\""));
    }

    #[test]
    fn test_failing_source() {
        let source = StaticSource::failing("db");
        assert!(matches!(source.fetch(), Err(FetchError::Failed { .. })));
    }

    #[test]
    fn test_second_run_differs_in_customers_only() {
        let first = sample_report();
        let second = sample_report_second_run();
        assert!(first.contains("data page slots: 100"));
        assert!(second.contains("data page slots: 140"));
        assert!(second.contains("data page slots: 250"));
    }
}
