use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fbstat_core::collector::{FileSource, GstatConfig, GstatSource, StatisticsSource};
use fbstat_core::metrics::{GaugeRegistry, Sample, ValueStore};
use fbstat_core::{DatabaseMonitor, MonitorError, WalkSummary};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "fbstat",
    about = "Parse a Firebird gstat report and print its metrics",
    version = fbstat_core::VERSION
)]
struct Cli {
    /// Saved `gstat -d -i -r` report. Without it gstat is run once using
    /// ISC_USER, ISC_PASSWORD, FBSTAT_DATABASE and FBSTAT_GSTAT.
    report: Option<PathBuf>,

    /// Database identifier for a saved report (default: the file name).
    #[arg(long, requires = "report")]
    database: Option<String>,

    /// gstat binary (overrides FBSTAT_GSTAT).
    #[arg(long)]
    gstat: Option<String>,

    /// Timeout for the gstat run, in seconds.
    #[arg(long, default_value = "300")]
    timeout: u64,

    /// Output as JSON instead of Prometheus text.
    #[arg(long)]
    json: bool,

    /// Print walk counters to stderr.
    #[arg(long)]
    summary: bool,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Exit code for a walk that stopped at a malformed section header.
const EXIT_ABORTED: i32 = 3;

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a WalkSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    metrics: Vec<Sample>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, cli.quiet))),
        )
        .with_writer(io::stderr)
        .init();

    let source = match create_source(&cli) {
        Ok(source) => source,
        Err(msg) => {
            error!("{msg}");
            process::exit(2);
        }
    };

    let registry = Arc::new(GaugeRegistry::new());
    let monitor = DatabaseMonitor::new(registry.clone(), Arc::new(ValueStore::new()));

    let (summary, exit_code, walk_error) = match monitor.refresh(source.as_ref()) {
        Ok(summary) => (Some(summary), 0, None),
        // Nothing was fetched, so there is nothing to print.
        Err(MonitorError::Fetch(_)) => process::exit(1),
        Err(e @ MonitorError::Report(_)) => (None, EXIT_ABORTED, Some(e.to_string())),
    };

    if cli.summary
        && let Some(ref summary) = summary
    {
        eprint!("{}", format_summary(summary));
    }

    let output = if cli.json {
        let out = JsonOutput {
            summary: summary.as_ref(),
            error: walk_error,
            metrics: registry.samples(),
        };
        serde_json::to_string_pretty(&out)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string())
    } else {
        registry.render().map_err(|e| e.to_string())
    };

    match output {
        Ok(text) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
                // Broken pipe (e.g. `| head`) is not worth a message.
                if e.kind() != io::ErrorKind::BrokenPipe {
                    error!(error = %e, "failed to write output");
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            process::exit(1);
        }
    }

    process::exit(exit_code);
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn create_source(cli: &Cli) -> Result<Box<dyn StatisticsSource>, String> {
    if let Some(ref path) = cli.report {
        let database = match cli.database {
            Some(ref db) => db.clone(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| format!("cannot derive a database name from {}", path.display()))?,
        };
        return Ok(Box::new(FileSource::new(database, path)));
    }

    let mut config = GstatConfig::from_env()
        .map_err(|e| format!("{e} (pass a report file or set FBSTAT_DATABASE)"))?
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(ref gstat) = cli.gstat {
        config = config.with_gstat_path(gstat);
    }
    Ok(Box::new(GstatSource::new(config)))
}

// ── Formatting ───────────────────────────────────────────────────────────────

fn format_summary(summary: &WalkSummary) -> String {
    let s = &summary.stats;
    let mut out = String::new();
    out.push_str(&format!("database:           {}\n", summary.database));
    out.push_str(&format!(
        "completed:          {}\n",
        summary.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "report:             {} lines, {} bytes, {} ms\n",
        s.lines, summary.report_bytes, summary.duration_ms
    ));
    out.push_str(&format!("header entries:     {}\n", s.header_entries));
    out.push_str(&format!("tables / indices:   {} / {}\n", s.tables, s.indices));
    out.push_str(&format!("data entries:       {}\n", s.data_entries));
    out.push_str(&format!("distribution:       {}\n", s.distribution_buckets));
    out.push_str(&format!("total data pages:   {}\n", s.total_data_pages));
    out.push_str(&format!("gauges registered:  {}\n", s.gauges_registered));
    if s.skipped() > 0 || s.duplicate_ranges > 0 {
        out.push_str(&format!(
            "skipped:            {} header, {} data, {} values, {} distribution, {} duplicate ranges\n",
            s.skipped_header_lines,
            s.skipped_data_lines,
            s.skipped_values,
            s.skipped_distribution_lines,
            s.duplicate_ranges
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbstat_core::collector::mock::{StaticSource, sample_report};

    fn summary() -> WalkSummary {
        let monitor =
            DatabaseMonitor::new(Arc::new(GaugeRegistry::new()), Arc::new(ValueStore::new()));
        monitor
            .refresh(&StaticSource::new("/data/weather.fdb", sample_report()))
            .unwrap()
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0, false), "info");
        assert_eq!(log_filter(1, false), "debug");
        assert_eq!(log_filter(5, false), "trace");
        assert_eq!(log_filter(0, true), "error");
    }

    #[test]
    fn test_format_summary() {
        let text = format_summary(&summary());
        assert!(text.contains("database:           /data/weather.fdb\n"));
        assert!(text.contains("tables / indices:   2 / 2\n"));
        assert!(text.contains("total data pages:   350\n"));
        assert!(text.contains("skipped:            3 header, 1 data, 0 values"));
    }

    #[test]
    fn test_database_name_from_file_name() {
        let cli = Cli::parse_from(["fbstat", "/var/reports/weather.gstat"]);
        let source = create_source(&cli).unwrap();
        assert_eq!(source.database(), "weather.gstat");

        let cli = Cli::parse_from(["fbstat", "--database", "weather", "/tmp/r.txt"]);
        assert_eq!(create_source(&cli).unwrap().database(), "weather");
    }
}
