//! Report acquisition through the Firebird `gstat` command-line tool.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, warn};

use super::{ConfigError, FetchError, StatisticsSource};

/// Default time a single `gstat` run may take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Poll interval while waiting for `gstat` to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `host/port:path`, with the port optional (`host/path`).
static HOST_PORT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9.]+)/((\d+):)?(.*)$").expect("data-source URL pattern compiles")
});

/// Location of a Firebird database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceUrl {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
}

impl DataSourceUrl {
    /// Parses a Firebird data-source URL.
    ///
    /// Accepted forms:
    /// - `host/port:path` (`db.local/3050:/data/weather.fdb`)
    /// - `host/path`
    /// - `host:path` where the host is longer than one character, so Windows
    ///   drive letters (`C:\data\weather.fdb`) stay local paths
    /// - a plain local path
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        let invalid = || ConfigError::InvalidUrl(url.to_string());

        let parsed = if let Some(caps) = HOST_PORT_PATH.captures(url) {
            let port = match caps.get(3) {
                Some(p) => Some(p.as_str().parse::<u16>().map_err(|_| invalid())?),
                None => None,
            };
            Self {
                host: caps.get(1).map(|h| h.as_str().to_string()),
                port,
                path: caps.get(4).map_or("", |p| p.as_str()).to_string(),
            }
        } else if let Some((host, path)) = url.split_once(':').filter(|(h, _)| is_remote_host(h)) {
            Self {
                host: Some(host.to_string()),
                port: None,
                path: path.to_string(),
            }
        } else {
            Self {
                host: None,
                port: None,
                path: url.to_string(),
            }
        };

        if parsed.path.is_empty() {
            return Err(invalid());
        }
        Ok(parsed)
    }

    /// Connection string in the form `gstat` accepts.
    pub fn connection_string(&self) -> String {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => format!("{}/{}:{}", host, port, self.path),
            (Some(host), None) => format!("{}:{}", host, self.path),
            (None, _) => self.path.clone(),
        }
    }
}

/// Single letters are drive names, not hosts.
fn is_remote_host(host: &str) -> bool {
    host.len() > 1
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

impl fmt::Display for DataSourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connection_string())
    }
}

/// Connection settings for [`GstatSource`].
#[derive(Clone)]
pub struct GstatConfig {
    /// Path to the `gstat` binary.
    pub gstat_path: String,
    pub user: String,
    pub password: Option<String>,
    pub url: DataSourceUrl,
    pub timeout: Duration,
}

impl GstatConfig {
    pub fn new(url: DataSourceUrl) -> Self {
        Self {
            gstat_path: "gstat".to_string(),
            user: "SYSDBA".to_string(),
            password: None,
            url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Loads settings from the environment.
    ///
    /// - `FBSTAT_DATABASE`: data-source URL (required)
    /// - `ISC_USER` (default: `SYSDBA`)
    /// - `ISC_PASSWORD` (default: none)
    /// - `FBSTAT_GSTAT`: gstat binary (default: `gstat`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("FBSTAT_DATABASE")
            .map_err(|_| ConfigError::EnvNotSet("FBSTAT_DATABASE".to_string()))?;
        let mut config = Self::new(DataSourceUrl::parse(&url)?);
        if let Ok(user) = std::env::var("ISC_USER") {
            config.user = user;
        }
        config.password = std::env::var("ISC_PASSWORD").ok();
        if let Ok(path) = std::env::var("FBSTAT_GSTAT") {
            config.gstat_path = path;
        }
        Ok(config)
    }

    pub fn with_gstat_path(mut self, path: impl Into<String>) -> Self {
        self.gstat_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for GstatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GstatConfig")
            .field("gstat_path", &self.gstat_path)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Runs `gstat` for data, index and record-version statistics.
///
/// Credentials are handed over through `ISC_USER` / `ISC_PASSWORD` so they
/// do not show up in the process list.
#[derive(Debug, Clone)]
pub struct GstatSource {
    config: GstatConfig,
}

impl GstatSource {
    pub fn new(config: GstatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GstatConfig {
        &self.config
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.gstat_path);
        cmd.args(["-d", "-i", "-r"])
            .arg(self.config.url.connection_string())
            .env("ISC_USER", &self.config.user)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref password) = self.config.password {
            cmd.env("ISC_PASSWORD", password);
        }
        cmd
    }
}

impl StatisticsSource for GstatSource {
    fn database(&self) -> &str {
        &self.config.url.path
    }

    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let started = Instant::now();
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| FetchError::Spawn(format!("{}: {}", self.config.gstat_path, e)))?;

        // Drain both pipes concurrently so a large report cannot block the child.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.config.timeout => {
                    warn!(timeout = ?self.config.timeout, "gstat timed out, killing");
                    if let Err(e) = child.kill() {
                        warn!(error = %e, "failed to kill gstat");
                    }
                    if let Err(e) = child.wait() {
                        warn!(error = %e, "failed to reap gstat");
                    }
                    // Drain threads end on their own once the pipes close.
                    return Err(FetchError::Timeout(self.config.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(FetchError::Io(e.to_string())),
            }
        };

        let stdout = join_drain(stdout)?;
        let stderr = join_drain(stderr)?;

        if !status.success() {
            return Err(FetchError::Failed {
                status: status.code(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }

        debug!(
            bytes = stdout.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "gstat report fetched"
        );
        Ok(stdout)
    }
}

type DrainHandle = thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(mut reader: R) -> DrainHandle {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(handle: Option<DrainHandle>) -> Result<Vec<u8>, FetchError> {
    match handle {
        None => Ok(Vec::new()),
        Some(h) => h
            .join()
            .map_err(|_| FetchError::Io("pipe reader panicked".to_string()))?
            .map_err(|e| FetchError::Io(e.to_string())),
    }
}
