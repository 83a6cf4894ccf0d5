//! Report replay from disk.

use std::path::{Path, PathBuf};

use super::{FetchError, StatisticsSource};

/// Reads a previously captured report from a file on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    database: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(database: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            database: database.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatisticsSource for FileSource {
    fn database(&self) -> &str {
        &self.database
    }

    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        std::fs::read(&self.path)
            .map_err(|e| FetchError::Io(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_source_reads_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Analyzing database pages ...\n").unwrap();

        let source = FileSource::new("weather", file.path());
        assert_eq!(source.database(), "weather");
        assert_eq!(source.fetch().unwrap(), b"Analyzing database pages ...\n");
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new("weather", dir.path().join("missing.txt"));
        assert!(matches!(source.fetch(), Err(FetchError::Io(_))));
    }
}
