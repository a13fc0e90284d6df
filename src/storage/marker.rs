//! Last-seen upstream push date of the extras repository.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::store::{StoreError, write_atomic};

/// Format of the stored push date.
pub const MARKER_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Contents of the marker file as seen by the update commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalVersion {
    Found(String),
    NotFound,
    Empty,
    ReadError,
}

impl LocalVersion {
    /// Returns true when the marker matches `remote`.
    #[must_use]
    pub fn matches(&self, remote: &str) -> bool {
        matches!(self, Self::Found(local) if local == remote)
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl fmt::Display for LocalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(date) => f.write_str(date),
            Self::NotFound => f.write_str("Not Found"),
            Self::Empty => f.write_str("Empty"),
            Self::ReadError => f.write_str("Error Reading File"),
        }
    }
}

/// The marker file.
#[derive(Debug, Clone)]
pub struct UpdateMarker {
    path: PathBuf,
}

impl UpdateMarker {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the stored date.
    #[must_use]
    pub fn read(&self) -> LocalVersion {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => LocalVersion::Empty,
            Ok(raw) => LocalVersion::Found(raw.trim().to_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalVersion::NotFound,
            Err(_) => LocalVersion::ReadError,
        }
    }

    /// Stores an already formatted date.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, date: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomic(&self.path, date.as_bytes())
    }
}

/// Formats a push time the way the marker stores it.
#[must_use]
pub fn format_marker_date(at: &DateTime<Utc>) -> String {
    at.format(MARKER_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_states() {
        let dir = tempfile::tempdir().unwrap();
        let marker = UpdateMarker::new(dir.path().join("update.json"));
        assert_eq!(marker.read(), LocalVersion::NotFound);
        assert_eq!(marker.read().to_string(), "Not Found");

        std::fs::write(marker.path(), "  \n").unwrap();
        assert_eq!(marker.read(), LocalVersion::Empty);

        marker.write("2024-05-01 12:30 UTC").unwrap();
        let local = marker.read();
        assert!(local.matches("2024-05-01 12:30 UTC"));
        assert!(!local.matches("2024-05-02 00:00 UTC"));
    }

    #[test]
    fn test_format_marker_date() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:30:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_marker_date(&at), "2024-05-01 12:30 UTC");
    }
}
