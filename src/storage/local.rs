//! Local filesystem storage backend.
//!
//! Stores archives as plain files in one directory. Timestamps are the
//! files' modification times; copies preserve the source's modification
//! time so a listed archive carries the instant the backup was produced,
//! not the instant it was copied.

use crate::models::{Archive, ArchiveName};
use crate::storage::StorageBackend;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filesystem-based storage backend.
pub struct LocalBackend {
    /// Directory holding the archives.
    base_path: PathBuf,
}

impl LocalBackend {
    /// Creates a backend over an existing directory.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a backend, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the directory cannot be created.
    pub fn with_create(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| {
            Error::InvalidConfig(format!(
                "cannot create storage directory {}: {e}",
                base_path.display()
            ))
        })?;
        Ok(Self { base_path })
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn archive_path(&self, name: &ArchiveName) -> PathBuf {
        self.base_path.join(name.as_str())
    }
}

impl StorageBackend for LocalBackend {
    fn list(&self) -> Result<Vec<Archive>> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            Error::BackendUnavailable(format!(
                "cannot list {}: {e}",
                self.base_path.display()
            ))
        })?;

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::BackendUnavailable(format!(
                    "cannot read entry in {}: {e}",
                    self.base_path.display()
                ))
            })?;

            let metadata = entry.metadata().map_err(|e| {
                Error::BackendUnavailable(format!(
                    "cannot stat {}: {e}",
                    entry.path().display()
                ))
            })?;
            if !metadata.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(ArchiveName::from) else {
                debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };

            let modified = metadata.modified().map_err(|e| {
                Error::BackendUnavailable(format!(
                    "cannot read modification time of {}: {e}",
                    entry.path().display()
                ))
            })?;

            archives.push(Archive::new(name, DateTime::<Utc>::from(modified)));
        }

        archives.sort();
        Ok(archives)
    }

    fn write(&self, source: &Path, name: &ArchiveName) -> Result<Archive> {
        let write_failed = |cause: String| Error::WriteFailed {
            name: name.to_string(),
            cause,
        };

        fs::create_dir_all(&self.base_path)
            .map_err(|e| write_failed(format!("cannot create target directory: {e}")))?;

        let source_modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(|e| write_failed(format!("cannot stat source {}: {e}", source.display())))?;

        let target = self.archive_path(name);
        fs::copy(source, &target)
            .map_err(|e| write_failed(format!("cannot copy to {}: {e}", target.display())))?;

        // Carry the source's modification time over so the listed timestamp
        // is the backup instant, not the copy instant.
        let file = fs::File::options()
            .write(true)
            .open(&target)
            .map_err(|e| write_failed(format!("cannot reopen {}: {e}", target.display())))?;
        file.set_modified(source_modified)
            .map_err(|e| write_failed(format!("cannot set modification time: {e}")))?;

        Ok(Archive::new(
            name.clone(),
            DateTime::<Utc>::from(source_modified),
        ))
    }

    fn delete(&self, name: &ArchiveName) -> Result<()> {
        let path = self.archive_path(name);
        fs::remove_file(&path).map_err(|e| Error::DeleteFailed {
            name: name.to_string(),
            cause: format!("{}: {e}", path.display()),
        })
    }

    fn exists(&self, name: &ArchiveName) -> Result<bool> {
        Ok(self.archive_path(name).is_file())
    }

    fn describe(&self) -> String {
        self.base_path.display().to_string()
    }
}
