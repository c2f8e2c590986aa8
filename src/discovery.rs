//! Discovery of the newest locally-produced backup archive.

use crate::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Returns the path of the most recently modified regular file in `dir`,
/// or `None` when the directory is empty or does not exist.
///
/// Ties on identical modification times resolve by file name, greatest
/// last, so repeated scans pick the same archive.
///
/// # Errors
///
/// Returns [`Error::BackendUnavailable`] when the directory exists but
/// cannot be read.
pub fn latest_local_archive(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::BackendUnavailable(format!(
                "cannot scan backup directory {}: {e}",
                dir.display()
            )));
        }
    };

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::BackendUnavailable(format!(
                "cannot read entry in {}: {e}",
                dir.display()
            ))
        })?;

        let Ok(metadata) = entry.metadata() else {
            debug!(path = %entry.path().display(), "skipping unreadable entry");
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            debug!(path = %entry.path().display(), "skipping entry without modification time");
            continue;
        };

        let candidate = (modified, entry.path());
        if newest.as_ref().is_none_or(|current| candidate > *current) {
            newest = Some(candidate);
        }
    }

    Ok(newest.map(|(_, path)| path))
}
