//! Archive types and canonical naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Timestamp layout for canonical archive names.
///
/// A backup produced at 2024-03-01 04:30:00 UTC is stored as
/// `2024-03-01-04-30-00.zip`.
pub const BACKUP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Unique identifier for an archive within a storage target.
///
/// Names are opaque keys; the retention planner only compares them
/// lexicographically to break ties between archives with identical
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveName(String);

impl ArchiveName {
    /// Creates a new archive name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the canonical name for an archive produced at `timestamp`.
    ///
    /// The extension is carried over from the source file (`zip` for the
    /// common case). The derived name is stable across re-runs, which is
    /// what makes upload skipping idempotent.
    #[must_use]
    pub fn from_timestamp(timestamp: DateTime<Utc>, extension: &str) -> Self {
        let stem = timestamp.format(BACKUP_FORMAT);
        if extension.is_empty() {
            Self(stem.to_string())
        } else {
            Self(format!("{stem}.{extension}"))
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ArchiveName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArchiveName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One stored backup instance.
///
/// Created by a storage backend's write operation, read-only thereafter.
/// Archives are only ever removed by executing a retention plan, never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Name/key unique within the storage target.
    pub name: ArchiveName,
    /// Point in time the archive represents.
    ///
    /// Resolved from file modification time (local backend) or object
    /// metadata (object store backend).
    pub timestamp: DateTime<Utc>,
}

impl Archive {
    /// Creates a new archive record.
    #[must_use]
    pub fn new(name: impl Into<ArchiveName>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }
}

impl PartialOrd for Archive {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Archive {
    /// Orders by timestamp, then by name.
    ///
    /// Ties on identical timestamps resolve by identifier ordering so that
    /// listings and survivor selection are deterministic across runs.
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.timestamp.to_rfc3339())
    }
}
