//! # Strata
//!
//! A tiered retention manager for point-in-time backup archives.
//!
//! Strata uploads the newest locally-produced backup archive to a storage
//! target (local directory or S3-compatible object store) and prunes older
//! archives there according to a multi-resolution retention policy: recent
//! history is kept at full granularity, older history is progressively
//! thinned into widening age buckets with exactly one survivor per bucket.
//!
//! ## Features
//!
//! - Pure, stateless retention planner — fully unit-testable without I/O
//! - Polymorphic storage backends (local filesystem, S3) behind one trait
//! - Idempotent cycles: re-runs upload nothing twice and converge to a
//!   fixed point where the delete set is empty
//! - Single-shot or loop mode with clean cycle-boundary cancellation
//! - Dry-run mode that reports every intended action without mutating
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata::{parse_checkpoint_list, CheckpointSchedule, retention};
//! use chrono::Utc;
//!
//! let checkpoints = parse_checkpoint_list("3h,24h,7d,30d")?;
//! let schedule = CheckpointSchedule::new(checkpoints);
//! let plan = retention::plan(&archives, &schedule, Utc::now());
//! for deletion in &plan.delete {
//!     println!("pruning {}: {}", deletion.archive.name, deletion.reason);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod cycle;
pub mod discovery;
pub mod models;
pub mod observability;
pub mod retention;
pub mod storage;

// Re-exports for convenience
pub use config::{ConfigFile, StorageTarget, StrataConfig};
pub use cycle::{CycleOutcome, Orchestrator};
pub use models::{Archive, ArchiveName, format_duration, parse_checkpoint_list, parse_duration};
pub use retention::{CheckpointSchedule, PlannedDeletion, RetentionPlan};
pub use storage::{LocalBackend, S3Backend, StorageBackend};

/// Error type for strata operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidDuration` | A duration string has an unknown suffix, a non-positive value, or is malformed |
/// | `InvalidCheckpointList` | A checkpoint entry fails to parse or the list is not strictly increasing |
/// | `InvalidConfig` | Required options are missing or a config file/URI cannot be parsed |
/// | `BackendUnavailable` | The storage target cannot be listed (connectivity, auth, permissions) |
/// | `WriteFailed` | An archive upload/copy fails (I/O, permissions, quota) |
/// | `DeleteFailed` | A planned deletion fails (missing object, permissions) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A duration string could not be parsed.
    ///
    /// Raised when:
    /// - The unit suffix is not one of `s`, `m`, `h`, `d`, `w`
    /// - The numeric part is missing, malformed, or non-positive
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration {
        /// The offending input string.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A checkpoint list could not be parsed.
    ///
    /// Raised when:
    /// - Any entry fails duration parsing
    /// - The parsed durations are not strictly increasing
    #[error("invalid checkpoint list: {0}")]
    InvalidCheckpointList(String),

    /// Configuration is missing or invalid.
    ///
    /// Raised when:
    /// - `backup_dir` or `storage_uri` is supplied by neither CLI nor file
    /// - The config file cannot be read or parsed as TOML
    /// - The storage URI uses an unsupported scheme
    /// - `poll_interval` is zero
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The storage backend could not be reached.
    ///
    /// Fatal for the current cycle; loop mode retries on the next poll.
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An archive write (copy or upload) failed.
    #[error("failed to write archive '{name}': {cause}")]
    WriteFailed {
        /// The archive name being written.
        name: String,
        /// The underlying cause.
        cause: String,
    },

    /// An archive deletion failed.
    ///
    /// The orchestrator logs and skips this per-archive; it never aborts the
    /// remaining plan execution.
    #[error("failed to delete archive '{name}': {cause}")]
    DeleteFailed {
        /// The archive name being deleted.
        name: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for strata operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDuration {
            input: "7x".to_string(),
            reason: "unsupported suffix".to_string(),
        };
        assert_eq!(err.to_string(), "invalid duration '7x': unsupported suffix");

        let err = Error::InvalidCheckpointList("must be strictly increasing".to_string());
        assert_eq!(
            err.to_string(),
            "invalid checkpoint list: must be strictly increasing"
        );

        let err = Error::DeleteFailed {
            name: "2024-01-01-00-00-00.zip".to_string(),
            cause: "access denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to delete archive '2024-01-01-00-00-00.zip': access denied"
        );
    }
}
