//! Storage backend abstraction.
//!
//! A storage backend owns archive existence at one target: it can list the
//! archives currently present, admit a new one, and delete by name. Two
//! variants implement the same contract:
//!
//! - [`LocalBackend`] — a directory on the local filesystem
//! - [`S3Backend`] — an S3-compatible object store
//!
//! The variant is selected at configuration time from the storage URI and
//! handed to the orchestrator as `Arc<dyn StorageBackend>`; nothing else in
//! the system knows which one it got.

mod local;
mod s3;

pub use local::LocalBackend;
pub use s3::S3Backend;

use crate::config::{StorageTarget, StrataConfig};
use crate::models::{Archive, ArchiveName};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Contract shared by all storage variants.
///
/// Side effects are the sole purpose of this trait; implementations hold no
/// cross-call state beyond their connection configuration. All calls block
/// until the operation completes.
pub trait StorageBackend: Send + Sync {
    /// Lists every archive present at the target, sorted ascending by
    /// `(timestamp, name)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BackendUnavailable`] on connectivity or
    /// permission failure.
    fn list(&self) -> Result<Vec<Archive>>;

    /// Copies/uploads `source` to the target under `name`, overwriting any
    /// existing archive with that name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteFailed`] on I/O error, permission
    /// error, or space exhaustion.
    fn write(&self, source: &Path, name: &ArchiveName) -> Result<Archive>;

    /// Removes the named archive.
    ///
    /// A missing object is an error; the caller decides whether that is
    /// tolerable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeleteFailed`] if the archive does not exist
    /// or cannot be removed.
    fn delete(&self, name: &ArchiveName) -> Result<()>;

    /// Checks whether an archive with the given name is present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BackendUnavailable`] if the target cannot be
    /// queried.
    fn exists(&self, name: &ArchiveName) -> Result<bool> {
        Ok(self.list()?.iter().any(|a| &a.name == name))
    }

    /// Returns a display form of the target for logs.
    fn describe(&self) -> String;
}

/// Constructs the backend selected by the configured storage target.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidConfig`] if the local directory cannot be
/// created, or [`crate::Error::BackendUnavailable`] if the S3 client cannot
/// be initialized.
pub fn backend_for_target(config: &StrataConfig) -> Result<Arc<dyn StorageBackend>> {
    match &config.storage {
        StorageTarget::Local { path } => Ok(Arc::new(LocalBackend::with_create(path)?)),
        StorageTarget::S3 { bucket, prefix } => Ok(Arc::new(S3Backend::connect(
            bucket,
            prefix.as_deref(),
            config.aws_profile.as_deref(),
            config.aws_region.as_deref(),
        )?)),
    }
}
