//! S3-compatible object store backend.
//!
//! Archive timestamps come from the objects' `LastModified` metadata.
//! The AWS SDK is async; this backend owns a small tokio runtime and
//! resolves every SDK future before returning, so the trait surface stays
//! blocking and cycles remain single-threaded.

use crate::models::{Archive, ArchiveName};
use crate::storage::StorageBackend;
use crate::{Error, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

/// Object-store storage backend.
pub struct S3Backend {
    client: Client,
    bucket: String,
    /// Key prefix with no trailing slash, if configured.
    prefix: Option<String>,
    runtime: Runtime,
}

impl S3Backend {
    /// Connects to the object store described by the configuration.
    ///
    /// Credentials resolve through the standard AWS provider chain; an
    /// explicit named profile and region override the chain's defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the runtime or client
    /// cannot be initialized.
    pub fn connect(
        bucket: &str,
        prefix: Option<&str>,
        aws_profile: Option<&str>,
        aws_region: Option<&str>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::BackendUnavailable(format!("cannot start runtime: {e}")))?;

        let client = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(profile) = aws_profile {
                loader = loader.profile_name(profile);
            }
            if let Some(region) = aws_region {
                loader = loader.region(Region::new(region.to_string()));
            }
            Client::new(&loader.load().await)
        });

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            runtime,
        })
    }

    /// Returns the full object key for an archive name.
    fn object_key(&self, name: &ArchiveName) -> String {
        join_key(self.prefix.as_deref(), name.as_str())
    }

    /// Returns the listing prefix, terminated with `/` when present.
    fn listing_prefix(&self) -> Option<String> {
        self.prefix.as_ref().map(|p| format!("{p}/"))
    }
}

/// Joins an optional prefix and an archive name into an object key.
fn join_key(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}/{name}"),
        None => name.to_string(),
    }
}

impl StorageBackend for S3Backend {
    fn list(&self) -> Result<Vec<Archive>> {
        let listing_prefix = self.listing_prefix();
        let mut archives = Vec::new();

        self.runtime.block_on(async {
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(listing_prefix.clone())
                .into_paginator()
                .send();

            while let Some(page) = pages.next().await {
                let page = page.map_err(|e| {
                    Error::BackendUnavailable(format!(
                        "failed to list s3://{}: {e}",
                        self.bucket
                    ))
                })?;

                for object in page.contents() {
                    let Some(key) = object.key() else {
                        continue;
                    };
                    let name = listing_prefix
                        .as_deref()
                        .and_then(|p| key.strip_prefix(p))
                        .unwrap_or(key);
                    if name.is_empty() || name.contains('/') {
                        debug!(key, "skipping object outside the archive namespace");
                        continue;
                    }
                    let Some(timestamp) = object
                        .last_modified()
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                    else {
                        debug!(key, "skipping object without a LastModified timestamp");
                        continue;
                    };
                    archives.push(Archive::new(name, timestamp));
                }
            }

            Ok::<(), Error>(())
        })?;

        archives.sort();
        Ok(archives)
    }

    fn write(&self, source: &Path, name: &ArchiveName) -> Result<Archive> {
        let key = self.object_key(name);
        let write_failed = |cause: String| Error::WriteFailed {
            name: name.to_string(),
            cause,
        };

        let source_modified = std::fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(|e| write_failed(format!("cannot stat source {}: {e}", source.display())))?;

        self.runtime.block_on(async {
            let body = ByteStream::from_path(source)
                .await
                .map_err(|e| write_failed(format!("cannot read {}: {e}", source.display())))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    write_failed(format!("upload to s3://{}/{key} failed: {e}", self.bucket))
                })?;

            Ok::<(), Error>(())
        })?;

        Ok(Archive::new(
            name.clone(),
            DateTime::<Utc>::from(source_modified),
        ))
    }

    fn delete(&self, name: &ArchiveName) -> Result<()> {
        let key = self.object_key(name);
        self.runtime.block_on(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Error::DeleteFailed {
                    name: name.to_string(),
                    cause: format!("s3://{}/{key}: {e}", self.bucket),
                })?;
            Ok(())
        })
    }

    fn exists(&self, name: &ArchiveName) -> Result<bool> {
        let key = self.object_key(name);
        self.runtime.block_on(async {
            match self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => Ok(true),
                Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
                Err(e) => Err(Error::BackendUnavailable(format!(
                    "cannot check s3://{}/{key}: {e}",
                    self.bucket
                ))),
            }
        })
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("s3://{}/{prefix}", self.bucket),
            None => format!("s3://{}", self.bucket),
        }
    }
}
