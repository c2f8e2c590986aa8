//! Configuration management.
//!
//! Options come from two layers: a TOML config file and command-line
//! flags, with flags winning. The resolved [`StrataConfig`] is validated
//! before any cycle runs; configuration errors are fatal and exit before
//! the storage target is touched.

use crate::models::parse_checkpoint_list;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default seconds between cycles in loop mode.
pub const DEFAULT_POLL_INTERVAL: u64 = 60;

/// Where a cycle's archives are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// A directory on the local filesystem.
    Local {
        /// Directory holding the archives.
        path: PathBuf,
    },
    /// An S3-compatible object store.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional key prefix under the bucket.
        prefix: Option<String>,
    },
}

impl StorageTarget {
    /// Parses a storage URI: `s3://bucket/prefix`, `file:///path`, or a
    /// bare filesystem path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unsupported scheme or an S3
    /// URI without a bucket.
    pub fn parse(uri: &str) -> Result<Self> {
        if let Some(rest) = uri.strip_prefix("s3://") {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, Some(prefix.trim_matches('/'))),
                None => (rest, None),
            };
            if bucket.is_empty() {
                return Err(Error::InvalidConfig(
                    "S3 URI must include a bucket name".to_string(),
                ));
            }
            return Ok(Self::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            });
        }

        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(Self::Local {
                path: PathBuf::from(path),
            });
        }

        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(Error::InvalidConfig(format!(
                "unsupported storage scheme: {scheme}"
            )));
        }

        Ok(Self::Local {
            path: PathBuf::from(uri),
        })
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct StrataConfig {
    /// Directory where backup archives are produced locally.
    pub backup_dir: PathBuf,
    /// Storage target for uploaded archives.
    pub storage: StorageTarget,
    /// Named AWS shared-credentials profile.
    pub aws_profile: Option<String>,
    /// AWS region for the S3 client.
    pub aws_region: Option<String>,
    /// Run continuously instead of a single cycle.
    pub loop_mode: bool,
    /// Seconds between cycles in loop mode.
    pub poll_interval: u64,
    /// Parsed retention checkpoints, strictly increasing.
    pub retention_checkpoints: Vec<Duration>,
    /// Report planned actions without mutating storage.
    pub dry_run: bool,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory where backup archives are produced.
    pub backup_dir: Option<String>,
    /// Storage target URI.
    pub storage_uri: Option<String>,
    /// AWS profile name.
    pub aws_profile: Option<String>,
    /// AWS region.
    pub aws_region: Option<String>,
    /// Loop mode.
    #[serde(rename = "loop")]
    pub loop_mode: Option<bool>,
    /// Poll interval in seconds.
    pub poll_interval: Option<u64>,
    /// Comma-separated checkpoint list, e.g. `"3h,24h,7d,30d"`.
    pub retention_checkpoints: Option<String>,
    /// Dry-run mode.
    pub dry_run: Option<bool>,
}

impl ConfigFile {
    /// Loads a config file from a path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the file cannot be read or
    /// parsed as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfig(format!("cannot parse config file {}: {e}", path.display()))
        })
    }

    /// Loads the config file from the default location, if one exists.
    ///
    /// Checks the platform config dir (`~/.config/strata/config.toml` on
    /// Linux) and returns `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] only when a file exists but cannot
    /// be parsed; a missing file is not an error.
    pub fn load_default() -> Result<Option<Self>> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(None);
        };
        let path = base_dirs.config_dir().join("strata").join("config.toml");
        if path.exists() {
            return Self::load(&path).map(Some);
        }
        Ok(None)
    }
}

/// Command-line values layered over the config file (flags win).
#[derive(Debug, Default)]
pub struct Overrides {
    /// `--backup-dir`.
    pub backup_dir: Option<PathBuf>,
    /// `--storage`.
    pub storage_uri: Option<String>,
    /// `--aws-profile`.
    pub aws_profile: Option<String>,
    /// `--aws-region`.
    pub aws_region: Option<String>,
    /// `--loop` / `--no-loop`; `None` defers to the file.
    pub loop_mode: Option<bool>,
    /// `--poll-interval`.
    pub poll_interval: Option<u64>,
    /// `--retention-checkpoints`.
    pub retention_checkpoints: Option<String>,
    /// `--dry-run`.
    pub dry_run: bool,
}

impl StrataConfig {
    /// Merges CLI overrides over an optional config file and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `backup_dir` or the storage
    /// URI is supplied by neither layer, when `poll_interval` is zero, or
    /// when the storage URI is malformed. Checkpoint parsing surfaces
    /// [`Error::InvalidCheckpointList`] / [`Error::InvalidDuration`] as
    /// produced by the duration parser.
    pub fn resolve(overrides: Overrides, file: Option<ConfigFile>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let backup_dir = overrides
            .backup_dir
            .or_else(|| file.backup_dir.map(PathBuf::from))
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "backup_dir must be supplied via CLI or config file".to_string(),
                )
            })?;

        let storage_uri = overrides
            .storage_uri
            .or(file.storage_uri)
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "storage URI must be supplied via CLI or config file".to_string(),
                )
            })?;

        let poll_interval = overrides
            .poll_interval
            .or(file.poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval must be a positive number of seconds".to_string(),
            ));
        }

        let retention_checkpoints = overrides
            .retention_checkpoints
            .or(file.retention_checkpoints)
            .map(|s| parse_checkpoint_list(&s))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            backup_dir,
            storage: StorageTarget::parse(&storage_uri)?,
            aws_profile: overrides.aws_profile.or(file.aws_profile),
            aws_region: overrides.aws_region.or(file.aws_region),
            loop_mode: overrides.loop_mode.or(file.loop_mode).unwrap_or(false),
            poll_interval,
            retention_checkpoints,
            dry_run: overrides.dry_run || file.dry_run.unwrap_or(false),
        })
    }
}
