//! The cycle orchestrator.
//!
//! One cycle: discover the newest local archive, admit it to the storage
//! target, prune local siblings, then compute and execute a retention plan
//! against the target's listing. Loop mode repeats the cycle on a poll
//! interval; cancellation is checked only between cycles, so a started
//! cycle always runs to completion or hard failure. A half-executed plan
//! is safe to resume: re-planning the partially-pruned set simply yields
//! the remaining deletions.
//!
//! The orchestrator receives its storage backend as a constructed
//! instance; it holds no knowledge of which variant it drives.

use crate::config::StrataConfig;
use crate::discovery;
use crate::models::ArchiveName;
use crate::retention::{self, CheckpointSchedule};
use crate::storage::StorageBackend;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Granularity of the interruptible sleep between loop-mode cycles.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Safely converts a `Duration` to milliseconds as u64, capping at
/// `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts a count to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn count_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Result of one orchestrator cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    /// Name the cycle uploaded, if an upload happened.
    pub uploaded: Option<ArchiveName>,
    /// Number of archives deleted (or that would be, under dry-run).
    pub deleted: usize,
    /// Number of planned deletions that failed and were skipped.
    pub delete_failures: usize,
    /// Number of archives kept by the retention plan.
    pub kept: usize,
    /// Whether this was a dry run (no mutations performed).
    pub dry_run: bool,
    /// Duration of the cycle in milliseconds.
    pub duration_ms: u64,
}

impl CycleOutcome {
    /// Returns a human-readable summary of the cycle.
    #[must_use]
    pub fn summary(&self) -> String {
        let action = if self.dry_run { "would delete" } else { "deleted" };
        let upload = self.uploaded.as_ref().map_or_else(
            || "no upload".to_string(),
            |name| format!("uploaded {name}"),
        );
        if self.delete_failures == 0 {
            format!(
                "{upload}, kept {}, {action} {} ({}ms)",
                self.kept, self.deleted, self.duration_ms
            )
        } else {
            format!(
                "{upload}, kept {}, {action} {}, {} failed ({}ms)",
                self.kept, self.deleted, self.delete_failures, self.duration_ms
            )
        }
    }
}

/// Drives upload and retention cycles against one storage target.
///
/// Holds no persistent state: the only thing remembered across cycles is
/// the name uploaded by this process, used to short-circuit repeat
/// discovery of the same archive in loop mode.
pub struct Orchestrator {
    backend: Arc<dyn StorageBackend>,
    backup_dir: PathBuf,
    schedule: CheckpointSchedule,
    poll_interval: Duration,
    dry_run: bool,
    last_uploaded: Option<ArchiveName>,
}

impl Orchestrator {
    /// Creates an orchestrator over an injected storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCheckpointList`] if the configured
    /// checkpoints are not strictly increasing (already guaranteed when
    /// the config came from [`StrataConfig::resolve`]).
    pub fn new(backend: Arc<dyn StorageBackend>, config: &StrataConfig) -> Result<Self> {
        Ok(Self {
            backend,
            backup_dir: config.backup_dir.clone(),
            schedule: CheckpointSchedule::new(config.retention_checkpoints.clone())?,
            poll_interval: Duration::from_secs(config.poll_interval),
            dry_run: config.dry_run,
            last_uploaded: None,
        })
    }

    /// Runs one complete cycle.
    ///
    /// A cycle with no local archive to admit is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the target cannot be
    /// listed and [`Error::WriteFailed`] if the upload fails. Individual
    /// delete failures are logged, counted, and skipped; they never fail
    /// the cycle.
    #[instrument(
        name = "strata.cycle",
        skip(self),
        fields(target = %self.backend.describe(), dry_run = self.dry_run)
    )]
    pub fn run_once(&mut self) -> Result<CycleOutcome> {
        let start = Instant::now();
        let mut outcome = CycleOutcome {
            dry_run: self.dry_run,
            ..CycleOutcome::default()
        };

        let Some(source) = discovery::latest_local_archive(&self.backup_dir)? else {
            debug!(dir = %self.backup_dir.display(), "no backup archives found");
            outcome.duration_ms = duration_to_millis(start.elapsed());
            return Ok(outcome);
        };

        outcome.uploaded = self.admit(&source)?;
        // The target holds the latest archive now (either we just wrote
        // it or it was already there), so local predecessors are
        // superseded regardless of whether this cycle uploaded.
        self.prune_local_siblings(&source);

        let archives = self.backend.list()?;
        let plan = retention::plan(&archives, &self.schedule, Utc::now());
        outcome.kept = plan.keep.len();
        self.execute_deletions(plan.delete, &mut outcome);

        outcome.duration_ms = duration_to_millis(start.elapsed());

        metrics::counter!("cycle_runs_total", "dry_run" => self.dry_run.to_string())
            .increment(1);
        metrics::histogram!("cycle_duration_ms").record(count_to_f64(outcome.duration_ms));

        info!(
            uploaded = outcome.uploaded.as_ref().map(ArchiveName::as_str),
            kept = outcome.kept,
            deleted = outcome.deleted,
            delete_failures = outcome.delete_failures,
            duration_ms = outcome.duration_ms,
            dry_run = self.dry_run,
            "cycle completed"
        );

        Ok(outcome)
    }

    /// Repeats cycles until `cancel` is set.
    ///
    /// Backend and write failures are logged and retried on the next
    /// poll; anything else (a configuration-class error) aborts the loop.
    /// The cancellation flag is honored between cycles and during the
    /// inter-cycle sleep, never mid-cycle.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable errors from [`Self::run_once`].
    pub fn run_loop(&mut self, cancel: &AtomicBool) -> Result<()> {
        while !cancel.load(Ordering::SeqCst) {
            match self.run_once() {
                Ok(outcome) => debug!(summary = %outcome.summary(), "cycle finished"),
                Err(e @ (Error::BackendUnavailable(_) | Error::WriteFailed { .. })) => {
                    error!(error = %e, "cycle failed; retrying on next poll");
                }
                Err(e) => return Err(e),
            }
            self.sleep_until_next_cycle(cancel);
        }
        info!("loop cancelled; exiting cleanly");
        Ok(())
    }

    /// Uploads the discovered archive under its canonical name, skipping
    /// the write when the target already holds it.
    fn admit(&mut self, source: &Path) -> Result<Option<ArchiveName>> {
        let name = canonical_name(source)?;

        if self.last_uploaded.as_ref() == Some(&name) {
            debug!(archive = %name, "no new backup since last cycle");
            return Ok(None);
        }

        if self.backend.exists(&name)? {
            info!(archive = %name, "archive already present at target, skipping upload");
            self.last_uploaded = Some(name);
            return Ok(None);
        }

        if self.dry_run {
            info!(archive = %name, target = %self.backend.describe(), "would upload");
            self.last_uploaded = Some(name.clone());
            return Ok(Some(name));
        }

        let archive = self.backend.write(source, &name)?;
        info!(
            archive = %archive.name,
            timestamp = %archive.timestamp.to_rfc3339(),
            target = %self.backend.describe(),
            "uploaded latest backup"
        );
        self.last_uploaded = Some(archive.name.clone());
        Ok(Some(archive.name))
    }

    /// Removes local archives superseded by the one just admitted.
    ///
    /// Failures here never fail the cycle; the files will be retried next
    /// time.
    fn prune_local_siblings(&self, admitted: &Path) {
        let Ok(entries) = std::fs::read_dir(&self.backup_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.as_path() == admitted || !entry.metadata().is_ok_and(|m| m.is_file()) {
                continue;
            }
            if self.dry_run {
                info!(path = %path.display(), "would remove superseded local backup");
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed superseded local backup"),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove local backup"),
            }
        }
    }

    /// Executes (or, under dry-run, narrates) the plan's delete set.
    fn execute_deletions(
        &self,
        deletions: Vec<retention::PlannedDeletion>,
        outcome: &mut CycleOutcome,
    ) {
        for deletion in deletions {
            if self.dry_run {
                info!(
                    archive = %deletion.archive.name,
                    reason = %deletion.reason,
                    "would delete archive"
                );
                outcome.deleted += 1;
                continue;
            }
            match self.backend.delete(&deletion.archive.name) {
                Ok(()) => {
                    info!(
                        archive = %deletion.archive.name,
                        reason = %deletion.reason,
                        "deleted archive"
                    );
                    outcome.deleted += 1;
                }
                Err(e) => {
                    warn!(
                        archive = %deletion.archive.name,
                        error = %e,
                        "delete failed; continuing with remaining plan"
                    );
                    outcome.delete_failures += 1;
                }
            }
        }

        metrics::counter!("retention_deletions_total")
            .increment(u64::try_from(outcome.deleted).unwrap_or(u64::MAX));
        if outcome.delete_failures > 0 {
            metrics::counter!("retention_delete_failures_total")
                .increment(u64::try_from(outcome.delete_failures).unwrap_or(u64::MAX));
        }
    }

    /// Sleeps one poll interval in slices so cancellation stays
    /// responsive without ever interrupting a cycle.
    fn sleep_until_next_cycle(&self, cancel: &AtomicBool) {
        let deadline = Instant::now() + self.poll_interval;
        while Instant::now() < deadline && !cancel.load(Ordering::SeqCst) {
            std::thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
}

/// Derives the canonical, timestamp-derived archive name for a source
/// file: its modification time in `%Y-%m-%d-%H-%M-%S` form plus the
/// source extension. Stable across re-runs, which makes upload skipping
/// idempotent.
fn canonical_name(source: &Path) -> Result<ArchiveName> {
    let modified = std::fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| Error::WriteFailed {
            name: source.display().to_string(),
            cause: format!("cannot stat source: {e}"),
        })?;
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    Ok(ArchiveName::from_timestamp(
        DateTime::<Utc>::from(modified),
        extension,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Overrides, StrataConfig};
    use crate::models::Archive;
    use std::fs;
    use std::sync::Mutex;
    use std::time::SystemTime;
    use tempfile::TempDir;

    /// In-memory backend stub with scriptable delete failures.
    struct StubBackend {
        archives: Mutex<Vec<Archive>>,
        fail_delete_of: Option<ArchiveName>,
        deletes_attempted: Mutex<Vec<ArchiveName>>,
    }

    impl StubBackend {
        fn with_archives(archives: Vec<Archive>) -> Self {
            Self {
                archives: Mutex::new(archives),
                fail_delete_of: None,
                deletes_attempted: Mutex::new(Vec::new()),
            }
        }
    }

    impl StorageBackend for StubBackend {
        fn list(&self) -> crate::Result<Vec<Archive>> {
            let mut archives = self.archives.lock().expect("lock").clone();
            archives.sort();
            Ok(archives)
        }

        fn write(&self, source: &Path, name: &ArchiveName) -> crate::Result<Archive> {
            let modified = fs::metadata(source)
                .and_then(|m| m.modified())
                .map_err(|e| Error::WriteFailed {
                    name: name.to_string(),
                    cause: e.to_string(),
                })?;
            let archive = Archive::new(name.clone(), DateTime::<Utc>::from(modified));
            self.archives.lock().expect("lock").push(archive.clone());
            Ok(archive)
        }

        fn delete(&self, name: &ArchiveName) -> crate::Result<()> {
            self.deletes_attempted
                .lock()
                .expect("lock")
                .push(name.clone());
            if self.fail_delete_of.as_ref() == Some(name) {
                return Err(Error::DeleteFailed {
                    name: name.to_string(),
                    cause: "injected failure".to_string(),
                });
            }
            self.archives
                .lock()
                .expect("lock")
                .retain(|a| &a.name != name);
            Ok(())
        }

        fn describe(&self) -> String {
            "stub".to_string()
        }
    }

    fn config_for(dir: &Path, checkpoints: &str, dry_run: bool) -> StrataConfig {
        StrataConfig::resolve(
            Overrides {
                backup_dir: Some(dir.to_path_buf()),
                storage_uri: Some("/unused".to_string()),
                retention_checkpoints: Some(checkpoints.to_string()),
                dry_run,
                ..Overrides::default()
            },
            None,
        )
        .expect("resolve")
    }

    fn write_backup(dir: &Path, name: &str, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"payload").expect("write");
        let file = fs::File::options().write(true).open(&path).expect("open");
        file.set_modified(SystemTime::now() - age).expect("set mtime");
        path
    }

    #[test]
    fn test_empty_backup_dir_is_noop() {
        let dir = TempDir::new().expect("tempdir");
        let backend = Arc::new(StubBackend::with_archives(Vec::new()));
        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend.clone(), &config).expect("new");

        let outcome = orchestrator.run_once().expect("cycle");
        assert!(outcome.uploaded.is_none());
        assert_eq!(outcome.deleted, 0);
        assert!(backend.list().expect("list").is_empty());
    }

    #[test]
    fn test_upload_is_skipped_on_rerun() {
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "backup.zip", Duration::from_secs(60));
        let backend = Arc::new(StubBackend::with_archives(Vec::new()));
        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend.clone(), &config).expect("new");

        let first = orchestrator.run_once().expect("cycle");
        assert!(first.uploaded.is_some());
        assert_eq!(backend.list().expect("list").len(), 1);

        let second = orchestrator.run_once().expect("cycle");
        assert!(second.uploaded.is_none());
        assert_eq!(backend.list().expect("list").len(), 1);
    }

    #[test]
    fn test_upload_skipped_when_already_remote() {
        // A fresh orchestrator (no in-process memory) still skips the
        // upload because the canonical name is already present.
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "backup.zip", Duration::from_secs(60));
        let backend = Arc::new(StubBackend::with_archives(Vec::new()));
        let config = config_for(dir.path(), "3h,24h", false);

        let mut first = Orchestrator::new(backend.clone(), &config).expect("new");
        first.run_once().expect("cycle");

        let mut second = Orchestrator::new(backend.clone(), &config).expect("new");
        let outcome = second.run_once().expect("cycle");
        assert!(outcome.uploaded.is_none());
        assert_eq!(backend.list().expect("list").len(), 1);
    }

    #[test]
    fn test_local_siblings_pruned_after_upload() {
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "old.zip", Duration::from_secs(7200));
        let latest = write_backup(dir.path(), "latest.zip", Duration::from_secs(60));
        let backend = Arc::new(StubBackend::with_archives(Vec::new()));
        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend, &config).expect("new");

        orchestrator.run_once().expect("cycle");
        assert!(latest.exists());
        assert!(!dir.path().join("old.zip").exists());
    }

    #[test]
    fn test_dry_run_mutates_nothing() {
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "old.zip", Duration::from_secs(7200));
        write_backup(dir.path(), "latest.zip", Duration::from_secs(60));

        let now = Utc::now();
        let stale = Archive::new("stale-1.zip", now - chrono::Duration::hours(30));
        let staler = Archive::new("stale-2.zip", now - chrono::Duration::hours(40));
        let backend = Arc::new(StubBackend::with_archives(vec![stale, staler]));
        let config = config_for(dir.path(), "3h,24h", true);
        let mut orchestrator = Orchestrator::new(backend.clone(), &config).expect("new");

        let outcome = orchestrator.run_once().expect("cycle");
        assert!(outcome.dry_run);
        assert!(outcome.deleted > 0);
        // Nothing actually changed: remote set intact, local siblings kept.
        assert_eq!(backend.list().expect("list").len(), 2);
        assert!(dir.path().join("old.zip").exists());
        assert!(backend.deletes_attempted.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_one_delete_failure_does_not_stop_the_rest() {
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "latest.zip", Duration::from_secs(60));

        let now = Utc::now();
        // Three archives in the same 21h-wide bucket of band [3h,24h):
        // the newest survives, the two older ones are planned for deletion.
        let a = Archive::new("a.zip", now - chrono::Duration::hours(5));
        let b = Archive::new("b.zip", now - chrono::Duration::hours(10));
        let c = Archive::new("c.zip", now - chrono::Duration::hours(15));
        let mut backend = StubBackend::with_archives(vec![a, b, c]);
        backend.fail_delete_of = Some(ArchiveName::new("b.zip"));
        let backend = Arc::new(backend);

        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend.clone(), &config).expect("new");
        let outcome = orchestrator.run_once().expect("cycle");

        let attempted = backend.deletes_attempted.lock().expect("lock").clone();
        assert!(attempted.contains(&ArchiveName::new("b.zip")));
        assert!(attempted.contains(&ArchiveName::new("c.zip")));
        assert_eq!(outcome.delete_failures, 1);
        assert_eq!(outcome.deleted, 1);
        // The failed archive is still there; the other one is gone.
        let remaining = backend.list().expect("list");
        assert!(remaining.iter().any(|x| x.name.as_str() == "b.zip"));
        assert!(!remaining.iter().any(|x| x.name.as_str() == "c.zip"));
    }

    #[test]
    fn test_rerun_after_partial_failure_converges() {
        let dir = TempDir::new().expect("tempdir");
        write_backup(dir.path(), "latest.zip", Duration::from_secs(60));

        let now = Utc::now();
        let a = Archive::new("a.zip", now - chrono::Duration::hours(5));
        let b = Archive::new("b.zip", now - chrono::Duration::hours(10));
        let mut backend = StubBackend::with_archives(vec![a, b]);
        backend.fail_delete_of = Some(ArchiveName::new("b.zip"));
        let backend = Arc::new(backend);

        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend.clone(), &config).expect("new");
        let first = orchestrator.run_once().expect("cycle");
        assert_eq!(first.delete_failures, 1);

        // Next cycle re-plans the partially-pruned set and retries only
        // what is still in excess.
        let second = orchestrator.run_once().expect("cycle");
        assert_eq!(second.delete_failures, 1);
        let attempted = backend.deletes_attempted.lock().expect("lock").clone();
        assert_eq!(
            attempted,
            vec![ArchiveName::new("b.zip"), ArchiveName::new("b.zip")]
        );
    }

    #[test]
    fn test_cycle_outcome_summary() {
        let outcome = CycleOutcome {
            uploaded: Some(ArchiveName::new("2024-01-01-00-00-00.zip")),
            deleted: 3,
            delete_failures: 1,
            kept: 7,
            dry_run: false,
            duration_ms: 42,
        };
        let summary = outcome.summary();
        assert!(summary.contains("uploaded 2024-01-01-00-00-00.zip"));
        assert!(summary.contains("deleted 3"));
        assert!(summary.contains("1 failed"));
    }

    #[test]
    fn test_loop_stops_when_cancelled() {
        let dir = TempDir::new().expect("tempdir");
        let backend = Arc::new(StubBackend::with_archives(Vec::new()));
        let config = config_for(dir.path(), "3h,24h", false);
        let mut orchestrator = Orchestrator::new(backend, &config).expect("new");

        let cancel = AtomicBool::new(true);
        // Pre-cancelled: the loop must exit before running any cycle.
        orchestrator.run_loop(&cancel).expect("clean exit");
    }
}
