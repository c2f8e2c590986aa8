//! The retention pruning planner.
//!
//! Given the current archive set, a checkpoint schedule, and an evaluation
//! instant, computes which archives survive and which are deleted. Band 0
//! archives are always kept; every older archive competes within its
//! `(band, bucket)` group, where exactly the newest group member survives.
//!
//! The planner never touches storage. Archive existence is owned by the
//! storage backend; this module only partitions a listing it is handed.

use crate::models::{Archive, format_duration};
use crate::retention::CheckpointSchedule;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// One archive marked for deletion, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    /// The archive to delete.
    pub archive: Archive,
    /// Why the archive lost its bucket slot.
    pub reason: String,
}

/// The keep/delete partition computed for one evaluation instant.
///
/// Invariant: `keep` and `delete` are disjoint and together contain every
/// input archive. Both are sorted ascending by `(timestamp, name)` so plan
/// output is deterministic across runs.
#[derive(Debug, Clone, Default)]
pub struct RetentionPlan {
    /// Archives that survive this evaluation.
    pub keep: Vec<Archive>,
    /// Archives to delete, each with a reason.
    pub delete: Vec<PlannedDeletion>,
}

impl RetentionPlan {
    /// Returns `true` when the plan deletes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty()
    }

    /// Returns a human-readable summary of the plan.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} kept, {} to delete of {} archives",
            self.keep.len(),
            self.delete.len(),
            self.keep.len() + self.delete.len()
        )
    }
}

/// Computes the retention plan for `archives` as of `now`.
///
/// The planner is stateless and idempotent: running it again on the `keep`
/// set of its own output (same schedule, same `now`) yields an empty delete
/// set. It never fails on well-formed input; malformed checkpoint
/// configurations are rejected earlier, at parse time. An empty archive set
/// yields an empty plan.
///
/// Archives whose timestamp lies in the future of `now` (clock skew) are
/// logged as anomalous and unconditionally kept; deletion decisions are
/// never based on skewed data.
#[must_use]
pub fn plan(
    archives: &[Archive],
    schedule: &CheckpointSchedule,
    now: DateTime<Utc>,
) -> RetentionPlan {
    let mut result = RetentionPlan::default();
    if archives.is_empty() {
        return result;
    }

    if schedule.is_empty() {
        plan_without_checkpoints(archives, &mut result);
        return result;
    }

    // Group prunable archives by (band, bucket_key). Band 0 and skewed
    // archives go straight to `keep`.
    let mut buckets: HashMap<(usize, u64), Vec<&Archive>> = HashMap::new();
    for archive in archives {
        let age_seconds = (now - archive.timestamp).num_seconds();
        let Ok(age_seconds) = u64::try_from(age_seconds) else {
            warn!(
                archive = %archive.name,
                timestamp = %archive.timestamp.to_rfc3339(),
                "archive timestamp is in the future; keeping it unexamined"
            );
            result.keep.push(archive.clone());
            continue;
        };

        match schedule.bucket_of(age_seconds) {
            None => result.keep.push(archive.clone()),
            Some(bucket) => buckets.entry(bucket).or_default().push(archive),
        }
    }

    // Within each bucket exactly one archive survives: the newest, with
    // ties on identical timestamps going to the greatest name.
    for ((band, _), members) in buckets {
        let Some(survivor) = members.iter().copied().max() else {
            continue;
        };
        let width = schedule.bucket_width(band).unwrap_or_default();
        for archive in &members {
            if archive.name == survivor.name {
                result.keep.push((*archive).clone());
            } else {
                result.delete.push(PlannedDeletion {
                    archive: (*archive).clone(),
                    reason: format!(
                        "retention bucket of {}: a newer archive already covers this interval",
                        format_duration(Duration::from_secs(width))
                    ),
                });
            }
        }
    }

    result.keep.sort();
    result.delete.sort_by(|a, b| a.archive.cmp(&b.archive));
    result
}

/// No checkpoints configured: only the most recent archive survives.
fn plan_without_checkpoints(archives: &[Archive], result: &mut RetentionPlan) {
    let Some(newest) = archives.iter().max() else {
        return;
    };
    for archive in archives {
        if archive.name == newest.name {
            result.keep.push(archive.clone());
        } else {
            result.delete.push(PlannedDeletion {
                archive: archive.clone(),
                reason: "no retention checkpoints configured; keeping only the most recent archive"
                    .to_string(),
            });
        }
    }
    result.keep.sort();
    result.delete.sort_by(|a, b| a.archive.cmp(&b.archive));
}
