//! Property-based tests for the retention planner.
//!
//! Uses proptest to verify the planner's invariants across random
//! checkpoint lists and archive sets:
//! - keep and delete partition the input (union = input, disjoint)
//! - re-planning an already-pruned set is a fixed point
//! - archives younger than the first checkpoint are never deleted
//! - every bucket's survivor has the minimum age in that bucket

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use strata::retention::{self, CheckpointSchedule};
use strata::{Archive, RetentionPlan};

/// Fixed evaluation instant so generated ages are reproducible.
fn eval_instant() -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000, 0).single().unwrap()
}

/// Strictly increasing checkpoint lists, 1 to 5 entries, in hours.
fn checkpoint_hours() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::btree_set(1u64..=2_000, 1..=5)
        .prop_map(|set| set.into_iter().collect())
}

/// Archive sets with distinct names and ages up to ~2 years, in minutes.
fn archive_ages_minutes() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(0u64..=1_000_000, 0..=40)
}

fn schedule_from_hours(hours: &[u64]) -> CheckpointSchedule {
    let durations: Vec<Duration> = hours
        .iter()
        .map(|h| Duration::from_secs(h * 3600))
        .collect();
    CheckpointSchedule::new(durations).expect("strictly increasing by construction")
}

fn archives_from_ages(now: DateTime<Utc>, ages_minutes: &[u64]) -> Vec<Archive> {
    ages_minutes
        .iter()
        .enumerate()
        .map(|(i, minutes)| {
            let ts = now - chrono::Duration::minutes(i64::try_from(*minutes).unwrap());
            Archive::new(format!("archive-{i:04}.zip"), ts)
        })
        .collect()
}

fn names(archives: &[Archive]) -> BTreeSet<String> {
    archives.iter().map(|a| a.name.to_string()).collect()
}

fn plan_for(ages_minutes: &[u64], hours: &[u64]) -> (Vec<Archive>, RetentionPlan) {
    let now = eval_instant();
    let archives = archives_from_ages(now, ages_minutes);
    let schedule = schedule_from_hours(hours);
    let plan = retention::plan(&archives, &schedule, now);
    (archives, plan)
}

proptest! {
    /// Property: keep ∪ delete = input and keep ∩ delete = ∅.
    #[test]
    fn prop_plan_partitions_input(
        ages in archive_ages_minutes(),
        hours in checkpoint_hours()
    ) {
        let (archives, plan) = plan_for(&ages, &hours);

        let kept = names(&plan.keep);
        let deleted: BTreeSet<String> =
            plan.delete.iter().map(|d| d.archive.name.to_string()).collect();

        prop_assert!(kept.is_disjoint(&deleted));
        let mut union = kept.clone();
        union.extend(deleted);
        prop_assert_eq!(union, names(&archives));
    }

    /// Property: the planner is a fixed point on its own keep set.
    #[test]
    fn prop_plan_is_idempotent(
        ages in archive_ages_minutes(),
        hours in checkpoint_hours()
    ) {
        let now = eval_instant();
        let archives = archives_from_ages(now, &ages);
        let schedule = schedule_from_hours(&hours);

        let first = retention::plan(&archives, &schedule, now);
        let second = retention::plan(&first.keep, &schedule, now);

        prop_assert!(second.delete.is_empty());
        prop_assert_eq!(names(&second.keep), names(&first.keep));
    }

    /// Property: archives younger than the first checkpoint survive.
    #[test]
    fn prop_band_zero_is_never_deleted(
        ages in archive_ages_minutes(),
        hours in checkpoint_hours()
    ) {
        let (_, plan) = plan_for(&ages, &hours);

        let first_checkpoint_secs = hours[0] * 3600;
        let now = eval_instant();
        for deletion in &plan.delete {
            let age_secs = (now - deletion.archive.timestamp).num_seconds();
            prop_assert!(
                u64::try_from(age_secs).unwrap() >= first_checkpoint_secs,
                "deleted archive aged {age_secs}s is inside the keep-all band"
            );
        }
    }

    /// Property: within every (band, bucket) group, the survivor is the
    /// newest member.
    #[test]
    fn prop_bucket_survivor_has_minimum_age(
        ages in archive_ages_minutes(),
        hours in checkpoint_hours()
    ) {
        let now = eval_instant();
        let archives = archives_from_ages(now, &ages);
        let schedule = schedule_from_hours(&hours);
        let plan = retention::plan(&archives, &schedule, now);

        let kept = names(&plan.keep);

        // Recompute each archive's bucket with the schedule's own math.
        let mut groups: HashMap<(usize, u64), Vec<&Archive>> = HashMap::new();
        for archive in &archives {
            let age = u64::try_from((now - archive.timestamp).num_seconds()).unwrap();
            if let Some(bucket) = schedule.bucket_of(age) {
                groups.entry(bucket).or_default().push(archive);
            }
        }

        for members in groups.values() {
            let survivor = members.iter().copied().max().unwrap();
            let survivors: Vec<_> = members
                .iter()
                .filter(|a| kept.contains(a.name.as_str()))
                .collect();
            prop_assert_eq!(survivors.len(), 1, "exactly one survivor per bucket");
            prop_assert_eq!(survivors[0].name.as_str(), survivor.name.as_str());
        }
    }

    /// Property: archives with future timestamps are always kept.
    #[test]
    fn prop_future_archives_are_kept(
        ages in archive_ages_minutes(),
        skew_minutes in 1u64..=10_000,
        hours in checkpoint_hours()
    ) {
        let now = eval_instant();
        let mut archives = archives_from_ages(now, &ages);
        let skewed_ts = now + chrono::Duration::minutes(i64::try_from(skew_minutes).unwrap());
        archives.push(Archive::new("skewed.zip", skewed_ts));

        let schedule = schedule_from_hours(&hours);
        let plan = retention::plan(&archives, &schedule, now);

        prop_assert!(names(&plan.keep).contains("skewed.zip"));
    }

    /// Property: with no checkpoints, exactly one archive survives any
    /// non-empty input.
    #[test]
    fn prop_empty_checkpoints_keep_exactly_one(
        ages in proptest::collection::vec(0u64..=1_000_000, 1..=40)
    ) {
        let now = eval_instant();
        let archives = archives_from_ages(now, &ages);
        let schedule = CheckpointSchedule::new(Vec::new()).expect("empty is valid");
        let plan = retention::plan(&archives, &schedule, now);

        prop_assert_eq!(plan.keep.len(), 1);
        prop_assert_eq!(plan.delete.len(), archives.len() - 1);
    }
}
