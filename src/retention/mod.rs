//! Retention policy: checkpoint bands and the pruning planner.
//!
//! The planner is a pure function from `(archive set, checkpoint schedule,
//! evaluation instant)` to a keep/delete partition. It owns no I/O and no
//! state; every invocation recomputes the plan from scratch, so re-running
//! it on an already-pruned set is a fixed point with an empty delete set.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata::retention::{self, CheckpointSchedule};
//! use strata::parse_checkpoint_list;
//! use chrono::Utc;
//!
//! let schedule = CheckpointSchedule::new(parse_checkpoint_list("3h,24h,7d,30d")?)?;
//! let plan = retention::plan(&archives, &schedule, Utc::now());
//! assert_eq!(plan.keep.len() + plan.delete.len(), archives.len());
//! ```

mod planner;
mod schedule;

pub use planner::{PlannedDeletion, RetentionPlan, plan};
pub use schedule::CheckpointSchedule;
