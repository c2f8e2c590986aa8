//! Checkpoint bands over archive age.
//!
//! An ordered list of checkpoints `[c1 < c2 < ... < cn]` partitions the age
//! axis `[0, ∞)` into `n + 1` half-open bands:
//!
//! | Band | Age interval | Bucket width |
//! |------|-----------------|---------------------------------|
//! | 0 | `[0, c1)` | none (keep everything) |
//! | i | `[c_i, c_{i+1})` | `c_{i+1} - c_i` |
//! | n | `[c_n, ∞)` | `c_n - c_{n-1}` (`c_n` if n = 1) |
//!
//! Every non-negative age falls in exactly one band. Within a band,
//! archives are grouped into `width`-wide buckets counted from the
//! evaluation instant: `bucket_key = age / width`.

use crate::{Error, Result};
use std::time::Duration;

/// The compiled band partition for an ordered checkpoint list.
///
/// Construction validates the strictly-increasing invariant, so any
/// `CheckpointSchedule` in hand describes a gap-free, overlap-free
/// partition of `[0, ∞)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSchedule {
    /// Checkpoint boundaries in seconds, strictly increasing.
    checkpoints: Vec<u64>,
}

impl CheckpointSchedule {
    /// Compiles a schedule from parsed checkpoint durations.
    ///
    /// An empty list is valid and means "no banding": the planner keeps
    /// only the most recent archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCheckpointList`] if the durations are not
    /// strictly increasing.
    pub fn new(checkpoints: Vec<Duration>) -> Result<Self> {
        let seconds: Vec<u64> = checkpoints.iter().map(Duration::as_secs).collect();
        for pair in seconds.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidCheckpointList(
                    "checkpoints must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            checkpoints: seconds,
        })
    }

    /// Returns `true` when no checkpoints are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Number of bands, including band 0 and the final unbounded band.
    #[must_use]
    pub fn band_count(&self) -> usize {
        self.checkpoints.len() + 1
    }

    /// Returns the band index for an archive age in seconds.
    ///
    /// Band 0 is the keep-everything band below the first checkpoint; the
    /// final band is unbounded above the last checkpoint.
    #[must_use]
    pub fn band_of(&self, age_seconds: u64) -> usize {
        self.checkpoints
            .iter()
            .take_while(|&&c| age_seconds >= c)
            .count()
    }

    /// Returns the bucket width in seconds for a band with index >= 1.
    ///
    /// Returns `None` for band 0 (no bucketing) and for out-of-range
    /// indices.
    #[must_use]
    pub fn bucket_width(&self, band: usize) -> Option<u64> {
        let n = self.checkpoints.len();
        if band == 0 || band > n || n == 0 {
            return None;
        }
        if band < n {
            Some(self.checkpoints[band] - self.checkpoints[band - 1])
        } else if n == 1 {
            // Single checkpoint: the unbounded band reuses its boundary.
            Some(self.checkpoints[0])
        } else {
            Some(self.checkpoints[n - 1] - self.checkpoints[n - 2])
        }
    }

    /// Returns the `(band, bucket_key)` pair for an age in seconds.
    ///
    /// Band 0 ages have no bucket; archives there are unconditionally
    /// kept. Buckets are `width`-wide slices counted from the evaluation
    /// instant.
    #[must_use]
    pub fn bucket_of(&self, age_seconds: u64) -> Option<(usize, u64)> {
        let band = self.band_of(age_seconds);
        let width = self.bucket_width(band)?;
        Some((band, age_seconds / width))
    }
}
