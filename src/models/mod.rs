//! Data models for strata.
//!
//! This module contains the core data structures used throughout the system.

mod archive;
mod duration;

pub use archive::{Archive, ArchiveName, BACKUP_FORMAT};
pub use duration::{format_duration, parse_checkpoint_list, parse_duration};
