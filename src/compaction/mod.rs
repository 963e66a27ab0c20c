//! Compaction Module
//!
//! Small-file compaction and its background scheduler.
//!
//! ## Responsibilities
//! - Pick a table's undersized files and merge them into one
//! - Retire the merged files and record the new one in the log
//! - Sweep every table on a fixed interval until stopped or cancelled

mod compactor;
mod scheduler;

pub use compactor::{CompactionReport, Compactor};
pub use scheduler::{AutoCompactor, AutoCompactorHandle};
