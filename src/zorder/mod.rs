//! Z-Order Module
//!
//! Multi-dimensional clustering: rows are keyed by interleaving the bits of
//! several normalized columns (a Morton curve), sorted by that key and
//! rewritten into size-bounded files.
//!
//! ## Key Layout (2 dimensions, 3 bits each)
//! ```text
//!   bit:   5    4    3    2    1    0
//!        ┌────┬────┬────┬────┬────┬────┐
//!        │ y2 │ x2 │ y1 │ x1 │ y0 │ x0 │
//!        └────┴────┴────┴────┴────┴────┘
//! ```

mod interleave;
mod normalize;
mod optimizer;

pub use interleave::{deinterleave_bits, interleave_bits};
pub use normalize::{
    fnv1a_64, low_bits_mask, normalize_column, normalize_float, normalize_int, normalize_str,
    normalize_timestamp, SECONDS_PER_YEAR,
};
pub use optimizer::{partition_rows, OptimizeReport, ZOrderOptimizer, ZOrderedRow};

/// Bits kept per dimension; three dimensions fit in one 64-bit key
pub const DEFAULT_BITS_PER_DIM: u32 = 21;

/// Estimated encoded bytes per row when sizing output files
pub const DEFAULT_ROW_SIZE_ESTIMATE: u64 = 100;
