//! # AtlasTable
//!
//! Table storage engine for a small SQL database:
//! - Append-only transaction log of file add/remove actions
//! - Crash recovery with torn-tail truncation
//! - Small-file compaction, on demand or on a background timer
//! - Z-order (Morton) clustering over several columns
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            Engine                             │
//! │               (insert / snapshot / scan / admin)              │
//! └───────┬─────────────────────────┬─────────────────────┬───────┘
//!         │                         │                     │
//!         ▼                         ▼                     ▼
//! ┌───────────────┐        ┌────────────────┐    ┌─────────────────┐
//! │   Compactor   │◄───────│  AutoCompactor │    │ ZOrderOptimizer │
//! │ (small files) │        │  (tick loop)   │    │  (clustering)   │
//! └───────┬───────┘        └────────────────┘    └────────┬────────┘
//!         │                                               │
//!         ├───────────────────────┬───────────────────────┤
//!         ▼                       ▼                       │
//! ┌───────────────┐        ┌────────────────┐             │
//! │    FileLog    │        │ ColumnarCodec  │◄────────────┘
//! │    (txlog)    │        │   (parquet)    │
//! └───────────────┘        └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod table;

pub mod codec;
pub mod txlog;
pub mod compaction;
pub mod zorder;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::{CompactionConfig, Config, LogSyncStrategy, ZOrderConfig};
pub use table::TableId;
pub use codec::{ColumnarCodec, ParquetCodec, ParquetFile, TableSchema};
pub use txlog::{Action, DiskFileLog, FileLog, MemoryFileLog, Snapshot};
pub use compaction::{AutoCompactor, AutoCompactorHandle, CompactionReport, Compactor};
pub use zorder::{OptimizeReport, ZOrderOptimizer};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasTable
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
