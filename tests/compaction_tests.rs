//! Tests for small-file compaction
//!
//! These tests verify:
//! - N small files merge into exactly one file with every row kept
//! - The log records N removes followed by one add
//! - No-op passes leave the log untouched
//! - Unreadable files are skipped but still retired
//! - Files that no longer fit the table schema stay live
//! - Log append failures are counted, not fatal

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow::array::Array;
use atlastable::codec::{ColumnSchema, ColumnType, ParquetCodec};
use atlastable::txlog::{Action, FileLog, MemoryFileLog};
use atlastable::{AtlasError, CompactionConfig, Compactor};
use tempfile::TempDir;

use common::*;

const KB: u64 = 1024;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(min_file_size: u64, max_files_to_compact: usize) -> CompactionConfig {
    CompactionConfig {
        target_file_size: 1024 * 1024 * 1024,
        min_file_size,
        max_files_to_compact,
        check_interval: Duration::from_secs(300),
    }
}

fn setup(config: CompactionConfig) -> (TempDir, Arc<MemoryFileLog>, Arc<ParquetCodec>, Compactor) {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(MemoryFileLog::new());
    let codec = Arc::new(ParquetCodec::new());
    let compactor = Compactor::new(log.clone(), codec.clone(), temp.path(), config).unwrap();
    (temp, log, codec, compactor)
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_compact_five_small_files_into_one() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    log.append_schema(&table, &orders_schema()).unwrap();
    let inputs = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 5, 20, Some(KB));
    let before = log.latest_version(&table).unwrap();

    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.selected, 5);
    assert_eq!(report.merged, 5);
    assert_eq!(report.unreadable, 0);
    assert_eq!(report.log_failures, 0);

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.total_rows(), 100);
    assert_eq!(ids(&read_all(codec.as_ref(), &snapshot)), (0..100).collect::<Vec<_>>());

    // 5 removes in log order, then 1 add
    let actions = actions_after(log.as_ref(), &table, before);
    assert_eq!(actions.len(), 6);
    for (action, input) in actions.iter().zip(&inputs) {
        assert_eq!(action, &Action::Remove { path: input.path.clone() });
    }
    assert!(matches!(&actions[5], Action::Add(f) if Some(f) == report.output.as_ref()));
}

#[test]
fn test_output_path_layout() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 2, 5, Some(KB));

    let output = compactor.compact_table(&table).unwrap().output.unwrap();

    let path = Path::new(&output.path);
    assert_eq!(path.parent().unwrap(), temp.path().join("sales").join("orders").join("data"));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("compact-"));
    assert!(name.ends_with(".parquet"));
    // compact-XXXXXXXX.parquet
    assert_eq!(name.len(), "compact-".len() + 8 + ".parquet".len());
    assert!(path.exists());
}

#[test]
fn test_preserves_nulls() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 14, Some(KB));

    compactor.compact_table(&table).unwrap();

    let snapshot = log.snapshot(&table, None).unwrap();
    let batches = read_all(codec.as_ref(), &snapshot);
    let amounts = batches[0].column_by_name("amount").unwrap();
    // ids 0..42: multiples of 7 have a null amount
    assert_eq!(amounts.null_count(), 6);
}

#[test]
fn test_conforms_to_table_schema() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 2, 10, Some(KB));

    // Schema evolves after the files were written
    let mut schema = orders_schema();
    schema
        .columns
        .push(ColumnSchema::new("discount", ColumnType::Float64, true));
    log.append_schema(&table, &schema).unwrap();

    compactor.compact_table(&table).unwrap();

    let snapshot = log.snapshot(&table, None).unwrap();
    let batch = &read_all(codec.as_ref(), &snapshot)[0];
    assert_eq!(batch.num_columns(), 5);
    assert_eq!(batch.column_by_name("discount").unwrap().null_count(), 20);
}

#[test]
fn test_respects_max_files() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 3));
    let table = orders();
    let inputs = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 5, 10, Some(KB));

    let report = compactor.compact_table(&table).unwrap();
    assert_eq!(report.selected, 3);

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.files.len(), 3);
    // The first three (log order) were merged; the last two remain
    assert!(!snapshot.contains(&inputs[0].path));
    assert!(snapshot.contains(&inputs[3].path));
    assert!(snapshot.contains(&inputs[4].path));
    assert_eq!(snapshot.total_rows(), 50);
}

#[test]
fn test_repeated_passes_converge() {
    let (temp, log, codec, compactor) = setup(config(1024 * KB, 2));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 4, 10, None);

    let mut passes = 0;
    while !compactor.compact_table(&table).unwrap().is_noop() {
        passes += 1;
        assert!(passes < 10);
    }

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.total_rows(), 40);
}

#[test]
fn test_large_files_untouched() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    let big = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 1, 10, Some(100 * KB));
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 2, 10, Some(KB));

    let report = compactor.compact_table(&table).unwrap();
    assert_eq!(report.selected, 2);

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.files.len(), 2);
    assert_eq!(snapshot.files[0].path, big[0].path);
}

// =============================================================================
// No-op Tests
// =============================================================================

#[test]
fn test_no_small_files_is_noop() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 10, Some(100 * KB));
    let before = log.snapshot(&table, None).unwrap();

    let report = compactor.compact_table(&table).unwrap();

    assert!(report.is_noop());
    assert_eq!(report.selected, 0);
    assert_eq!(log.snapshot(&table, None).unwrap(), before);
}

#[test]
fn test_single_small_file_is_noop() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 1, 10, Some(KB));
    let before = log.latest_version(&table).unwrap();

    assert!(compactor.compact_table(&table).unwrap().is_noop());
    assert_eq!(log.latest_version(&table).unwrap(), before);
}

#[test]
fn test_unknown_table_is_snapshot_unavailable() {
    let (_temp, _log, _codec, compactor) = setup(config(10 * KB, 10));

    let err = compactor.compact_table(&orders()).unwrap_err();
    assert!(matches!(err, AtlasError::SnapshotUnavailable(t) if t == "sales.orders"));
}

#[test]
fn test_invalid_config_rejected() {
    let log = Arc::new(MemoryFileLog::new());
    let codec = Arc::new(ParquetCodec::new());
    let result = Compactor::new(log, codec, "/tmp/unused", config(10 * KB, 0));
    assert!(matches!(result, Err(AtlasError::Config(_))));
}

// =============================================================================
// Unreadable File Tests
// =============================================================================

#[test]
fn test_unreadable_file_skipped_but_retired() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 10, Some(KB));
    let missing = add_missing_file(log.as_ref(), &table, temp.path(), KB);

    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.selected, 4);
    assert_eq!(report.merged, 3);
    assert_eq!(report.unreadable, 1);

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.files.len(), 1);
    assert!(!snapshot.contains(&missing));
    assert_eq!(snapshot.total_rows(), 30);
}

#[test]
fn test_corrupt_file_skipped() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    let inputs = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 10, Some(KB));
    std::fs::write(&inputs[1].path, b"not a parquet file").unwrap();

    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.merged, 2);
    assert_eq!(report.unreadable, 1);
    let snapshot = log.snapshot(&table, None).unwrap();
    let expected: Vec<i64> = (0..10).chain(20..30).collect();
    assert_eq!(ids(&read_all(codec.as_ref(), &snapshot)), expected);
}

#[test]
fn test_files_not_fitting_schema_stay_live() {
    let (temp, log, codec, compactor) = setup(config(u64::MAX, 10));
    let table = orders();
    log.append_schema(&table, &orders_schema()).unwrap();
    let old = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 2, 3, None);
    let new = evolve_to_required_qty(log.as_ref(), codec.as_ref(), temp.path(), &table, 100, 1);
    let before = log.latest_version(&table).unwrap();
    assert_eq!(log.snapshot(&table, None).unwrap().total_rows(), 7);

    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.selected, 3);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.merged, 1);
    assert_eq!(report.unreadable, 0);

    // Only the conformed file is retired
    let output = report.output.unwrap();
    let actions = actions_after(log.as_ref(), &table, before);
    assert_eq!(
        actions,
        vec![Action::Remove { path: new.path.clone() }, Action::Add(output)]
    );

    let snapshot = log.snapshot(&table, None).unwrap();
    assert_eq!(snapshot.total_rows(), 7);
    assert!(old.iter().all(|f| snapshot.contains(&f.path)));
    let expected: Vec<i64> = (0..6).chain([100]).collect();
    assert_eq!(ids(&read_all(codec.as_ref(), &snapshot)), expected);
}

#[test]
fn test_nothing_readable_leaves_log_unchanged() {
    let (temp, log, _codec, compactor) = setup(config(10 * KB, 10));
    let table = orders();
    add_missing_file(log.as_ref(), &table, temp.path(), KB);
    add_missing_file(log.as_ref(), &table, temp.path(), KB);
    let before = log.latest_version(&table).unwrap();

    let err = compactor.compact_table(&table).unwrap_err();

    assert!(matches!(err, AtlasError::NoRecordsFound(_)));
    assert_eq!(log.latest_version(&table).unwrap(), before);
}

// =============================================================================
// Log Failure Tests
// =============================================================================

#[test]
fn test_remove_failures_are_counted_not_fatal() {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(FailingLog::new());
    let codec = Arc::new(ParquetCodec::new());
    let compactor = Compactor::new(log.clone(), codec.clone(), temp.path(), config(10 * KB, 10)).unwrap();
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 10, Some(KB));

    log.set_fail_removes(true);
    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.log_failures, 3);
    let output = report.output.unwrap();
    let snapshot = log.snapshot(&table, None).unwrap();
    // Old files stay live next to the merged one until a later pass
    assert_eq!(snapshot.files.len(), 4);
    assert!(snapshot.contains(&output.path));
}

#[test]
fn test_add_failure_is_counted() {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(FailingLog::new());
    let codec = Arc::new(ParquetCodec::new());
    let compactor = Compactor::new(log.clone(), codec.clone(), temp.path(), config(10 * KB, 10)).unwrap();
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 2, 10, Some(KB));

    log.set_fail_adds(true);
    let report = compactor.compact_table(&table).unwrap();

    assert_eq!(report.log_failures, 1);
    assert!(log.snapshot(&table, None).unwrap().files.is_empty());
}

#[test]
fn test_identify_small_files_in_log_order() {
    let (temp, log, codec, compactor) = setup(config(10 * KB, 2));
    let table = orders();
    seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 1, 5, Some(50 * KB));
    let small = seed_files(log.as_ref(), codec.as_ref(), temp.path(), &table, 3, 5, Some(KB));

    let snapshot = log.snapshot(&table, None).unwrap();
    let picked = compactor.identify_small_files(&snapshot);

    let paths: Vec<&str> = picked.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec![small[0].path.as_str(), small[1].path.as_str()]);
}
