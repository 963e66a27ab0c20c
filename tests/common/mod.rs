//! Shared helpers for integration tests
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::record_batch::RecordBatch;
use atlastable::codec::{
    ColumnSchema, ColumnType, ColumnarCodec, FileStats, ParquetCodec, ParquetFile, TableSchema,
    TimestampUnit,
};
use atlastable::table::{DataFileNamer, FilePurpose};
use atlastable::txlog::{Action, FileLog, LogRecord, MemoryFileLog, Snapshot};
use atlastable::{AtlasError, Result, TableId};

pub const REGIONS: [&str; 4] = ["us-east", "us-west", "eu-central", "ap-south"];

pub fn orders() -> TableId {
    TableId::parse("sales.orders").unwrap()
}

pub fn orders_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnSchema::new("id", ColumnType::Int64, false),
        ColumnSchema::new("region", ColumnType::Utf8, true),
        ColumnSchema::new("ts", ColumnType::Timestamp(TimestampUnit::Millisecond), true),
        ColumnSchema::new("amount", ColumnType::Float64, true),
    ])
}

/// `rows` orders with ids `start..start + rows`; every 7th amount is null
pub fn orders_batch(start: i64, rows: usize) -> RecordBatch {
    let ids: Vec<i64> = (start..start + rows as i64).collect();
    let regions: Vec<Option<&str>> = ids
        .iter()
        .map(|id| Some(REGIONS[(*id as usize) % REGIONS.len()]))
        .collect();
    let ts: Vec<Option<i64>> = ids
        .iter()
        .map(|id| Some(1_700_000_000_000 + id * 3_600_000))
        .collect();
    let amounts: Vec<Option<f64>> = ids
        .iter()
        .map(|id| (id % 7 != 0).then(|| (*id % 100) as f64 / 100.0))
        .collect();

    RecordBatch::try_new(
        orders_schema().to_arrow(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(regions)),
            Arc::new(TimestampMillisecondArray::from(ts)),
            Arc::new(Float64Array::from(amounts)),
        ],
    )
    .unwrap()
}

/// `orders_schema` plus a required `qty` column
pub fn orders_with_qty_schema() -> TableSchema {
    let mut schema = orders_schema();
    schema.columns.push(ColumnSchema::new("qty", ColumnType::Int64, false));
    schema
}

/// `orders_batch` rows carrying a `qty` of 1
pub fn orders_with_qty_batch(start: i64, rows: usize) -> RecordBatch {
    let mut columns = orders_batch(start, rows).columns().to_vec();
    columns.push(Arc::new(Int64Array::from(vec![1i64; rows])));
    RecordBatch::try_new(orders_with_qty_schema().to_arrow(), columns).unwrap()
}

/// Record `orders_with_qty_schema` for `table` and add one file of `rows`
/// rows under it, starting at id `start`.
///
/// Files written before the change lack the required column and can no
/// longer be conformed to the table schema.
pub fn evolve_to_required_qty(
    log: &dyn FileLog,
    codec: &dyn ColumnarCodec,
    base: &Path,
    table: &TableId,
    start: i64,
    rows: usize,
) -> ParquetFile {
    log.append_schema(table, &orders_with_qty_schema()).unwrap();
    let path = DataFileNamer::new(base, table, FilePurpose::Ingest).single();
    let file = codec.write_file(&path, &orders_with_qty_batch(start, rows)).unwrap();
    log.append_add(table, &file).unwrap();
    file
}

/// Write `count` ingest files of `rows` each and add them to `table`.
///
/// `size` overrides the recorded file size so tests can control which files
/// count as small.
pub fn seed_files(
    log: &dyn FileLog,
    codec: &dyn ColumnarCodec,
    base: &Path,
    table: &TableId,
    count: usize,
    rows: usize,
    size: Option<u64>,
) -> Vec<ParquetFile> {
    (0..count)
        .map(|i| {
            let path = DataFileNamer::new(base, table, FilePurpose::Ingest).single();
            let mut file = codec
                .write_file(&path, &orders_batch((i * rows) as i64, rows))
                .unwrap();
            if let Some(size) = size {
                file.size = size;
            }
            log.append_add(table, &file).unwrap();
            file
        })
        .collect()
}

/// Add a file that does not exist on disk
pub fn add_missing_file(log: &dyn FileLog, table: &TableId, base: &Path, size: u64) -> String {
    let path = DataFileNamer::new(base, table, FilePurpose::Ingest).single();
    let file = ParquetFile {
        path: path.to_string_lossy().into_owned(),
        size,
        row_count: 10,
        stats: BTreeMap::new(),
    };
    log.append_add(table, &file).unwrap();
    file.path
}

/// Sorted ids across batches
pub fn ids(batches: &[RecordBatch]) -> Vec<i64> {
    let mut ids: Vec<i64> = batches
        .iter()
        .flat_map(|b| {
            let col = b
                .column_by_name("id")
                .unwrap()
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap()
                .clone();
            (0..col.len()).map(move |i| col.value(i))
        })
        .collect();
    ids.sort_unstable();
    ids
}

pub fn read_all(codec: &dyn ColumnarCodec, snapshot: &Snapshot) -> Vec<RecordBatch> {
    snapshot
        .files
        .iter()
        .map(|f| codec.read_file(Path::new(&f.path), None).unwrap())
        .collect()
}

/// Actions recorded after `version`
pub fn actions_after(log: &dyn FileLog, table: &TableId, version: u64) -> Vec<Action> {
    log.history(table)
        .unwrap()
        .into_iter()
        .filter(|r: &LogRecord| r.version > version)
        .map(|r| r.action)
        .collect()
}

// =============================================================================
// Fault injection
// =============================================================================

/// In-memory log whose appends can be made to fail by action kind
#[derive(Default)]
pub struct FailingLog {
    inner: MemoryFileLog,
    pub fail_removes: AtomicBool,
    pub fail_adds: AtomicBool,
}

impl FailingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_adds(&self, fail: bool) {
        self.fail_adds.store(fail, Ordering::SeqCst);
    }
}

impl FileLog for FailingLog {
    fn snapshot(&self, table: &TableId, version: Option<u64>) -> Result<Snapshot> {
        self.inner.snapshot(table, version)
    }

    fn append(&self, table: &TableId, action: Action) -> Result<u64> {
        let fail = match &action {
            Action::Remove { .. } => self.fail_removes.load(Ordering::SeqCst),
            Action::Add(_) => self.fail_adds.load(Ordering::SeqCst),
            Action::SetSchema(_) => false,
        };
        if fail {
            return Err(AtlasError::LogWrite("injected failure".into()));
        }
        self.inner.append(table, action)
    }

    fn list_tables(&self) -> Result<Vec<TableId>> {
        self.inner.list_tables()
    }

    fn history(&self, table: &TableId) -> Result<Vec<LogRecord>> {
        self.inner.history(table)
    }
}

/// Parquet codec whose writes can be made to fail
#[derive(Default)]
pub struct FailingCodec {
    inner: ParquetCodec,
    pub fail_writes: AtomicBool,
}

impl FailingCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ColumnarCodec for FailingCodec {
    fn read_file(&self, path: &Path, projection: Option<&[usize]>) -> Result<RecordBatch> {
        self.inner.read_file(path, projection)
    }

    fn write_batch(&self, path: &Path, batch: &RecordBatch) -> Result<FileStats> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AtlasError::FileWriteFailed {
                path: path.display().to_string(),
                reason: "injected failure".into(),
            });
        }
        self.inner.write_batch(path, batch)
    }
}
