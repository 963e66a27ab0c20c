//! Record batch helpers shared by compaction and Z-order

use std::path::Path;

use arrow::array::{new_null_array, ArrayRef};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{AtlasError, Result};

use super::{ColumnarCodec, TableSchema};

/// Batches read from a set of input files, all sharing `schema`
#[derive(Debug, Default)]
pub struct ConformedInputs {
    /// `None` only when nothing was readable and no table schema was given
    pub schema: Option<SchemaRef>,
    pub batches: Vec<RecordBatch>,
    /// Files the codec could not decode, with the error
    pub unreadable: Vec<(String, AtlasError)>,
    /// Files that decoded but do not fit `schema`, with the error
    ///
    /// Their rows are intact on disk, so callers must keep them live.
    pub rejected: Vec<(String, AtlasError)>,
}

impl ConformedInputs {
    /// True if `path` was read but could not be conformed
    pub fn is_rejected(&self, path: &str) -> bool {
        self.rejected.iter().any(|(p, _)| p == path)
    }
}

/// Read every path and conform it to `schema`.
///
/// An empty `schema` adopts the first readable file's schema. Failures are
/// collected, never returned, so one bad file cannot sink a pass. Decode
/// failures land in `unreadable`, conformance failures in `rejected`.
pub fn read_conformed<'a, I>(codec: &dyn ColumnarCodec, paths: I, schema: &TableSchema) -> ConformedInputs
where
    I: IntoIterator<Item = &'a str>,
{
    let mut inputs = ConformedInputs {
        schema: (!schema.is_empty()).then(|| schema.to_arrow()),
        ..ConformedInputs::default()
    };

    for path in paths {
        let batch = match codec.read_file(Path::new(path), None) {
            Ok(batch) => batch,
            Err(e) => {
                inputs.unreadable.push((path.to_string(), e));
                continue;
            }
        };

        let target = inputs.schema.get_or_insert_with(|| batch.schema());
        match conform_to_schema(&batch, target) {
            Ok(batch) => inputs.batches.push(batch),
            Err(e) => inputs.rejected.push((path.to_string(), e)),
        }
    }

    inputs
}

/// Reshape `batch` to `schema`, matching columns by name.
///
/// Columns of a different type are cast, columns missing from the batch are
/// filled with nulls, extra columns are dropped. Null-ness of every source
/// value is preserved.
pub fn conform_to_schema(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    if batch.schema().fields() == schema.fields() {
        return Ok(RecordBatch::try_new_with_options(
            schema.clone(),
            batch.columns().to_vec(),
            &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
        )?);
    }

    let num_rows = batch.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| -> Result<ArrayRef> {
            match batch.column_by_name(field.name()) {
                Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
                Some(column) => Ok(cast(column, field.data_type())?),
                None => Ok(new_null_array(field.data_type(), num_rows)),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(num_rows)),
    )?)
}

/// Total rows across batches
pub fn total_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(RecordBatch::num_rows).sum()
}
