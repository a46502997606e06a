//! Writes n-gram matrices to Parquet files using Arrow.

use crate::types::NgramMatrix;
use arrow::array::{ArrayRef, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::path::PathBuf;
use std::sync::Arc;

/// Arrow schema for an n-gram Parquet file: one `UInt32` column per term.
///
/// Column `t0` is the conditioned term.
pub fn ngram_schema(n: usize) -> Schema {
    Schema::new(
        (0..n)
            .map(|i| Field::new(format!("t{i}"), DataType::UInt32, false))
            .collect::<Vec<_>>(),
    )
}

/// Buffers n-gram rows and writes them to a Parquet file.
pub struct NgramWriter {
    rows: Vec<u32>,
    n: usize,
    output_path: PathBuf,
}

impl NgramWriter {
    /// Create a new writer for n-grams of order `n`.
    pub fn new(output_path: PathBuf, n: usize) -> Self {
        Self {
            rows: Vec::new(),
            n,
            output_path,
        }
    }

    /// Buffer a single n-gram.
    ///
    /// # Panics
    /// Panics if `row.len() != n`.
    pub fn record(&mut self, row: &[u32]) {
        assert_eq!(row.len(), self.n, "n-gram length must equal writer order");
        self.rows.extend_from_slice(row);
    }

    /// Buffer every row of a matrix.
    pub fn record_all(&mut self, matrix: &NgramMatrix) {
        assert_eq!(matrix.n(), self.n, "matrix order must equal writer order");
        self.rows.extend_from_slice(matrix.as_slice());
    }

    /// Number of buffered n-grams.
    pub fn len(&self) -> usize {
        self.rows.len() / self.n
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write all buffered n-grams to the Parquet file and return the output path.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        let schema = Arc::new(ngram_schema(self.n));
        let count = self.len();

        let batch = if self.rows.is_empty() {
            RecordBatch::new_empty(schema.clone())
        } else {
            build_record_batch(&self.rows, self.n, schema.clone())?
        };

        let file = std::fs::File::create(&self.output_path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::info!(
            ngrams = count,
            n = self.n,
            path = %self.output_path.display(),
            "Wrote n-gram Parquet file"
        );

        Ok(self.output_path)
    }
}

/// Build a column-per-term Arrow RecordBatch from flat row-major data.
fn build_record_batch(rows: &[u32], n: usize, schema: Arc<Schema>) -> anyhow::Result<RecordBatch> {
    let columns: Vec<ArrayRef> = (0..n)
        .map(|col| {
            let values: UInt32Array = rows.chunks_exact(n).map(|r| Some(r[col])).collect();
            Arc::new(values) as ArrayRef
        })
        .collect();

    Ok(RecordBatch::try_new(schema, columns)?)
}
