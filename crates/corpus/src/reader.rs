//! Reads n-gram matrices from Parquet files.

use crate::types::{CorpusSummary, NgramMatrix};
use arrow::array::{Array, UInt32Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::path::{Path, PathBuf};

/// Static methods for reading n-gram data from Parquet files.
pub struct NgramReader;

impl NgramReader {
    /// Read every n-gram from a Parquet file, preserving row order.
    pub fn read_all(path: &Path) -> anyhow::Result<NgramMatrix> {
        let file = std::fs::File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let n = builder.schema().fields().len();
        if n == 0 {
            anyhow::bail!("{} has no term columns", path.display());
        }
        let reader = builder.build()?;

        let mut data = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            append_batch(&batch, &mut data)?;
        }

        let matrix = NgramMatrix::new(data, n)?;
        tracing::debug!(
            count = matrix.len(),
            n,
            path = %path.display(),
            "Read n-grams"
        );
        Ok(matrix)
    }

    /// Read and concatenate n-grams from multiple Parquet files of equal order.
    pub fn read_multiple(paths: &[PathBuf]) -> anyhow::Result<NgramMatrix> {
        let mut data = Vec::new();
        let mut order: Option<usize> = None;
        for path in paths {
            let matrix = Self::read_all(path)?;
            match order {
                Some(n) if n != matrix.n() => anyhow::bail!(
                    "{} has n-gram order {}, expected {n}",
                    path.display(),
                    matrix.n()
                ),
                _ => order = Some(matrix.n()),
            }
            data.extend_from_slice(matrix.as_slice());
        }
        match order {
            Some(n) => NgramMatrix::new(data, n),
            None => anyhow::bail!("no n-gram files given"),
        }
    }

    /// Compute summary statistics from an n-gram Parquet file.
    pub fn read_summary(path: &Path) -> anyhow::Result<CorpusSummary> {
        let matrix = Self::read_all(path)?;
        Ok(CorpusSummary::of(&matrix))
    }
}

/// Append one batch's rows (row-major) onto `out`.
fn append_batch(batch: &RecordBatch, out: &mut Vec<u32>) -> anyhow::Result<()> {
    let columns = (0..batch.num_columns())
        .map(|i| {
            batch
                .column(i)
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| anyhow::anyhow!("Column {i} (t{i}) is not UInt32Array"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    out.reserve(batch.num_rows() * columns.len());
    for row in 0..batch.num_rows() {
        for (i, col) in columns.iter().enumerate() {
            if col.is_null(row) {
                anyhow::bail!("null term at row {row}, column t{i}");
            }
            out.push(col.value(row));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::NgramWriter;
    use tempfile::TempDir;

    fn write_matrix(dir: &Path, name: &str, matrix: &NgramMatrix) -> PathBuf {
        let path = dir.join(name);
        let mut writer = NgramWriter::new(path.clone(), matrix.n());
        writer.record_all(matrix);
        writer.finish().unwrap()
    }

    #[test]
    fn test_read_preserves_row_order() {
        let tmp = TempDir::new().unwrap();
        let matrix =
            NgramMatrix::from_rows(&[vec![5, 1, 2], vec![0, 0, 0], vec![9, 8, 7]]).unwrap();
        let path = write_matrix(tmp.path(), "a.parquet", &matrix);

        let read_back = NgramReader::read_all(&path).unwrap();
        assert_eq!(read_back, matrix);
    }

    #[test]
    fn test_read_multiple_concatenates() {
        let tmp = TempDir::new().unwrap();
        let a = NgramMatrix::from_rows(&[vec![1, 2], vec![3, 4]]).unwrap();
        let b = NgramMatrix::from_rows(&[vec![5, 6]]).unwrap();
        let paths = vec![
            write_matrix(tmp.path(), "a.parquet", &a),
            write_matrix(tmp.path(), "b.parquet", &b),
        ];

        let all = NgramReader::read_multiple(&paths).unwrap();
        assert_eq!(all.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_read_multiple_rejects_mixed_order() {
        let tmp = TempDir::new().unwrap();
        let a = NgramMatrix::from_rows(&[vec![1, 2]]).unwrap();
        let b = NgramMatrix::from_rows(&[vec![1, 2, 3]]).unwrap();
        let paths = vec![
            write_matrix(tmp.path(), "a.parquet", &a),
            write_matrix(tmp.path(), "b.parquet", &b),
        ];
        assert!(NgramReader::read_multiple(&paths).is_err());
    }

    #[test]
    fn test_read_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.parquet");
        NgramWriter::new(path.clone(), 4).finish().unwrap();

        let matrix = NgramReader::read_all(&path).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.n(), 4);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(NgramReader::read_all(Path::new("/nonexistent/ngrams.parquet")).is_err());
    }
}
