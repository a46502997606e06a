//! Data types for n-gram matrices and sentence-completion challenges.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A dense `N × n` matrix of vocabulary indices, one n-gram per row.
///
/// Stored row-major. Column 0 is the conditioned term; columns `1..n` are its
/// context. Row order is insertion order until someone shuffles it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNgramMatrix")]
pub struct NgramMatrix {
    data: Vec<u32>,
    n: usize,
}

/// Unchecked wire form, validated through [`NgramMatrix::new`] on deserialize.
#[derive(Deserialize)]
struct RawNgramMatrix {
    data: Vec<u32>,
    n: usize,
}

impl TryFrom<RawNgramMatrix> for NgramMatrix {
    type Error = anyhow::Error;

    fn try_from(raw: RawNgramMatrix) -> anyhow::Result<Self> {
        Self::new(raw.data, raw.n)
    }
}

impl NgramMatrix {
    /// Create a matrix from flat row-major data.
    ///
    /// # Errors
    /// Returns an error if `n == 0` or `data.len()` is not a multiple of `n`.
    pub fn new(data: Vec<u32>, n: usize) -> anyhow::Result<Self> {
        if n == 0 {
            anyhow::bail!("n-gram order must be > 0");
        }
        if data.len() % n != 0 {
            anyhow::bail!(
                "flat data of length {} is not a multiple of n-gram order {n}",
                data.len()
            );
        }
        Ok(Self { data, n })
    }

    /// An empty matrix with `n` columns.
    ///
    /// # Errors
    /// Returns an error if `n == 0`.
    pub fn empty(n: usize) -> anyhow::Result<Self> {
        Self::new(Vec::new(), n)
    }

    /// Build a matrix from explicit rows.
    ///
    /// # Errors
    /// Returns an error if rows are empty (order unknown) or have unequal lengths.
    pub fn from_rows(rows: &[Vec<u32>]) -> anyhow::Result<Self> {
        let n = match rows.first() {
            Some(r) => r.len(),
            None => anyhow::bail!("cannot infer n-gram order from zero rows"),
        };
        let mut data = Vec::with_capacity(rows.len() * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                anyhow::bail!("row {i} has length {}, expected {n}", row.len());
            }
            data.extend_from_slice(row);
        }
        Self::new(data, n)
    }

    /// Number of rows (n-grams).
    pub fn len(&self) -> usize {
        self.data.len() / self.n
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// N-gram order (number of columns).
    pub fn n(&self) -> usize {
        self.n
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.n)
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Row `i`.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    pub fn row(&self, i: usize) -> &[u32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u32> {
        self.data.chunks_exact(self.n)
    }

    /// Copy of column `col` across all rows.
    pub fn column(&self, col: usize) -> Vec<u32> {
        assert!(col < self.n, "column {col} out of range for n={}", self.n);
        self.rows().map(|r| r[col]).collect()
    }

    /// Overwrite column `col` with `values` (one per row).
    pub fn set_column(&mut self, col: usize, values: &[u32]) {
        assert!(col < self.n, "column {col} out of range for n={}", self.n);
        assert_eq!(values.len(), self.len(), "column length must match row count");
        for (row, &v) in self.data.chunks_exact_mut(self.n).zip(values) {
            row[col] = v;
        }
    }

    /// Copy of rows `[start, end)`.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        Self {
            data: self.data[start * self.n..end * self.n].to_vec(),
            n: self.n,
        }
    }

    /// Copy of the first `count` rows (or all rows if fewer exist).
    pub fn take_prefix(&self, count: usize) -> Self {
        self.slice_rows(0, count.min(self.len()))
    }

    /// Every row repeated `k` times in place: copy `j` of row `i` is row `i * k + j`.
    pub fn repeat_rows(&self, k: usize) -> Self {
        let data = self
            .rows()
            .flat_map(|row| std::iter::repeat(row).take(k).flatten().copied())
            .collect();
        Self { data, n: self.n }
    }

    /// Shuffle rows in place. Each row moves as a unit.
    pub fn shuffle_rows(&mut self, rng: &mut impl Rng) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        let data: Vec<u32> = order
            .iter()
            .flat_map(|&i| self.row(i).iter().copied())
            .collect();
        self.data = data;
    }

    /// Check that every entry lies in `[0, vocab_size)`.
    pub fn validate(&self, vocab_size: usize) -> anyhow::Result<()> {
        if let Some((i, &v)) = self
            .data
            .iter()
            .enumerate()
            .find(|(_, &v)| v as usize >= vocab_size)
        {
            anyhow::bail!(
                "entry {v} at row {}, column {} is outside vocabulary of size {vocab_size}",
                i / self.n,
                i % self.n
            );
        }
        Ok(())
    }
}

/// A multiple-choice sentence-completion challenge.
///
/// Each group holds the n-grams of several candidate sentences; `answers[g]`
/// is the index of the correct candidate in group `g`.
///
/// On disk every candidate is a list of rows:
/// `{"vocab_size": V, "groups": [[[[t0, t1, ...], ...], ...], ...], "answers": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSentenceChallenge", into = "RawSentenceChallenge")]
pub struct SentenceChallenge {
    /// Vocabulary size the candidate n-grams were encoded against.
    pub vocab_size: usize,
    /// Candidate groups. `groups[g][c]` is candidate `c` of group `g`.
    pub groups: Vec<Vec<NgramMatrix>>,
    /// Correct candidate index per group.
    pub answers: Vec<usize>,
}

/// JSON form of [`SentenceChallenge`]: candidates as nested row arrays.
#[derive(Serialize, Deserialize)]
struct RawSentenceChallenge {
    vocab_size: usize,
    groups: Vec<Vec<Vec<Vec<u32>>>>,
    answers: Vec<usize>,
}

impl TryFrom<RawSentenceChallenge> for SentenceChallenge {
    type Error = anyhow::Error;

    fn try_from(raw: RawSentenceChallenge) -> anyhow::Result<Self> {
        // Candidates without rows take the order of the first non-empty one.
        let n = raw
            .groups
            .iter()
            .flatten()
            .flatten()
            .next()
            .map_or(1, |row| row.len());
        let groups = raw
            .groups
            .iter()
            .enumerate()
            .map(|(g, group)| {
                group
                    .iter()
                    .enumerate()
                    .map(|(c, rows)| {
                        let matrix = if rows.is_empty() {
                            NgramMatrix::empty(n)?
                        } else {
                            NgramMatrix::from_rows(rows)?
                        };
                        if matrix.n() != n {
                            anyhow::bail!(
                                "group {g} candidate {c} has n-gram order {}, expected {n}",
                                matrix.n()
                            );
                        }
                        Ok(matrix)
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            vocab_size: raw.vocab_size,
            groups,
            answers: raw.answers,
        })
    }
}

impl From<SentenceChallenge> for RawSentenceChallenge {
    fn from(challenge: SentenceChallenge) -> Self {
        Self {
            vocab_size: challenge.vocab_size,
            groups: challenge
                .groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|m| m.rows().map(|r| r.to_vec()).collect())
                        .collect()
                })
                .collect(),
            answers: challenge.answers,
        }
    }
}

impl SentenceChallenge {
    /// Load a challenge from a JSON file.
    pub fn from_json(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let challenge: Self = serde_json::from_str(&contents)?;
        tracing::info!(
            groups = challenge.groups.len(),
            path = %path.display(),
            "Loaded sentence-completion challenge"
        );
        Ok(challenge)
    }

    /// Write the challenge to a JSON file.
    pub fn to_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Number of candidate groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the challenge has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Quick statistics over an n-gram file.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusSummary {
    /// Number of n-grams.
    pub rows: usize,
    /// N-gram order.
    pub n: usize,
    /// Number of distinct terms appearing in column 0.
    pub distinct_conditioned: usize,
    /// Largest vocabulary index seen anywhere in the matrix.
    pub max_index: Option<u32>,
}

impl CorpusSummary {
    /// Compute summary statistics from a matrix.
    pub fn of(matrix: &NgramMatrix) -> Self {
        let distinct: std::collections::HashSet<u32> = matrix.column(0).into_iter().collect();
        Self {
            rows: matrix.len(),
            n: matrix.n(),
            distinct_conditioned: distinct.len(),
            max_index: matrix.as_slice().iter().copied().max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_matrix() -> NgramMatrix {
        NgramMatrix::from_rows(&[vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9, 0, 1]]).unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_data() {
        assert!(NgramMatrix::new(vec![1, 2, 3], 2).is_err());
        assert!(NgramMatrix::new(vec![1, 2], 0).is_err());
        assert!(NgramMatrix::new(vec![], 3).unwrap().is_empty());
    }

    #[test]
    fn test_empty_requires_positive_order() {
        assert!(NgramMatrix::empty(0).is_err());
        let m = NgramMatrix::empty(3).unwrap();
        assert_eq!(m.shape(), (0, 3));
        assert_eq!(CorpusSummary::of(&m).distinct_conditioned, 0);
    }

    #[test]
    fn test_from_rows_rejects_unequal_rows() {
        let err = NgramMatrix::from_rows(&[vec![1, 2], vec![3]]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_shape_and_rows() {
        let m = sample_matrix();
        assert_eq!(m.shape(), (4, 3));
        assert_eq!(m.row(1), &[3, 4, 5]);
        assert_eq!(m.column(0), vec![0, 3, 6, 9]);
        assert_eq!(m.rows().count(), 4);
    }

    #[test]
    fn test_set_column() {
        let mut m = sample_matrix();
        m.set_column(2, &[10, 11, 12, 13]);
        assert_eq!(m.column(2), vec![10, 11, 12, 13]);
        assert_eq!(m.column(0), vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_slice_and_prefix() {
        let m = sample_matrix();
        assert_eq!(m.slice_rows(1, 3).as_slice(), &[3, 4, 5, 6, 7, 8]);
        assert_eq!(m.take_prefix(2).len(), 2);
        assert_eq!(m.take_prefix(100).len(), 4);
        assert!(m.slice_rows(2, 2).is_empty());
    }

    #[test]
    fn test_repeat_rows() {
        let m = NgramMatrix::from_rows(&[vec![1, 2], vec![3, 4]]).unwrap();
        let r = m.repeat_rows(3);
        assert_eq!(r.as_slice(), &[1, 2, 1, 2, 1, 2, 3, 4, 3, 4, 3, 4]);
        assert!(m.repeat_rows(0).is_empty());
    }

    #[test]
    fn test_shuffle_rows_keeps_rows_intact() {
        let m = sample_matrix();
        let mut shuffled = m.clone();
        shuffled.shuffle_rows(&mut StdRng::seed_from_u64(7));

        let mut before: Vec<Vec<u32>> = m.rows().map(|r| r.to_vec()).collect();
        let mut after: Vec<Vec<u32>> = shuffled.rows().map(|r| r.to_vec()).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_validate_vocab_range() {
        let m = sample_matrix();
        assert!(m.validate(10).is_ok());
        let err = m.validate(9).unwrap_err();
        assert!(err.to_string().contains("row 3, column 0"), "got: {err}");
    }

    #[test]
    fn test_summary() {
        let summary = CorpusSummary::of(&sample_matrix());
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.n, 3);
        assert_eq!(summary.distinct_conditioned, 4);
        assert_eq!(summary.max_index, Some(9));
    }

    #[test]
    fn test_challenge_deserialize() {
        let json = r#"{
            "vocab_size": 5,
            "groups": [[[[0, 1]], [[2, 3], [3, 4]], []]],
            "answers": [1]
        }"#;
        let challenge: SentenceChallenge = serde_json::from_str(json).unwrap();
        assert_eq!(challenge.len(), 1);
        assert_eq!(challenge.groups[0][1].len(), 2);
        assert_eq!(challenge.groups[0][1].row(1), &[3, 4]);
        assert_eq!(challenge.groups[0][2].shape(), (0, 2));
        assert_eq!(challenge.answers, vec![1]);
    }

    #[test]
    fn test_challenge_serializes_nested_rows() {
        let challenge = SentenceChallenge {
            vocab_size: 5,
            groups: vec![vec![NgramMatrix::from_rows(&[vec![0, 1], vec![1, 2]]).unwrap()]],
            answers: vec![0],
        };
        let json = serde_json::to_string(&challenge).unwrap();
        assert_eq!(json, r#"{"vocab_size":5,"groups":[[[[0,1],[1,2]]]],"answers":[0]}"#);
    }

    #[test]
    fn test_challenge_rejects_mixed_orders() {
        let json = r#"{"vocab_size": 5, "groups": [[[[0, 1]], [[2, 3, 4]]]], "answers": [0]}"#;
        let err = serde_json::from_str::<SentenceChallenge>(json).unwrap_err();
        assert!(err.to_string().contains("n-gram order"), "{err}");
    }

    #[test]
    fn test_deserialize_rejects_ragged_matrix() {
        let json = r#"{"data": [0, 1, 2], "n": 2}"#;
        assert!(serde_json::from_str::<NgramMatrix>(json).is_err());
    }
}
