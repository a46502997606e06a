//! Integration tests for the corpus crate.
//!
//! Full pipelines: synthetic generation → Parquet/JSON writing → reading → verification.

use corpus::synthetic::{generate, SyntheticConfig};
use corpus::{NgramMatrix, NgramReader, NgramWriter, SentenceChallenge};
use tempfile::TempDir;

/// Synthetic corpus survives a Parquet + JSON round trip unchanged.
#[test]
fn test_synthetic_corpus_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let corpus = generate(&SyntheticConfig {
        sentences: 20,
        groups: 5,
        ..SyntheticConfig::default()
    })
    .unwrap();

    let ngram_path = tmp.path().join("ngrams.parquet");
    let mut writer = NgramWriter::new(ngram_path.clone(), corpus.ngrams.n());
    writer.record_all(&corpus.ngrams);
    writer.finish().unwrap();

    let challenge_path = tmp.path().join("challenge.json");
    corpus.challenge.to_json(&challenge_path).unwrap();

    let ngrams = NgramReader::read_all(&ngram_path).unwrap();
    assert_eq!(ngrams, corpus.ngrams);

    let challenge = SentenceChallenge::from_json(&challenge_path).unwrap();
    assert_eq!(challenge.vocab_size, corpus.challenge.vocab_size);
    assert_eq!(challenge.answers, corpus.challenge.answers);
    assert_eq!(challenge.groups, corpus.challenge.groups);
}

/// Summary statistics read straight from a Parquet file.
#[test]
fn test_read_summary() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("ngrams.parquet");
    let matrix = NgramMatrix::from_rows(&[
        vec![1, 2, 3, 4],
        vec![1, 5, 6, 7],
        vec![8, 2, 3, 4],
    ])
    .unwrap();
    let mut writer = NgramWriter::new(path.clone(), 4);
    writer.record_all(&matrix);
    writer.finish().unwrap();

    let summary = NgramReader::read_summary(&path).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.n, 4);
    assert_eq!(summary.distinct_conditioned, 2);
    assert_eq!(summary.max_index, Some(8));
}

/// A large matrix spans several Arrow batches on read and still comes back in order.
#[test]
fn test_large_matrix_multiple_batches() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("large.parquet");
    let data: Vec<u32> = (0..30_000u32).flat_map(|i| [i % 97, i % 13]).collect();
    let matrix = NgramMatrix::new(data, 2).unwrap();

    let mut writer = NgramWriter::new(path.clone(), 2);
    writer.record_all(&matrix);
    writer.finish().unwrap();

    let read_back = NgramReader::read_all(&path).unwrap();
    assert_eq!(read_back.len(), 30_000);
    assert_eq!(read_back, matrix);
}
