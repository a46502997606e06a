//! N-gram corpus storage for the LRBM experiments.
//!
//! Provides the [`NgramMatrix`] row-major n-gram container, the
//! [`SentenceChallenge`] multiple-choice evaluation set, Parquet I/O for
//! n-gram files, and a seeded synthetic corpus generator.

pub mod reader;
pub mod synthetic;
pub mod types;
pub mod writer;

pub use reader::NgramReader;
pub use synthetic::{SyntheticConfig, SyntheticCorpus};
pub use types::{CorpusSummary, NgramMatrix, SentenceChallenge};
pub use writer::NgramWriter;
