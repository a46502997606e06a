//! Log-bilinear RBM language model and its evaluation harness.
//!
//! Provides the protocol around an energy-based n-gram model: a seeded
//! train/validation/test partitioner, "wrong-context" control sets, a
//! decimated held-out likelihood tracker, a multiple-choice sentence
//! completion evaluator and a callback-driven training orchestrator. A
//! burn-based LRBM and a count-based n-gram baseline plug in through the
//! [`EnergyModel`] trait.

pub mod baseline;
pub mod error;
pub mod mocks;
pub mod model;
pub mod training;

pub use baseline::NgramModel;
pub use error::HarnessError;
pub use model::lrbm::{LrbmConfig, LrbmNet};
pub use model::trainable::Lrbm;
pub use model::EnergyModel;
pub use training::completion::{evaluate, SentenceCompletionEvaluator};
pub use training::control::{perturb, ControlConfig, DistributionVector};
pub use training::split::{split, split_with_source, RandomSource, Split};
pub use training::trace::{EpochPoint, MinibatchPoint, TrainingTrace};
pub use training::tracker::LikelihoodTracker;
pub use training::trainer::{CostTrajectories, Orchestrator, TrainingCallback, TrainingConfig, TrainingState};
