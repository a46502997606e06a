//! The evaluation protocol: dataset partitioning, control sets, likelihood
//! tracking, sentence completion and the training orchestrator.

pub mod completion;
pub mod control;
pub mod loss;
pub mod metrics;
pub mod split;
pub mod trace;
pub mod tracker;
pub mod trainer;
