//! Experiment harness for LRBM training runs.
//!
//! The `lrbm-harness` binary is a thin clap front end over [`pipeline`].

pub mod config;
pub mod pipeline;
pub mod results;
