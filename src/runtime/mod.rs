//! Call execution - the one-shot runner and the flows built on it

pub mod flows;
mod runner;

pub use runner::{
    build_transaction, OnChainCallRunner, RunnerOptions, SubmissionLog, DEFAULT_POLL_INTERVAL,
    IMPLEMENTATION_SLOT,
};
