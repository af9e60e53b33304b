//! One-shot contract calls, deployments and proxy upgrades from a manifest
//! of named calls.

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod store;
