//! Domain layer - call models and definitions, free of network concerns

pub mod abi;
pub mod call;
pub mod manifest;
