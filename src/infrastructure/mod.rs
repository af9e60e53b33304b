//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based Ethereum provider implementations
//! - Artifact loading, argument encoding and output decoding with alloy-dyn-abi

pub mod abi;
pub mod ethereum;
