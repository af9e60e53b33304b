//! ABI domain models
//!
//! Types describing contract methods, independent of the underlying
//! implementation (alloy-json-abi).

mod registry;

pub use registry::{AbiRegistry, FunctionSignature, LookupError, ParamSpec};
