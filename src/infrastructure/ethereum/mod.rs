//! Ethereum infrastructure - Alloy provider implementations

mod provider;
pub(crate) mod types;

pub use provider::{create_provider, parse_signer, AlloyProvider, EthereumProvider, ProviderConfig};
