//! Ethereum provider abstraction and Alloy implementation
//!
//! The runner only talks to [`EthereumProvider`]; the Alloy implementation
//! carries the signer as a wallet filler so nonce, gas, chain id and signing
//! are filled in on submission.

use std::path::PathBuf;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};

use crate::domain::call::Receipt;
use crate::infrastructure::ethereum::types::convert_receipt;

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    /// Pick the transport from the endpoint's scheme
    pub fn from_endpoint(endpoint: &str) -> Self {
        let endpoint = endpoint.trim();
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            return ProviderConfig::WebSocket(endpoint.to_string());
        }
        #[cfg(unix)]
        if !endpoint.contains("://") && endpoint.ends_with(".ipc") {
            return ProviderConfig::Ipc(PathBuf::from(endpoint));
        }
        ProviderConfig::Http(endpoint.to_string())
    }

    /// Get display name for this endpoint
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

/// Abstract Ethereum provider trait
///
/// Everything a one-shot call needs from the network, abstracting over
/// the transport and the signer.
#[async_trait::async_trait]
pub trait EthereumProvider: Send + Sync + 'static {
    /// Chain id reported by the node
    async fn chain_id(&self) -> Result<u64>;

    /// Get the current block number
    async fn block_number(&self) -> Result<u64>;

    /// Sign and broadcast; resolves once the node has accepted the transaction
    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256>;

    /// Get transaction receipt, `None` while unmined
    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>>;

    /// Execute a call (eth_call)
    async fn call(&self, request: TransactionRequest) -> Result<Bytes>;

    /// Estimate gas (eth_estimateGas)
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;

    /// Get storage at a specific slot
    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256>;

    /// Address transactions are signed by, if a signer is attached
    fn sender(&self) -> Option<Address>;

    /// Get endpoint display name
    fn endpoint_name(&self) -> String;
}

/// Alloy-backed provider, type-erased over transport and fillers
pub struct AlloyProvider {
    provider: DynProvider,
    endpoint: String,
    sender: Option<Address>,
}

// Macro to connect the same builder over each transport
macro_rules! connect_with {
    ($builder:expr, $config:expr) => {
        match $config {
            ProviderConfig::Http(url) => {
                let rpc_url = url.parse().context("Invalid HTTP URL")?;
                $builder.connect_http(rpc_url).erased()
            }
            ProviderConfig::WebSocket(url) => $builder
                .connect(url)
                .await
                .context("Failed to create WebSocket provider")?
                .erased(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => {
                use alloy::providers::IpcConnect;
                let ipc = IpcConnect::new(path.to_string_lossy().to_string());
                $builder
                    .connect_ipc(ipc)
                    .await
                    .context("Failed to create IPC provider")?
                    .erased()
            }
        }
    };
}

/// Create a provider from configuration, optionally signing with `signer`
pub async fn create_provider(
    config: ProviderConfig,
    signer: Option<PrivateKeySigner>,
) -> Result<Box<dyn EthereumProvider>> {
    let endpoint = config.display();
    let sender = signer.as_ref().map(|s| s.address());

    let provider = match signer {
        Some(signer) => {
            let builder = ProviderBuilder::new().wallet(EthereumWallet::from(signer));
            connect_with!(builder, &config)
        }
        None => {
            let builder = ProviderBuilder::new();
            connect_with!(builder, &config)
        }
    };

    Ok(Box::new(AlloyProvider {
        provider,
        endpoint,
        sender,
    }))
}

/// Parse a hex private key, with or without `0x`
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    let key = private_key.trim();
    let key = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    key.parse::<PrivateKeySigner>()
        .context("Invalid private key")
}

#[async_trait::async_trait]
impl EthereumProvider for AlloyProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256> {
        // No context here: node messages such as "execution reverted: ..." surface as-is
        let pending = self.provider.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;
        Ok(receipt.as_ref().map(convert_receipt))
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes> {
        Ok(self.provider.call(request).await?)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(request).await?)
    }

    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        let value = self.provider.get_storage_at(address, slot).await?;
        Ok(B256::from(value))
    }

    fn sender(&self) -> Option<Address> {
        self.sender
    }

    fn endpoint_name(&self) -> String {
        self.endpoint.clone()
    }
}
