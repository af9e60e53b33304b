//! Scripted in-memory provider shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use chaincall::domain::call::Receipt;
use chaincall::infrastructure::ethereum::EthereumProvider;
use chaincall::runtime::{OnChainCallRunner, RunnerOptions, IMPLEMENTATION_SLOT};

/// `upgradeToAndCall(address,bytes)`
pub const UPGRADE_TO_AND_CALL_SELECTOR: [u8; 4] = [0x4f, 0x1e, 0xf2, 0x86];
/// `upgradeTo(address)`
pub const UPGRADE_TO_SELECTOR: [u8; 4] = [0x36, 0x59, 0xcf, 0xe6];

/// How submitted transactions get mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mining {
    /// Mined in the next block; the tip advances on every block number query
    Auto,
    /// Mined with a failed status
    Reverting,
    /// Accepted but never mined
    Never,
    /// Accepted, then every receipt query fails as if the connection dropped
    Disconnect,
}

#[derive(Default)]
struct State {
    tip: u64,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<B256, Receipt>,
    storage: HashMap<(Address, U256), B256>,
    created: u8,
}

pub struct ScriptedProvider {
    mining: Mining,
    submission_error: Option<String>,
    /// Creation code treated as an ERC-1967 proxy: its first constructor word is the implementation
    proxy_code: Option<Bytes>,
    state: Mutex<State>,
}

impl ScriptedProvider {
    pub fn new(mining: Mining) -> Self {
        Self {
            mining,
            submission_error: None,
            proxy_code: None,
            state: Mutex::new(State {
                tip: 100,
                ..Default::default()
            }),
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            submission_error: Some(message.to_string()),
            ..Self::new(Mining::Auto)
        }
    }

    pub fn with_proxy_code(mut self, code: Bytes) -> Self {
        self.proxy_code = Some(code);
        self
    }

    pub fn set_storage(&self, address: Address, slot: U256, value: B256) {
        self.state.lock().unwrap().storage.insert((address, slot), value);
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sender_address() -> Address {
        Address::with_last_byte(0xaa)
    }

    /// Address the n-th (1-based) contract creation lands at
    pub fn created_address(n: u8) -> Address {
        Address::with_last_byte(n)
    }
}

fn implementation_slot() -> U256 {
    U256::from_be_bytes(IMPLEMENTATION_SLOT.0)
}

#[async_trait]
impl EthereumProvider for ScriptedProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(31337)
    }

    async fn block_number(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if matches!(self.mining, Mining::Auto | Mining::Reverting) {
            state.tip += 1;
        }
        Ok(state.tip)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<B256> {
        if let Some(message) = &self.submission_error {
            return Err(anyhow!("{message}"));
        }

        let mut state = self.state.lock().unwrap();
        let nonce = state.sent.len() as u64;
        let tx_hash = keccak256(nonce.to_be_bytes());
        let input = request.input.input().cloned().unwrap_or_default();
        let to = request.to;
        state.sent.push(request);

        if matches!(self.mining, Mining::Never | Mining::Disconnect) {
            return Ok(tx_hash);
        }

        let success = self.mining == Mining::Auto;
        let mut receipt = Receipt {
            transaction_hash: tx_hash,
            block_number: Some(state.tip + 1),
            from: Self::sender_address(),
            to: None,
            contract_address: None,
            gas_used: 21_000,
            success,
        };
        state.tip += 1;

        match to {
            Some(TxKind::Call(address)) => {
                receipt.to = Some(address);
                let upgrades = input.len() >= 36
                    && (input[..4] == UPGRADE_TO_AND_CALL_SELECTOR || input[..4] == UPGRADE_TO_SELECTOR);
                if success && upgrades {
                    let word = B256::from_slice(&input[4..36]);
                    state.storage.insert((address, implementation_slot()), word);
                }
            }
            _ => {
                state.created += 1;
                let address = Self::created_address(state.created);
                receipt.contract_address = Some(address);
                if let Some(code) = &self.proxy_code {
                    if success && input.len() >= code.len() + 32 && input.starts_with(code) {
                        let word = B256::from_slice(&input[code.len()..code.len() + 32]);
                        state.storage.insert((address, implementation_slot()), word);
                    }
                }
            }
        }

        state.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        if self.mining == Mining::Disconnect {
            return Err(anyhow!("connection reset by peer"));
        }
        Ok(self.state.lock().unwrap().receipts.get(&hash).cloned())
    }

    async fn call(&self, _request: TransactionRequest) -> Result<Bytes> {
        // abi-encoded string "1.0.0"
        let mut out = vec![0u8; 96];
        out[31] = 0x20;
        out[63] = 5;
        out[64..69].copy_from_slice(b"1.0.0");
        Ok(Bytes::from(out))
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> Result<u64> {
        Ok(53_000)
    }

    async fn get_storage_at(&self, address: Address, slot: U256) -> Result<B256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .storage
            .get(&(address, slot))
            .copied()
            .unwrap_or_default())
    }

    fn sender(&self) -> Option<Address> {
        Some(Self::sender_address())
    }

    fn endpoint_name(&self) -> String {
        "scripted".to_string()
    }
}

pub fn fast_options() -> RunnerOptions {
    RunnerOptions {
        poll_interval: Duration::from_millis(5),
        confirmation_timeout: None,
    }
}

pub fn runner(provider: Arc<ScriptedProvider>) -> OnChainCallRunner {
    OnChainCallRunner::new(provider, fast_options())
}
