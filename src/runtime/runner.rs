//! One-shot on-chain call runner
//!
//! `submit` walks a request through `built -> submitted -> (confirmed | failed)`
//! with a single awaited result. Failures are terminal: nothing is retried
//! and nothing is deduplicated, so submitting the same request twice sends
//! two transactions.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{b256, Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy_dyn_abi::DynSolValue;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::domain::call::{CallError, CallRequest, CallResult, CallTarget, Receipt};
use crate::infrastructure::abi::{decoder, encoder};
use crate::infrastructure::ethereum::EthereumProvider;

/// EIP-1967 implementation slot: `keccak256("eip1967.proxy.implementation") - 1`
pub const IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// Default delay between receipt polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Knobs for the confirmation wait
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    pub poll_interval: Duration,
    /// `None` waits as long as it takes
    pub confirmation_timeout: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: None,
        }
    }
}

/// Receives every call that reached the provider, whatever its outcome
pub trait SubmissionLog: Send + Sync {
    fn record(&self, request: &CallRequest, result: &CallResult);
}

pub struct OnChainCallRunner {
    provider: Arc<dyn EthereumProvider>,
    options: RunnerOptions,
    log: Option<Arc<dyn SubmissionLog>>,
}

impl OnChainCallRunner {
    pub fn new(provider: Arc<dyn EthereumProvider>, options: RunnerOptions) -> Self {
        Self {
            provider,
            options,
            log: None,
        }
    }

    pub fn with_log(mut self, log: Arc<dyn SubmissionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn provider(&self) -> &dyn EthereumProvider {
        self.provider.as_ref()
    }

    /// Submit one transaction and wait for `request.confirmations` blocks
    pub async fn submit(&self, request: &CallRequest) -> CallResult {
        let tx = match build_transaction(request) {
            Ok(tx) => tx,
            Err(err) => return CallResult::Failed(err),
        };

        let result = self.send_and_wait(request, tx).await;
        if let Some(log) = &self.log {
            log.record(request, &result);
        }
        result
    }

    async fn send_and_wait(&self, request: &CallRequest, tx: TransactionRequest) -> CallResult {
        info!(
            label = %request.label,
            method = request.method(),
            target = %request.target_display(),
            args = ?request.args,
            "submitting transaction"
        );

        let tx_hash = match self.provider.send_transaction(tx).await {
            Ok(hash) => hash,
            Err(err) => return CallResult::Failed(CallError::Submission(format!("{err:#}"))),
        };
        info!(%tx_hash, "transaction accepted by node");

        if request.confirmations == 0 {
            return CallResult::Submitted { tx_hash };
        }

        info!(
            confirmations = request.confirmations,
            "waiting {} block(s) for confirmation",
            request.confirmations
        );

        match self.wait_for_confirmations(tx_hash, request.confirmations).await {
            Ok(receipt) if receipt.success => CallResult::Confirmed { tx_hash, receipt },
            Ok(receipt) => CallResult::Failed(CallError::Reverted { tx_hash, receipt }),
            Err(err) => {
                warn!(%tx_hash, "outcome unknown, reconcile manually: {err}");
                CallResult::Failed(err)
            }
        }
    }

    /// Call a view method and decode its outputs; never sends a transaction
    pub async fn read(&self, request: &CallRequest) -> Result<Vec<DynSolValue>, CallError> {
        let CallTarget::Contract { function, .. } = &request.target else {
            return Err(CallError::Construction(
                "read calls need a deployed contract".to_string(),
            ));
        };

        let tx = build_transaction(request)?;
        debug!(method = %function.name, "eth_call");
        let data = self
            .provider
            .call(tx)
            .await
            .map_err(|err| CallError::Submission(format!("{err:#}")))?;

        decoder::decode_output(function, &data).map_err(|message| CallError::Decode {
            method: function.name.clone(),
            message,
        })
    }

    /// Gas the node expects the request to consume
    pub async fn estimate(&self, request: &CallRequest) -> Result<u64, CallError> {
        let tx = build_transaction(request)?;
        self.provider
            .estimate_gas(tx)
            .await
            .map_err(|err| CallError::Submission(format!("{err:#}")))
    }

    /// Implementation address stored in a proxy's EIP-1967 slot
    pub async fn implementation_of(&self, proxy: Address) -> Result<Address, CallError> {
        let word = self
            .provider
            .get_storage_at(proxy, U256::from_be_bytes(IMPLEMENTATION_SLOT.0))
            .await
            .map_err(|err| CallError::Submission(format!("{err:#}")))?;
        Ok(Address::from_word(word))
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<Receipt, CallError> {
        let started = Instant::now();
        let wait = self.poll_confirmations(tx_hash, confirmations);

        match self.options.confirmation_timeout {
            None => wait.await,
            Some(limit) => match timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => Err(CallError::Timeout {
                    tx_hash,
                    confirmations,
                    waited: started.elapsed(),
                }),
            },
        }
    }

    async fn poll_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<Receipt, CallError> {
        let lost = |err: anyhow::Error| CallError::Confirmation {
            tx_hash,
            message: format!("{err:#}"),
        };

        loop {
            match self.provider.get_receipt(tx_hash).await.map_err(lost)? {
                Some(receipt) if receipt.block_number.is_some() => {
                    let tip = self.provider.block_number().await.map_err(lost)?;
                    let depth = receipt.depth_at(tip);
                    if depth >= confirmations {
                        info!(
                            %tx_hash,
                            block = receipt.block_number,
                            depth,
                            "transaction confirmed"
                        );
                        return Ok(receipt);
                    }
                    debug!(%tx_hash, depth, wanted = confirmations, "waiting for depth");
                }
                _ => debug!(%tx_hash, "not mined yet"),
            }
            sleep(self.options.poll_interval).await;
        }
    }
}

/// Encode a request into an unsigned transaction
pub fn build_transaction(request: &CallRequest) -> Result<TransactionRequest, CallError> {
    let tx = match &request.target {
        CallTarget::Contract { address, function } => {
            let input = encoder::encode_function_call(function, &request.args)
                .map_err(CallError::Construction)?;
            TransactionRequest::default()
                .with_to(*address)
                .with_input(input)
        }
        CallTarget::Deploy {
            bytecode,
            constructor,
        } => {
            let code = encoder::encode_deployment(bytecode, constructor.as_ref(), &request.args)
                .map_err(CallError::Construction)?;
            TransactionRequest::default().with_deploy_code(code)
        }
    };

    if request.value.is_zero() {
        Ok(tx)
    } else {
        Ok(tx.with_value(request.value))
    }
}
