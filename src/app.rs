//! A connected session: settings, provider and runner, plus the dispatch
//! from manifest entries to runner operations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::Settings;
use crate::domain::call::{CallRequest, CallResult, CallTarget, Receipt};
use crate::domain::manifest::{CallDefinition, CallKind};
use crate::infrastructure::abi::{decoder, Artifact, ArtifactScanner};
use crate::infrastructure::ethereum::{create_provider, parse_signer, EthereumProvider, ProviderConfig};
use crate::runtime::flows::{self, Deployment, ProxyDeployment, Upgrade};
use crate::runtime::OnChainCallRunner;
use crate::store::{Journal, JournalLog};

/// What running a call produced, ready to print
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Transaction accepted; `receipt` is present once confirmed
    Sent {
        tx_hash: B256,
        receipt: Option<Receipt>,
    },
    /// Decoded return values of a view call
    Values(Vec<String>),
    Gas(u64),
    Deployed(Deployment),
    Proxy(ProxyDeployment),
    Upgraded(Upgrade),
    Implementation(Address),
}

impl Outcome {
    /// Lines for stdout
    pub fn lines(&self) -> Vec<String> {
        match self {
            Outcome::Sent {
                tx_hash,
                receipt: Some(receipt),
            } => vec![
                format!("tx: {tx_hash}"),
                format!(
                    "block: {}",
                    receipt
                        .block_number
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string())
                ),
                format!("gas used: {}", receipt.gas_used),
            ],
            Outcome::Sent {
                tx_hash,
                receipt: None,
            } => vec![format!("submitted: {tx_hash}")],
            Outcome::Values(values) if values.is_empty() => vec!["(no outputs)".to_string()],
            Outcome::Values(values) => values.clone(),
            Outcome::Gas(gas) => vec![format!("gas: {gas}")],
            Outcome::Deployed(deployment) => vec![
                format!("address: {}", deployment.address),
                format!("tx: {}", deployment.tx_hash),
            ],
            Outcome::Proxy(deployment) => vec![
                format!("implementation: {}", deployment.implementation.address),
                format!("proxy: {}", deployment.proxy.address),
                format!("slot: {}", deployment.verified_implementation),
            ],
            Outcome::Upgraded(upgrade) => vec![
                format!("implementation: {}", upgrade.implementation.address),
                format!("tx: {}", upgrade.upgrade_tx),
                format!("slot: {}", upgrade.verified_implementation),
            ],
            Outcome::Implementation(address) => vec![address.to_string()],
        }
    }
}

pub struct Session {
    settings: Settings,
    runner: OnChainCallRunner,
}

impl Session {
    /// Connect to the configured endpoint; `signing` demands a private key
    pub async fn connect(settings: Settings, signing: bool) -> Result<Self> {
        let signer = if signing {
            Some(parse_signer(settings.require_private_key()?)?)
        } else {
            settings.private_key.as_deref().map(parse_signer).transpose()?
        };

        let endpoint = ProviderConfig::from_endpoint(&settings.rpc_url);
        let provider: Arc<dyn EthereumProvider> = Arc::from(
            create_provider(endpoint, signer)
                .await
                .with_context(|| format!("connect to {}", settings.network))?,
        );

        let chain_id = provider.chain_id().await.context("query chain id")?;
        if let Some(expected) = settings.expected_chain_id {
            if expected != chain_id {
                bail!(
                    "network '{}' expects chain id {expected}, node reports {chain_id}",
                    settings.network
                );
            }
        }
        info!(
            network = %settings.network,
            endpoint = %provider.endpoint_name(),
            chain_id,
            sender = ?provider.sender(),
            explorer_key = settings.masked_explorer_key().as_deref().unwrap_or("-"),
            "connected"
        );

        let mut runner = OnChainCallRunner::new(provider, settings.runner);
        if settings.journal {
            match open_journal(settings.journal_path.as_deref()) {
                Ok(journal) => {
                    runner = runner.with_log(Arc::new(JournalLog::new(journal, &settings.network)));
                }
                Err(err) => warn!("journal disabled: {err:#}"),
            }
        }

        Ok(Self { settings, runner })
    }

    /// Session over an already-built runner
    pub fn new(settings: Settings, runner: OnChainCallRunner) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runner(&self) -> &OnChainCallRunner {
        &self.runner
    }

    /// Load an artifact by path or contract name from the artifact roots
    pub fn load_artifact(&self, reference: &str) -> Result<Artifact> {
        let path = ArtifactScanner::resolve(reference, &self.settings.artifact_roots)?;
        Artifact::load(&path)
    }

    /// Execute one manifest entry; `env` resolves `env:` references
    pub async fn run_definition(
        &self,
        definition: &CallDefinition,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Outcome> {
        info!(call = %definition.name, kind = definition.kind.as_str(), "running");
        let artifact = self.load_artifact(&definition.artifact)?;
        let args = definition.arg_strings();

        let outcome = match definition.kind {
            CallKind::Send => {
                let request = self.contract_request(definition, &artifact, args, &env)?;
                sent(self.runner.submit(&request).await)?
            }
            CallKind::Read => {
                let request = self.contract_request(definition, &artifact, args, &env)?;
                let values = self.runner.read(&request).await?;
                let lines = match &request.target {
                    CallTarget::Contract { function, .. } => {
                        decoder::format_outputs(function, &values)
                    }
                    _ => values.iter().map(decoder::format_dyn_sol_value).collect(),
                };
                Outcome::Values(lines)
            }
            CallKind::Deploy => Outcome::Deployed(
                flows::deploy(
                    &self.runner,
                    &artifact,
                    args,
                    definition.value_wei()?,
                    definition.confirmations,
                )
                .await?,
            ),
            CallKind::DeployProxy => {
                let Some(proxy_ref) = definition.proxy_artifact.as_deref() else {
                    bail!("call '{}' has no proxy artifact", definition.name);
                };
                let proxy = self.load_artifact(proxy_ref)?;
                Outcome::Proxy(
                    flows::deploy_proxy(
                        &self.runner,
                        &artifact,
                        &proxy,
                        definition.initializer(),
                        args,
                        definition.value_wei()?,
                        definition.confirmations,
                    )
                    .await?,
                )
            }
            CallKind::Upgrade => {
                let proxy = definition.contract_address(&env)?;
                Outcome::Upgraded(
                    flows::upgrade_proxy(&self.runner, proxy, &artifact, definition.confirmations)
                        .await?,
                )
            }
            CallKind::Estimate => {
                let request = if definition.contract.is_some() {
                    self.contract_request(definition, &artifact, args, &env)?
                } else {
                    CallRequest::deploy(artifact.bytecode()?, artifact.constructor().cloned(), args)
                        .with_label(definition.name.clone())
                        .with_value(definition.value_wei()?)
                };
                Outcome::Gas(self.runner.estimate(&request).await?)
            }
        };

        Ok(outcome)
    }

    /// Implementation behind an EIP-1967 proxy
    pub async fn implementation(&self, proxy: Address) -> Result<Outcome> {
        Ok(Outcome::Implementation(
            self.runner.implementation_of(proxy).await?,
        ))
    }

    fn contract_request(
        &self,
        definition: &CallDefinition,
        artifact: &Artifact,
        args: Vec<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<CallRequest> {
        let Some(method) = definition.method.as_deref() else {
            bail!("call '{}' has no method", definition.name);
        };
        let address = definition.contract_address(env)?;
        let function = artifact.function(method, args.len())?;

        Ok(CallRequest::call(address, function, args)
            .with_label(definition.name.clone())
            .with_confirmations(definition.confirmations)
            .with_value(definition.value_wei()?))
    }
}

fn sent(result: CallResult) -> Result<Outcome> {
    let tx_hash = result.tx_hash();
    let receipt = result.into_result()?;
    match tx_hash {
        Some(tx_hash) => Ok(Outcome::Sent { tx_hash, receipt }),
        None => bail!("call finished without a transaction hash"),
    }
}

fn open_journal(path: Option<&Path>) -> Result<Journal> {
    let Some(path) = path else {
        bail!("no data directory");
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create data dir {}", parent.display()))?;
    }
    Journal::open(path)
}
