//! Multi-step flows composed from single submissions
//!
//! Each step is an ordinary [`OnChainCallRunner::submit`]; a flow stops at
//! the first failed step. Deployed addresses are always read from mined
//! receipts, and proxy flows read the EIP-1967 slot back afterwards.

use alloy::primitives::{Address, B256, U256};
use alloy_json_abi::Function;
use tracing::{info, warn};

use crate::domain::call::{CallError, CallRequest, Receipt};
use crate::infrastructure::abi::{encoder, Artifact};
use crate::runtime::OnChainCallRunner;

/// Fallback fragment for proxies whose artifact omits the UUPS upgrade method
const UPGRADE_TO_AND_CALL: &str =
    "function upgradeToAndCall(address newImplementation, bytes data) payable";

/// A contract created by a confirmed deployment
#[derive(Debug, Clone)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: B256,
    pub receipt: Receipt,
}

#[derive(Debug, Clone)]
pub struct ProxyDeployment {
    pub implementation: Deployment,
    pub proxy: Deployment,
    /// Implementation read back from the proxy's EIP-1967 slot
    pub verified_implementation: Address,
}

#[derive(Debug, Clone)]
pub struct Upgrade {
    pub implementation: Deployment,
    pub upgrade_tx: B256,
    pub verified_implementation: Address,
}

/// Deploy `artifact`, endowing it with `value` wei, and wait for the receipt
/// carrying its address
pub async fn deploy(
    runner: &OnChainCallRunner,
    artifact: &Artifact,
    args: Vec<String>,
    value: U256,
    confirmations: u64,
) -> Result<Deployment, CallError> {
    require_confirmations(confirmations)?;
    let bytecode = artifact
        .bytecode()
        .map_err(|err| CallError::Construction(format!("{err:#}")))?;
    let request = CallRequest::deploy(bytecode, artifact.constructor().cloned(), args)
        .with_label(format!("deploy {}", artifact.name))
        .with_value(value)
        .with_confirmations(confirmations);

    let result = runner.submit(&request).await;
    let tx_hash = result.tx_hash();
    let receipt = result.into_result()?;

    match (tx_hash, receipt) {
        (Some(tx_hash), Some(receipt)) => match receipt.contract_address {
            Some(address) => {
                info!(contract = %artifact.name, %address, "deployed");
                Ok(Deployment {
                    address,
                    tx_hash,
                    receipt,
                })
            }
            None => Err(CallError::Confirmation {
                tx_hash,
                message: "receipt carries no contract address".to_string(),
            }),
        },
        _ => Err(CallError::Construction(
            "deployment finished without a receipt".to_string(),
        )),
    }
}

/// Deploy `implementation` behind a fresh `proxy`, calling `initializer` through it
///
/// `value` goes to the proxy's constructor, which forwards it to the initializer.
pub async fn deploy_proxy(
    runner: &OnChainCallRunner,
    implementation: &Artifact,
    proxy: &Artifact,
    initializer: &str,
    init_args: Vec<String>,
    value: U256,
    confirmations: u64,
) -> Result<ProxyDeployment, CallError> {
    require_confirmations(confirmations)?;

    // Encode the initializer first so bad arguments fail before any deployment
    let init_fn = implementation
        .function(initializer, init_args.len())
        .map_err(|err| CallError::Construction(format!("{err:#}")))?;
    let init_data =
        encoder::encode_function_call(&init_fn, &init_args).map_err(CallError::Construction)?;

    let implementation_deployment =
        deploy(runner, implementation, Vec::new(), U256::ZERO, confirmations).await?;

    let proxy_args = vec![
        implementation_deployment.address.to_string(),
        format!("0x{}", hex::encode(&init_data)),
    ];
    let proxy_deployment = deploy(runner, proxy, proxy_args, value, confirmations).await?;

    let verified = runner.implementation_of(proxy_deployment.address).await?;
    if verified != implementation_deployment.address {
        warn!(
            proxy = %proxy_deployment.address,
            expected = %implementation_deployment.address,
            found = %verified,
            "proxy points at an unexpected implementation"
        );
    }

    Ok(ProxyDeployment {
        implementation: implementation_deployment,
        proxy: proxy_deployment,
        verified_implementation: verified,
    })
}

/// Deploy a new `implementation` and point the UUPS `proxy` at it
///
/// `upgradeTo(address)` is preferred when the implementation has it. OZ 4.x
/// `upgradeToAndCall` always delegatecalls the new implementation, and with
/// empty data that reverts on contracts without a fallback.
pub async fn upgrade_proxy(
    runner: &OnChainCallRunner,
    proxy: Address,
    implementation: &Artifact,
    confirmations: u64,
) -> Result<Upgrade, CallError> {
    require_confirmations(confirmations)?;

    let (upgrade_fn, with_data) = upgrade_method(implementation)?;

    let before = runner.implementation_of(proxy).await?;
    info!(%proxy, current = %before, "upgrading proxy");

    let deployment = deploy(runner, implementation, Vec::new(), U256::ZERO, confirmations).await?;

    let mut upgrade_args = vec![deployment.address.to_string()];
    if with_data {
        upgrade_args.push("0x".to_string());
    }
    let request = CallRequest::call(proxy, upgrade_fn, upgrade_args)
        .with_label(format!("upgrade to {}", implementation.name))
        .with_confirmations(confirmations);

    let result = runner.submit(&request).await;
    let upgrade_tx = result.tx_hash();
    result.into_result()?;

    let verified = runner.implementation_of(proxy).await?;
    if verified != deployment.address {
        warn!(%proxy, expected = %deployment.address, found = %verified, "upgrade not visible in proxy slot");
    }

    Ok(Upgrade {
        implementation: deployment,
        upgrade_tx: upgrade_tx.unwrap_or_default(),
        verified_implementation: verified,
    })
}

/// The upgrade entry point and whether it takes a trailing `bytes` payload
fn upgrade_method(implementation: &Artifact) -> Result<(Function, bool), CallError> {
    if let Ok(function) = implementation.function("upgradeTo(address)", 1) {
        return Ok((function, false));
    }
    let function = match implementation.function("upgradeToAndCall(address,bytes)", 2) {
        Ok(function) => function,
        Err(_) => Function::parse(UPGRADE_TO_AND_CALL)
            .map_err(|err| CallError::Construction(err.to_string()))?,
    };
    Ok((function, true))
}

fn require_confirmations(confirmations: u64) -> Result<(), CallError> {
    if confirmations == 0 {
        return Err(CallError::Construction(
            "deployments need at least one confirmation to learn the contract address".to_string(),
        ));
    }
    Ok(())
}
