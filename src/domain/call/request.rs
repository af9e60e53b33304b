//! Call request - everything needed to submit one transaction

use alloy_json_abi::{Constructor, Function};
use alloy_primitives::{Address, Bytes, U256};

/// Default confirmation depth used by the deployment scripts this tool replaces
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// What the transaction is aimed at
#[derive(Debug, Clone)]
pub enum CallTarget {
    /// A method on an already deployed contract
    Contract { address: Address, function: Function },
    /// A contract creation from compiled bytecode
    Deploy {
        bytecode: Bytes,
        constructor: Option<Constructor>,
    },
}

/// A single on-chain call, fully formed before submission
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// Human readable name used in logs and the journal
    pub label: String,
    pub target: CallTarget,
    /// Arguments as text, coerced to the fragment's ABI types at submission
    pub args: Vec<String>,
    /// Native currency attached to the call, in wei
    pub value: U256,
    /// Blocks to wait for after submission; 0 means "submitted, unconfirmed"
    pub confirmations: u64,
}

impl CallRequest {
    /// Call `function` on the contract at `address`
    pub fn call(address: Address, function: Function, args: Vec<String>) -> Self {
        Self {
            label: function.name.clone(),
            target: CallTarget::Contract { address, function },
            args,
            value: U256::ZERO,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    /// Deploy `bytecode`, passing `args` to the constructor
    pub fn deploy(bytecode: Bytes, constructor: Option<Constructor>, args: Vec<String>) -> Self {
        Self {
            label: "deploy".to_string(),
            target: CallTarget::Deploy {
                bytecode,
                constructor,
            },
            args,
            value: U256::ZERO,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Address of the target contract, `None` for deployments
    pub fn contract_address(&self) -> Option<Address> {
        match &self.target {
            CallTarget::Contract { address, .. } => Some(*address),
            CallTarget::Deploy { .. } => None,
        }
    }

    /// Name of the invoked method ("constructor" for deployments)
    pub fn method(&self) -> &str {
        match &self.target {
            CallTarget::Contract { function, .. } => &function.name,
            CallTarget::Deploy { .. } => "constructor",
        }
    }

    /// Short description of the target for logs and the journal
    pub fn target_display(&self) -> String {
        match &self.target {
            CallTarget::Contract { address, .. } => address.to_string(),
            CallTarget::Deploy { bytecode, .. } => format!("create ({} bytes)", bytecode.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_call_defaults() {
        let function = Function::parse("function mintToken(uint256 eventId, address to)").unwrap();
        let target = address!("0x9367Ee417ae552cb94f3249d0424000747877AA8");
        let request = CallRequest::call(target, function, vec!["10".into(), target.to_string()]);

        assert_eq!(request.label, "mintToken");
        assert_eq!(request.method(), "mintToken");
        assert_eq!(request.contract_address(), Some(target));
        assert_eq!(request.confirmations, DEFAULT_CONFIRMATIONS);
        assert_eq!(request.value, U256::ZERO);
    }

    #[test]
    fn test_deploy_has_no_address() {
        let request = CallRequest::deploy(Bytes::from(vec![0x60, 0x80]), None, vec![])
            .with_label("PaymentSplitter")
            .with_confirmations(6);

        assert_eq!(request.contract_address(), None);
        assert_eq!(request.method(), "constructor");
        assert_eq!(request.label, "PaymentSplitter");
        assert_eq!(request.confirmations, 6);
        assert_eq!(request.target_display(), "create (2 bytes)");
    }
}
