//! Manifest of named call definitions
//!
//! Each entry stands in for one deployment or administration script:
//!
//! ```toml
//! [[calls]]
//! name = "mint-event-to-many"
//! contract = "env:PROXY_CONTRACT"
//! artifact = "OctiTokenCollectable"
//! method = "mintEventToManyUsers"
//! args = ["10", ["0x9367Ee417ae552cb94f3249d0424000747877AA8"]]
//! confirmations = 1
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::domain::call::DEFAULT_CONFIRMATIONS;

/// Prefix marking a value to be read from the environment
pub const ENV_PREFIX: &str = "env:";

/// Initializer invoked through the proxy constructor when none is named
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// What a manifest entry does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallKind {
    /// State-changing method call
    #[default]
    Send,
    /// View call, no transaction
    Read,
    /// Plain contract creation
    Deploy,
    /// Implementation + ERC-1967 proxy with initializer
    DeployProxy,
    /// New implementation + UUPS upgrade call on an existing proxy
    Upgrade,
    /// Gas estimate for a call or deployment
    Estimate,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Send => "send",
            CallKind::Read => "read",
            CallKind::Deploy => "deploy",
            CallKind::DeployProxy => "deploy-proxy",
            CallKind::Upgrade => "upgrade",
            CallKind::Estimate => "estimate",
        }
    }

    /// Whether running it submits at least one transaction
    pub fn submits(&self) -> bool {
        !matches!(self, CallKind::Read | CallKind::Estimate)
    }
}

/// A manifest argument; lists render as `[a,b]` for the ABI encoder
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn to_arg_string(&self) -> String {
        match self {
            ArgValue::Bool(b) => b.to_string(),
            ArgValue::Integer(i) => i.to_string(),
            ArgValue::Text(s) => s.clone(),
            ArgValue::List(items) => {
                let items: Vec<String> = items.iter().map(ArgValue::to_list_item).collect();
                format!("[{}]", items.join(","))
            }
        }
    }

    /// Text that the encoder would split or unquote is double-quoted and escaped
    fn to_list_item(&self) -> String {
        match self {
            ArgValue::Text(s) if s.contains(['"', '\'', '\\', ',', '[', ']', '(', ')']) => {
                let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            }
            _ => self.to_arg_string(),
        }
    }
}

/// One named call
#[derive(Debug, Clone, Deserialize)]
pub struct CallDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: CallKind,
    pub description: Option<String>,
    /// Literal address or `env:NAME`; the proxy for `upgrade`
    pub contract: Option<String>,
    /// Artifact path or contract name; the implementation for proxy flows
    pub artifact: String,
    pub method: Option<String>,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Wei, decimal or 0x-hex
    pub value: Option<String>,
    /// Proxy artifact for `deploy-proxy` (typically ERC1967Proxy)
    pub proxy_artifact: Option<String>,
    /// Initializer for `deploy-proxy`, defaults to `initialize`
    pub initializer: Option<String>,
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

impl CallDefinition {
    /// Arguments rendered for the ABI encoder
    pub fn arg_strings(&self) -> Vec<String> {
        self.args.iter().map(ArgValue::to_arg_string).collect()
    }

    pub fn initializer(&self) -> &str {
        self.initializer.as_deref().unwrap_or(DEFAULT_INITIALIZER)
    }

    /// Resolve `contract` through `lookup` when it is an `env:` reference
    pub fn contract_address(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Address> {
        let Some(reference) = self.contract.as_deref() else {
            bail!("call '{}' has no contract address", self.name);
        };
        resolve_address(reference, lookup).with_context(|| format!("call '{}'", self.name))
    }

    pub fn value_wei(&self) -> Result<U256> {
        match self.value.as_deref() {
            None => Ok(U256::ZERO),
            Some(raw) => parse_wei(raw).with_context(|| format!("call '{}' value", self.name)),
        }
    }

    fn validate(&self) -> Result<()> {
        let needs_contract = matches!(
            self.kind,
            CallKind::Send | CallKind::Read | CallKind::Upgrade
        );
        if needs_contract && self.contract.is_none() {
            bail!("{} call '{}' needs `contract`", self.kind.as_str(), self.name);
        }
        if matches!(self.kind, CallKind::Send | CallKind::Read) && self.method.is_none() {
            bail!("{} call '{}' needs `method`", self.kind.as_str(), self.name);
        }
        if self.kind == CallKind::DeployProxy && self.proxy_artifact.is_none() {
            bail!("deploy-proxy call '{}' needs `proxy_artifact`", self.name);
        }
        if self.kind == CallKind::Upgrade && self.value.is_some() {
            bail!("upgrade call '{}' cannot carry `value`", self.name);
        }
        if self.kind == CallKind::Estimate && self.contract.is_some() && self.method.is_none() {
            bail!("estimate call '{}' has `contract` but no `method`", self.name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub calls: Vec<CallDefinition>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parse manifest {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;
        let mut seen = HashSet::new();
        for call in &manifest.calls {
            if !seen.insert(call.name.as_str()) {
                bail!("duplicate call name '{}'", call.name);
            }
            call.validate()?;
        }
        Ok(manifest)
    }

    pub fn get(&self, name: &str) -> Option<&CallDefinition> {
        self.calls.iter().find(|call| call.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().map(|call| call.name.as_str())
    }
}

/// Parse a literal address or an `env:NAME` reference
pub fn resolve_address(reference: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Address> {
    let reference = reference.trim();
    let raw = match reference.strip_prefix(ENV_PREFIX) {
        Some(var) => lookup(var).with_context(|| format!("environment variable {var} is not set"))?,
        None => reference.to_string(),
    };
    Address::from_str(raw.trim()).with_context(|| format!("invalid address '{}'", raw.trim()))
}

/// Parse a wei amount, decimal or 0x-hex
pub fn parse_wei(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).with_context(|| format!("invalid hex amount '{raw}'")),
        None => U256::from_str_radix(raw, 10).with_context(|| format!("invalid amount '{raw}'")),
    }
}
