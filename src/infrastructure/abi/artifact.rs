//! Compiled contract artifacts (Hardhat, Foundry, or a bare ABI array)

use std::fs;
use std::path::{Path, PathBuf};

use alloy_json_abi::{Constructor, Function, JsonAbi, Param};
use alloy_primitives::{keccak256, Bytes};
use anyhow::{anyhow, bail, Context, Result};

use crate::domain::abi::{AbiRegistry, FunctionSignature, ParamSpec};

/// ABI and bytecode of one compiled contract
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub source: PathBuf,
    pub abi: JsonAbi,
    bytecode: Option<Bytes>,
    registry: AbiRegistry,
}

impl Artifact {
    /// Load an artifact file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read artifact {}", path.display()))?;
        let fallback_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("contract")
            .to_string();
        Self::from_json_str(&fallback_name, path, &content)
            .with_context(|| format!("parse artifact {}", path.display()))
    }

    /// Parse artifact JSON; `fallback_name` is used when it carries no `contractName`
    pub fn from_json_str(fallback_name: &str, source: &Path, content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;

        // Either raw array or nested in "abi" field
        let (abi_value, bytecode) = if value.is_array() {
            (value.clone(), None)
        } else if let Some(abi) = value.get("abi") {
            (abi.clone(), parse_bytecode(value.get("bytecode"))?)
        } else {
            bail!("no ABI found");
        };

        let abi: JsonAbi = serde_json::from_value(abi_value)?;
        let name = value
            .get("contractName")
            .and_then(|v| v.as_str())
            .unwrap_or(fallback_name)
            .to_string();

        let mut registry = AbiRegistry::new();
        for function in abi.functions() {
            registry.insert(function_signature(function, source));
        }

        Ok(Self {
            name,
            source: source.to_path_buf(),
            abi,
            bytecode,
            registry,
        })
    }

    pub fn registry(&self) -> &AbiRegistry {
        &self.registry
    }

    /// Resolve `method` (name, signature or selector) to its ABI fragment
    pub fn function(&self, method: &str, arg_count: usize) -> Result<Function> {
        let signature = self
            .registry
            .resolve(method, arg_count)
            .map_err(|err| anyhow!("{}: {err}", self.name))?;
        self.abi
            .function(&signature.name)
            .and_then(|overloads| {
                overloads
                    .iter()
                    .find(|f| f.signature() == signature.signature)
            })
            .cloned()
            .ok_or_else(|| anyhow!("{}: no fragment for {}", self.name, signature.signature))
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.abi.constructor()
    }

    /// Creation bytecode; fails for interfaces and unlinked artifacts
    pub fn bytecode(&self) -> Result<Bytes> {
        match &self.bytecode {
            Some(code) if !code.is_empty() => Ok(code.clone()),
            _ => bail!("{} has no deployable bytecode", self.name),
        }
    }

    /// One line per ABI item: constructor, functions, events, errors
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(constructor) = self.abi.constructor() {
            lines.push(format!(
                "Constructor: {}",
                params_string(&constructor.inputs)
            ));
        }

        for function in self.abi.functions() {
            lines.push(format!(
                "{} (function, {}): {} => {}",
                function.name,
                function.state_mutability.as_json_str(),
                params_string(&function.inputs),
                params_string(&function.outputs)
            ));
        }

        for event in self.abi.events() {
            let inputs: Vec<String> = event
                .inputs
                .iter()
                .map(|p| param_string(&p.name, &p.ty))
                .collect();
            lines.push(format!("{} (event): {}", event.name, or_none(inputs)));
        }

        for error in self.abi.errors() {
            lines.push(format!(
                "{} (error): {}",
                error.name,
                params_string(&error.inputs)
            ));
        }

        lines
    }
}

fn function_signature(function: &Function, source: &Path) -> FunctionSignature {
    let signature = function.signature();
    let hash = keccak256(signature.as_bytes());
    FunctionSignature {
        selector: [hash[0], hash[1], hash[2], hash[3]],
        name: function.name.clone(),
        signature,
        inputs: param_specs(&function.inputs),
        outputs: param_specs(&function.outputs),
        mutability: function.state_mutability.as_json_str().to_string(),
        source: source.to_path_buf(),
    }
}

fn param_specs(params: &[Param]) -> Vec<ParamSpec> {
    params
        .iter()
        .map(|p| ParamSpec {
            name: p.name.clone(),
            kind: p.selector_type().into_owned(),
        })
        .collect()
}

/// Hardhat stores `"bytecode": "0x.."`, Foundry `"bytecode": {"object": "0x.."}`
fn parse_bytecode(value: Option<&serde_json::Value>) -> Result<Option<Bytes>> {
    let raw = match value {
        Some(serde_json::Value::String(s)) => s.as_str(),
        Some(serde_json::Value::Object(obj)) => match obj.get("object").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };

    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.contains("__") {
        bail!("bytecode has unlinked library references");
    }
    let bytes = hex::decode(raw).context("invalid bytecode hex")?;
    Ok(Some(Bytes::from(bytes)))
}

fn params_string(params: &[Param]) -> String {
    or_none(
        params
            .iter()
            .map(|p| param_string(&p.name, &p.selector_type()))
            .collect(),
    )
}

fn param_string(name: &str, ty: &str) -> String {
    if name.is_empty() {
        ty.to_string()
    } else {
        format!("{name} ({ty})")
    }
}

fn or_none(items: Vec<String>) -> String {
    if items.is_empty() {
        "NONE".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT: &str = r#"{
        "contractName": "UVCollectable",
        "abi": [
            {"type": "constructor", "inputs": [], "stateMutability": "nonpayable"},
            {"type": "function", "name": "mintToken", "stateMutability": "nonpayable",
             "inputs": [{"name": "eventId", "type": "uint256"}, {"name": "to", "type": "address"}],
             "outputs": []},
            {"type": "function", "name": "getVersion", "stateMutability": "pure",
             "inputs": [], "outputs": [{"name": "", "type": "string"}]},
            {"type": "event", "name": "Minted", "anonymous": false,
             "inputs": [{"name": "to", "type": "address", "indexed": true}]}
        ],
        "bytecode": "0x6080604052"
    }"#;

    const FOUNDRY: &str = r#"{
        "abi": [{"type": "function", "name": "totalSupply", "stateMutability": "view",
                 "inputs": [], "outputs": [{"name": "", "type": "uint256"}]}],
        "bytecode": {"object": "0x60806040", "linkReferences": {}}
    }"#;

    #[test]
    fn test_load_hardhat_artifact() {
        let artifact = Artifact::from_json_str("x", Path::new("a.json"), HARDHAT).unwrap();
        assert_eq!(artifact.name, "UVCollectable");
        assert_eq!(artifact.bytecode().unwrap().len(), 5);
        assert!(artifact.constructor().is_some());

        let mint = artifact.function("mintToken", 2).unwrap();
        assert_eq!(mint.signature(), "mintToken(uint256,address)");
        assert!(artifact.function("burn", 0).is_err());
    }

    #[test]
    fn test_load_foundry_artifact() {
        let artifact = Artifact::from_json_str("Token", Path::new("out/Token.json"), FOUNDRY).unwrap();
        assert_eq!(artifact.name, "Token");
        assert_eq!(artifact.bytecode().unwrap().len(), 4);
        assert!(artifact.registry().resolve("totalSupply", 0).unwrap().is_read_only());
    }

    #[test]
    fn test_bare_abi_has_no_bytecode() {
        let artifact = Artifact::from_json_str(
            "IERC721",
            Path::new("IERC721.json"),
            r#"[{"type": "function", "name": "ownerOf", "stateMutability": "view",
                 "inputs": [{"name": "tokenId", "type": "uint256"}],
                 "outputs": [{"name": "", "type": "address"}]}]"#,
        )
        .unwrap();
        assert!(artifact.bytecode().is_err());
        assert_eq!(artifact.registry().len(), 1);
    }

    #[test]
    fn test_unlinked_bytecode_rejected() {
        let json = r#"{"abi": [], "bytecode": "0x6080__$abc$__6040"}"#;
        let err = Artifact::from_json_str("L", Path::new("L.json"), json).unwrap_err();
        assert!(err.to_string().contains("unlinked"));
    }

    #[test]
    fn test_describe() {
        let artifact = Artifact::from_json_str("x", Path::new("a.json"), HARDHAT).unwrap();
        let lines = artifact.describe();
        assert_eq!(lines[0], "Constructor: NONE");
        assert!(lines.contains(
            &"mintToken (function, nonpayable): eventId (uint256), to (address) => NONE".to_string()
        ));
        assert!(lines.contains(&"getVersion (function, pure): NONE => string".to_string()));
        assert!(lines.contains(&"Minted (event): to (address)".to_string()));
    }
}
