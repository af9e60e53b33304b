//! ABI registry - method signatures of one artifact, by selector and name

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A function parameter specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name (may be empty)
    pub name: String,
    /// Solidity type (e.g., "address", "uint256", "(uint256,address)")
    pub kind: String,
}

/// A function signature with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// 4-byte function selector
    pub selector: [u8; 4],
    /// Function name
    pub name: String,
    /// Full signature string (e.g., "transfer(address,uint256)")
    pub signature: String,
    /// Input parameters
    pub inputs: Vec<ParamSpec>,
    /// Output parameters
    pub outputs: Vec<ParamSpec>,
    /// "view", "pure", "nonpayable" or "payable"
    pub mutability: String,
    /// Artifact the signature was read from
    pub source: PathBuf,
}

impl FunctionSignature {
    /// Get selector as hex string
    pub fn selector_hex(&self) -> String {
        format!("0x{}", hex::encode(self.selector))
    }

    /// Whether calling it cannot change state
    pub fn is_read_only(&self) -> bool {
        matches!(self.mutability.as_str(), "view" | "pure")
    }
}

/// Why a method reference could not be pinned to one function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no method matching '{0}'")]
    NotFound(String),
    #[error("'{name}' is overloaded, use one of: {}", .candidates.join(", "))]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
}

/// Registry of function signatures indexed by selector
#[derive(Debug, Default, Clone)]
pub struct AbiRegistry {
    functions: HashMap<[u8; 4], FunctionSignature>,
    /// Method name -> selectors, in insertion order
    by_name: HashMap<String, Vec<[u8; 4]>>,
}

impl AbiRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a function signature
    ///
    /// Note: First function for a given selector wins (no overwrite)
    pub fn insert(&mut self, function: FunctionSignature) {
        if self.functions.contains_key(&function.selector) {
            return;
        }
        self.by_name
            .entry(function.name.clone())
            .or_default()
            .push(function.selector);
        self.functions.insert(function.selector, function);
    }

    /// Look up a function by selector
    pub fn lookup(&self, selector: [u8; 4]) -> Option<&FunctionSignature> {
        self.functions.get(&selector)
    }

    /// Look up a function by selector hex string (e.g., "0xa9059cbb")
    pub fn lookup_hex(&self, selector_hex: &str) -> Option<&FunctionSignature> {
        let normalized = selector_hex
            .strip_prefix("0x")
            .or_else(|| selector_hex.strip_prefix("0X"))
            .unwrap_or(selector_hex);

        if normalized.len() != 8 {
            return None;
        }

        let bytes = hex::decode(normalized).ok()?;
        let selector: [u8; 4] = bytes.try_into().ok()?;
        self.lookup(selector)
    }

    /// All overloads sharing a method name
    pub fn lookup_name(&self, name: &str) -> Vec<&FunctionSignature> {
        self.by_name
            .get(name)
            .map(|selectors| selectors.iter().filter_map(|s| self.lookup(*s)).collect())
            .unwrap_or_default()
    }

    /// Pin a method reference to one function
    ///
    /// `method` may be a bare name, a full signature such as
    /// `mint(address,uint256)`, or a selector. Overloads of a bare name are
    /// narrowed by `arg_count`.
    pub fn resolve(&self, method: &str, arg_count: usize) -> Result<&FunctionSignature, LookupError> {
        let method = method.trim();

        if method.starts_with("0x") || method.starts_with("0X") {
            return self
                .lookup_hex(method)
                .ok_or_else(|| LookupError::NotFound(method.to_string()));
        }

        if method.contains('(') {
            let wanted = method.replace(' ', "");
            return self
                .functions
                .values()
                .find(|f| f.signature == wanted)
                .ok_or_else(|| LookupError::NotFound(method.to_string()));
        }

        let candidates = self.lookup_name(method);
        match candidates.len() {
            0 => Err(LookupError::NotFound(method.to_string())),
            1 => Ok(candidates[0]),
            _ => {
                let by_arity: Vec<&FunctionSignature> = candidates
                    .iter()
                    .copied()
                    .filter(|f| f.inputs.len() == arg_count)
                    .collect();
                if by_arity.len() == 1 {
                    Ok(by_arity[0])
                } else {
                    let mut signatures: Vec<String> =
                        candidates.iter().map(|f| f.signature.clone()).collect();
                    signatures.sort();
                    Err(LookupError::Ambiguous {
                        name: method.to_string(),
                        candidates: signatures,
                    })
                }
            }
        }
    }

    /// Get the number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Get all functions, sorted by signature
    pub fn functions(&self) -> Vec<&FunctionSignature> {
        let mut functions: Vec<_> = self.functions.values().collect();
        functions.sort_by(|a, b| a.signature.cmp(&b.signature));
        functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(selector: [u8; 4], name: &str, sig: &str, arity: usize) -> FunctionSignature {
        FunctionSignature {
            selector,
            name: name.to_string(),
            signature: sig.to_string(),
            inputs: (0..arity)
                .map(|i| ParamSpec {
                    name: format!("p{i}"),
                    kind: "uint256".to_string(),
                })
                .collect(),
            outputs: vec![],
            mutability: "nonpayable".to_string(),
            source: PathBuf::from("test.json"),
        }
    }

    #[test]
    fn test_registry_insert_lookup() {
        let mut registry = AbiRegistry::new();
        registry.insert(signature(
            [0xa9, 0x05, 0x9c, 0xbb],
            "transfer",
            "transfer(address,uint256)",
            2,
        ));

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup([0xa9, 0x05, 0x9c, 0xbb]).is_some());
        assert!(registry.lookup_hex("0xa9059cbb").is_some());
        assert!(registry.lookup_hex("0xdeadbeef").is_none());
        assert_eq!(registry.lookup_name("transfer").len(), 1);
    }

    #[test]
    fn test_first_wins() {
        let mut registry = AbiRegistry::new();
        registry.insert(signature([1, 2, 3, 4], "transfer", "transfer(address,uint256)", 2));
        registry.insert(signature([1, 2, 3, 4], "transferV2", "transferV2(address,uint256)", 2));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup([1, 2, 3, 4]).unwrap().name, "transfer");
        assert!(registry.lookup_name("transferV2").is_empty());
    }

    #[test]
    fn test_resolve_overloads_by_arity() {
        let mut registry = AbiRegistry::new();
        registry.insert(signature([1, 0, 0, 0], "mintToken", "mintToken(uint256,address)", 2));
        registry.insert(signature(
            [2, 0, 0, 0],
            "mintToken",
            "mintToken(uint256,address,bool,uint256)",
            4,
        ));

        assert_eq!(
            registry.resolve("mintToken", 4).unwrap().signature,
            "mintToken(uint256,address,bool,uint256)"
        );
        assert_eq!(
            registry.resolve("mintToken(uint256, address)", 0).unwrap().selector,
            [1, 0, 0, 0]
        );
        assert!(matches!(
            registry.resolve("mintToken", 3),
            Err(LookupError::Ambiguous { .. })
        ));
        assert_eq!(
            registry.resolve("burn", 1).unwrap_err(),
            LookupError::NotFound("burn".into())
        );
    }

    #[test]
    fn test_resolve_by_selector() {
        let mut registry = AbiRegistry::new();
        registry.insert(signature([0xde, 0xad, 0xbe, 0xef], "setURI", "setURI(string)", 1));
        assert_eq!(registry.resolve("0xdeadbeef", 0).unwrap().name, "setURI");
    }
}
