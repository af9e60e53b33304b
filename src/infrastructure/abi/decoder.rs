//! Return data decoding using alloy-dyn-abi

use alloy_dyn_abi::{DynSolValue, FunctionExt};
use alloy_json_abi::Function;

/// Decode the return data of `function`
pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<DynSolValue>, String> {
    if function.outputs.is_empty() {
        return Ok(Vec::new());
    }
    function.abi_decode_output(data).map_err(|e| e.to_string())
}

/// Format decoded outputs as `name: value` lines, `value` for unnamed outputs
pub fn format_outputs(function: &Function, values: &[DynSolValue]) -> Vec<String> {
    function
        .outputs
        .iter()
        .zip(values)
        .map(|(param, value)| {
            let rendered = format_dyn_sol_value(value);
            if param.name.trim().is_empty() {
                rendered
            } else {
                format!("{}: {}", param.name, rendered)
            }
        })
        .collect()
}

/// Format a DynSolValue for display
pub fn format_dyn_sol_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => {
            let s = u.to_string();
            // Token ids derived from uuids read better in hex
            if s.len() > 20 {
                format!("0x{:x}", u)
            } else {
                s
            }
        }
        DynSolValue::FixedBytes(word, size) => {
            let bytes = &word.as_slice()[..(*size).min(32)];
            format!("0x{}", hex::encode(bytes))
        }
        DynSolValue::Address(addr) => addr.to_string(),
        DynSolValue::Function(func) => format!("0x{}", hex::encode(func.as_slice())),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::String(s) => format!("\"{}\"", s),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) => {
            let items: Vec<String> = arr.iter().map(format_dyn_sol_value).collect();
            format!("[{}]", items.join(", "))
        }
        DynSolValue::Tuple(fields) => {
            let items: Vec<String> = fields.iter().map(format_dyn_sol_value).collect();
            format!("({})", items.join(", "))
        }
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}
