//! Calldata encoding: text arguments coerced to ABI values

use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Constructor, Function, Param};
use alloy_primitives::{Address, Bytes, FixedBytes, I256, U256};

/// Encode a method call (selector + arguments)
pub fn encode_function_call(function: &Function, args: &[String]) -> Result<Bytes, String> {
    let values = coerce_args(&function.inputs, args)?;
    let calldata = function
        .abi_encode_input(&values)
        .map_err(|e| format!("{}: {}", function.signature(), e))?;
    Ok(Bytes::from(calldata))
}

/// Encode creation code: bytecode followed by the constructor arguments
pub fn encode_deployment(
    bytecode: &Bytes,
    constructor: Option<&Constructor>,
    args: &[String],
) -> Result<Bytes, String> {
    let mut code = bytecode.to_vec();

    match constructor {
        Some(constructor) => {
            let values = coerce_args(&constructor.inputs, args)?;
            let encoded = constructor
                .abi_encode_input(&values)
                .map_err(|e| format!("constructor: {}", e))?;
            code.extend_from_slice(&encoded);
        }
        None if !args.is_empty() => {
            return Err(format!(
                "Argument count mismatch: contract has no constructor, got {} arguments",
                args.len()
            ));
        }
        None => {}
    }

    Ok(Bytes::from(code))
}

/// Coerce text arguments to the types declared by `params`
pub fn coerce_args(params: &[Param], args: &[String]) -> Result<Vec<DynSolValue>, String> {
    if args.len() != params.len() {
        return Err(format!(
            "Argument count mismatch: expected {} arguments, got {}",
            params.len(),
            args.len()
        ));
    }

    let mut values = Vec::with_capacity(args.len());
    for (i, (param, arg)) in params.iter().zip(args.iter()).enumerate() {
        let ty = param
            .resolve()
            .map_err(|e| format!("Failed to resolve type of argument {}: {}", i + 1, e))?;
        let value = parse_value(&ty, arg).map_err(|e| {
            let name = if param.name.is_empty() {
                format!("{}", i + 1)
            } else {
                format!("{} ({})", i + 1, param.name)
            };
            format!("Failed to parse argument {} as {}: {}", name, ty, e)
        })?;
        values.push(value);
    }

    Ok(values)
}

/// Parse a single value according to its type
pub fn parse_value(ty: &DynSolType, arg: &str) -> Result<DynSolValue, String> {
    let arg = arg.trim();
    match ty {
        DynSolType::Address => {
            let addr = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")).unwrap_or(arg);

            if addr.len() != 40 || !addr.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("Invalid address: expected 40 hex characters".to_string());
            }

            let bytes = hex::decode(addr).map_err(|e| format!("Invalid hex: {}", e))?;
            Ok(DynSolValue::Address(Address::from_slice(&bytes)))
        }

        DynSolType::Bool => {
            let value = match arg.to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(format!("Invalid bool: expected true/false, got '{}'", arg)),
            };
            Ok(DynSolValue::Bool(value))
        }

        DynSolType::Int(size) => {
            let value = match hex_payload(arg) {
                Some(hex_str) => {
                    let bytes = parse_hex_to_bytes(hex_str, 32)?;
                    let mut array = [0u8; 32];
                    array.copy_from_slice(&bytes);
                    I256::from_be_bytes(array)
                }
                None => arg
                    .parse::<I256>()
                    .map_err(|e| format!("Invalid integer: {}", e))?,
            };
            // -2^(n-1) ..= 2^(n-1) - 1: the magnitude (or its complement) needs at most n-1 bits
            let magnitude = if value.is_negative() { !value } else { value };
            if *size < 256 && magnitude.into_raw().bit_len() >= *size {
                return Err(format!("Value {} does not fit in int{}", value, size));
            }
            Ok(DynSolValue::Int(value, *size))
        }

        DynSolType::Uint(size) => {
            let value = match hex_payload(arg) {
                Some(hex_str) => U256::from_str_radix(hex_str, 16)
                    .map_err(|e| format!("Invalid hex integer: {}", e))?,
                None => U256::from_str_radix(arg, 10)
                    .map_err(|e| format!("Invalid unsigned integer: {}", e))?,
            };
            if *size < 256 && value.bit_len() > *size {
                return Err(format!("Value {} does not fit in uint{}", value, size));
            }
            Ok(DynSolValue::Uint(value, *size))
        }

        DynSolType::Bytes => {
            let hex_str = hex_payload(arg).unwrap_or(arg);
            let bytes = hex::decode(hex_str).map_err(|e| format!("Invalid hex: {}", e))?;
            Ok(DynSolValue::Bytes(bytes))
        }

        DynSolType::FixedBytes(size) => {
            let hex_str = hex_payload(arg).unwrap_or(arg);
            let bytes = hex::decode(hex_str).map_err(|e| format!("Invalid hex: {}", e))?;

            if bytes.len() != *size {
                return Err(format!(
                    "Invalid bytes length: expected {} bytes, got {}",
                    size,
                    bytes.len()
                ));
            }

            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(FixedBytes::from(word), *size))
        }

        DynSolType::String => Ok(DynSolValue::String(unquote(arg))),

        DynSolType::Array(inner_ty) => {
            let elements = split_enclosed(arg, '[', ']')
                .ok_or_else(|| "Array must be enclosed in brackets: [val1,val2,...]".to_string())?;

            let mut values = Vec::with_capacity(elements.len());
            for elem in elements {
                values.push(parse_value(inner_ty, elem)?);
            }

            Ok(DynSolValue::Array(values))
        }

        DynSolType::FixedArray(inner_ty, size) => {
            let elements = split_enclosed(arg, '[', ']')
                .ok_or_else(|| "Array must be enclosed in brackets: [val1,val2,...]".to_string())?;

            if elements.len() != *size {
                return Err(format!(
                    "Fixed array size mismatch: expected {} elements, got {}",
                    size,
                    elements.len()
                ));
            }

            let mut values = Vec::with_capacity(elements.len());
            for elem in elements {
                values.push(parse_value(inner_ty, elem)?);
            }

            Ok(DynSolValue::FixedArray(values))
        }

        DynSolType::Tuple(types) => {
            // Manifest lists arrive bracketed, command-line tuples parenthesized
            let elements = split_enclosed(arg, '(', ')')
                .or_else(|| split_enclosed(arg, '[', ']'))
                .ok_or_else(|| {
                    "Tuple must be enclosed in parentheses: (val1,val2,...)".to_string()
                })?;

            if elements.len() != types.len() {
                return Err(format!(
                    "Tuple size mismatch: expected {} elements, got {}",
                    types.len(),
                    elements.len()
                ));
            }

            let mut values = Vec::with_capacity(elements.len());
            for (ty, elem) in types.iter().zip(elements) {
                values.push(parse_value(ty, elem)?);
            }

            Ok(DynSolValue::Tuple(values))
        }

        _ => Err(format!("Unsupported type: {}", ty)),
    }
}

fn hex_payload(arg: &str) -> Option<&str> {
    arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X"))
}

/// Strip matching quotes; inside double quotes `\x` stands for `x`
fn unquote(arg: &str) -> String {
    if arg.len() < 2 {
        return arg.to_string();
    }
    if arg.starts_with('"') && arg.ends_with('"') {
        let inner = &arg[1..arg.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.extend(chars.next()),
                c => out.push(c),
            }
        }
        out
    } else if arg.starts_with('\'') && arg.ends_with('\'') {
        arg[1..arg.len() - 1].to_string()
    } else {
        arg.to_string()
    }
}

/// Strip `open`/`close` and split the inside on top-level commas
fn split_enclosed(arg: &str, open: char, close: char) -> Option<Vec<&str>> {
    let inner = arg.trim().strip_prefix(open)?.strip_suffix(close)?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    Some(split_top_level(inner))
}

/// Split on commas that are not nested in brackets, parentheses or quotes
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some('"'), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

/// Parse hex string to bytes with left zero padding
fn parse_hex_to_bytes(hex_str: &str, expected_size: usize) -> Result<Vec<u8>, String> {
    let padded_hex = if hex_str.len() % 2 == 1 {
        format!("0{}", hex_str)
    } else {
        hex_str.to_string()
    };
    let bytes = hex::decode(&padded_hex).map_err(|e| format!("Invalid hex: {}", e))?;

    if bytes.len() > expected_size {
        return Err(format!(
            "Hex value too large: expected max {} bytes, got {}",
            expected_size,
            bytes.len()
        ));
    }

    let mut padded = vec![0u8; expected_size];
    padded[expected_size - bytes.len()..].copy_from_slice(&bytes);

    Ok(padded)
}
