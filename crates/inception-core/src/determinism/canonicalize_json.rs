//! CAC-JSON canonical encoding for content hashing.
//!
//! Every hash produced or checked by this crate is taken over the canonical
//! JSON encoding of a serde value. The profile follows RFC 8785 (JCS) with
//! the CAC restrictions:
//!
//! - **Sorted keys**: object keys are emitted in byte order
//! - **No whitespace** between tokens
//! - **Integer-only numbers** spanning `i64::MIN..=u64::MAX`
//! - **Verbatim strings**: no Unicode normalization, so canonically
//!   equivalent spellings hash differently
//! - **Bounded depth**: nesting deeper than [`MAX_DEPTH`] is rejected
//!
//! Signer and auditor both go through [`to_canonical_bytes`], so field
//! declaration order in Rust structs never leaks into a hash. Any value
//! serde can produce from the bundle types canonicalizes; only floats and
//! excess depth are refused.
//!
//! # Example
//!
//! ```
//! use inception_core::determinism::canonicalize_value;
//! use serde_json::json;
//!
//! let canonical = canonicalize_value(&json!({"z": 1, "a": {"y": true, "b": null}})).unwrap();
//! assert_eq!(canonical, r#"{"a":{"b":null,"y":true},"z":1}"#);
//! ```

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Canonicalizer ID recorded in attestation algorithm labels.
pub const CANONICALIZER_ID: &str = "cac-json-v1";

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 128;

/// Errors that can occur during CAC-JSON canonicalization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacJsonError {
    /// A floating-point number was encountered.
    #[error("float not allowed: CAC-JSON requires integer-only numbers")]
    FloatNotAllowed,

    /// The maximum nesting depth was exceeded.
    #[error("max depth exceeded: JSON nested deeper than {max_depth} levels")]
    MaxDepthExceeded {
        /// The depth limit.
        max_depth: usize,
    },

    /// The value could not be converted to JSON.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Description of the serde failure.
        message: String,
    },
}

/// Serializes `value` with serde and returns its canonical UTF-8 bytes.
///
/// # Errors
///
/// Returns [`CacJsonError::Serialization`] if serde cannot represent the
/// value as JSON, or any validation error from [`canonicalize_value`].
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacJsonError> {
    let json = serde_json::to_value(value).map_err(|e| CacJsonError::Serialization {
        message: e.to_string(),
    })?;
    canonicalize_value(&json).map(String::into_bytes)
}

/// Validates a JSON value against the CAC constraints and emits its
/// canonical form.
///
/// # Errors
///
/// Returns [`CacJsonError`] if the value contains floats or is nested
/// deeper than [`MAX_DEPTH`].
pub fn canonicalize_value(value: &Value) -> Result<String, CacJsonError> {
    validate_value(value, 0)?;
    let mut output = String::new();
    emit_value(value, &mut output);
    Ok(output)
}

fn validate_value(value: &Value, depth: usize) -> Result<(), CacJsonError> {
    if depth > MAX_DEPTH {
        return Err(CacJsonError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }

    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => validate_number(n),
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| validate_value(item, depth + 1)),
        Value::Object(obj) => obj
            .values()
            .try_for_each(|val| validate_value(val, depth + 1)),
    }
}

fn validate_number(n: &Number) -> Result<(), CacJsonError> {
    if n.is_i64() || n.is_u64() {
        Ok(())
    } else {
        Err(CacJsonError::FloatNotAllowed)
    }
}

fn emit_value(value: &Value, output: &mut String) {
    match value {
        Value::Null => output.push_str("null"),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let _ = write!(output, "{i}");
            } else if let Some(u) = n.as_u64() {
                let _ = write!(output, "{u}");
            }
        },
        Value::String(s) => emit_string(s, output),
        Value::Array(items) => {
            output.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    output.push(',');
                }
                emit_value(item, output);
            }
            output.push(']');
        },
        Value::Object(obj) => emit_object(obj, output),
    }
}

/// Minimal escaping per RFC 8785 §3.2.2.2: quote, reverse solidus and the
/// C0 control range.
fn emit_string(s: &str, output: &mut String) {
    output.push('"');
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\u{0008}' => output.push_str("\\b"),
            '\u{000C}' => output.push_str("\\f"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c <= '\u{001F}' => {
                let _ = write!(output, "\\u{:04x}", u32::from(c));
            },
            c => output.push(c),
        }
    }
    output.push('"');
}

fn emit_object(obj: &Map<String, Value>, output: &mut String) {
    let mut keys: Vec<&String> = obj.keys().collect();
    keys.sort();

    output.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        emit_string(key, output);
        output.push(':');
        emit_value(&obj[*key], output);
    }
    output.push('}');
}
