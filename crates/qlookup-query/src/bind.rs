use qlookup_core::error::{Error, Result};

use crate::hints::{ParamType, TypeHint};

/// Renders `value` as a SQL literal of `param_type`.
pub fn bind(value: &str, param_type: ParamType) -> Result<String> {
    let mismatch = || Error::TypeCoercion { type_name: param_type.name().to_string(), value: value.to_string() };
    match param_type {
        ParamType::String => Ok(format!("'{}'", escape_string(value))),
        ParamType::Integer => value.trim().parse::<i128>().map(|n| n.to_string()).map_err(|_| mismatch()),
        ParamType::Decimal => match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n.to_string()),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok("true".to_string()),
            "false" | "0" => Ok("false".to_string()),
            _ => Err(mismatch()),
        },
    }
}

/// Binds the same entity value once per placeholder.
pub fn bind_all(value: &str, hints: &[TypeHint]) -> Result<Vec<String>> {
    hints.iter().map(|h| bind(value, h.param_type)).collect()
}

// Line breaks are dropped, then backslashes and quotes are escaped, in that order.
fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\r' | '\n' | '\u{2028}' | '\u{2029}' => {}
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}
