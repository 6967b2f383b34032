use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type a placeholder is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
}

impl ParamType {
    /// Resolves a type tag, including the SQL aliases of each type.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "string" | "varchar" | "char" => Some(ParamType::String),
            "integer" | "int" | "bigint" | "smallint" | "tinyint" => Some(ParamType::Integer),
            "decimal" | "double" | "float" | "real" => Some(ParamType::Decimal),
            "boolean" | "bool" => Some(ParamType::Boolean),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Decimal => "decimal",
            ParamType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHint {
    /// Zero-based placeholder index in source order.
    pub position: usize,
    pub param_type: ParamType,
}

/// A query template reduced to bare `?` placeholders plus their type hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub canonical: String,
    pub hints: Vec<TypeHint>,
}

impl ParsedTemplate {
    pub fn placeholder_count(&self) -> usize { self.hints.len() }
    pub fn is_parameterized(&self) -> bool { !self.hints.is_empty() }
}

/// Scans `raw` for `?` and `?:<type>` placeholders.
///
/// Question marks inside single-quoted literals and double-quoted identifiers
/// are text, not placeholders.
/// A tag that names no known type is left in the output untouched and the
/// placeholder defaults to `string`.
pub fn parse_template(raw: &str) -> ParsedTemplate {
    let mut canonical = String::with_capacity(raw.len());
    let mut hints = Vec::new();
    let mut quote: Option<char> = None;
    let mut rest = raw;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '\'' | '"' => {
                match quote {
                    None => quote = Some(c),
                    Some(open) if open == c => quote = None,
                    Some(_) => {}
                }
                canonical.push(c);
            }
            '?' if quote.is_none() => {
                let mut param_type = ParamType::String;
                if let Some(after_colon) = rest.strip_prefix(':') {
                    let tag_len = after_colon.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_')).unwrap_or(after_colon.len());
                    if let Some(t) = ParamType::from_tag(&after_colon[..tag_len]) {
                        param_type = t;
                        rest = &after_colon[tag_len..];
                    }
                }
                hints.push(TypeHint { position: hints.len(), param_type });
                canonical.push('?');
            }
            _ => canonical.push(c),
        }
    }
    ParsedTemplate { canonical, hints }
}
