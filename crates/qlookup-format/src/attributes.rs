use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Value parser named in a `label:parser:path` spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeParser {
    DateIso,
    DateHttp,
    DateRfc2822,
    DateSql,
    DateSeconds,
    DateMillis,
}

impl FromStr for AttributeParser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date-iso" => Ok(AttributeParser::DateIso),
            "date-http" => Ok(AttributeParser::DateHttp),
            "date-rfc2822" => Ok(AttributeParser::DateRfc2822),
            "date-sql" => Ok(AttributeParser::DateSql),
            "date-seconds" => Ok(AttributeParser::DateSeconds),
            "date-millis" => Ok(AttributeParser::DateMillis),
            other => Err(format!("unknown attribute parser '{other}'")),
        }
    }
}

impl fmt::Display for AttributeParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeParser::DateIso => "date-iso",
            AttributeParser::DateHttp => "date-http",
            AttributeParser::DateRfc2822 => "date-rfc2822",
            AttributeParser::DateSql => "date-sql",
            AttributeParser::DateSeconds => "date-seconds",
            AttributeParser::DateMillis => "date-millis",
        };
        f.write_str(s)
    }
}

/// One compiled attribute: where to read a value and how to show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub label: String,
    pub path: String,
    pub parser: Option<AttributeParser>,
}

impl AttributeSpec {
    /// True when the spec named a label rather than reusing the path.
    pub fn has_label(&self) -> bool { self.label != self.path }

    /// Tag or title text for an already formatted value.
    pub fn render(&self, value: &str) -> String {
        if self.has_label() { format!("{}: {}", self.label, value) } else { value.to_string() }
    }
}

/// Compiles a comma-separated attribute specification.
///
/// Each item is `path`, `label:path` or `label:parser:path`. Colons past the
/// second belong to the path. Unknown parsers compile to pass-through.
pub fn compile(source: &str) -> Vec<AttributeSpec> {
    source
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let parts: Vec<&str> = item.splitn(3, ':').map(str::trim).collect();
            let spec = match parts.as_slice() {
                [path] => AttributeSpec { label: (*path).to_string(), path: (*path).to_string(), parser: None },
                [label, path] => AttributeSpec { label: (*label).to_string(), path: (*path).to_string(), parser: None },
                [label, parser, path] => {
                    let parser = parser.to_lowercase();
                    let parsed = parser.parse::<AttributeParser>().map_err(|e| warn!(item, "{e}; value shown unparsed")).ok();
                    AttributeSpec { label: (*label).to_string(), path: (*path).to_string(), parser: parsed }
                }
                _ => return None,
            };
            (!spec.path.is_empty()).then_some(spec)
        })
        .collect()
}

/// A compiled spec list keyed by the exact source string it came from.
#[derive(Debug, Default)]
pub struct SpecCache {
    source: Option<String>,
    specs: Vec<AttributeSpec>,
    compilations: usize,
}

impl SpecCache {
    /// Recompiles only when `source` differs from the cached string.
    pub fn refresh(&mut self, source: Option<&str>) -> &[AttributeSpec] {
        if self.source.as_deref() != source {
            self.specs = source.map(compile).unwrap_or_default();
            self.source = source.map(str::to_string);
            self.compilations += 1;
            debug!(source = ?self.source, attributes = self.specs.len(), "compiled attribute spec");
        }
        &self.specs
    }

    pub fn specs(&self) -> &[AttributeSpec] { &self.specs }

    pub fn is_configured(&self) -> bool { !self.specs.is_empty() }

    /// How many times a source string has been compiled.
    pub fn compilations(&self) -> usize { self.compilations }
}
