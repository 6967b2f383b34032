use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailAttribute {
    pub key: String,
    pub value: Value,
}

/// Labeled projection of one result row.
///
/// `searchable_text` is kept in step with `attributes`: it is the lowercase
/// text of every value, objects and arrays serialized first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailDocument {
    title: Option<String>,
    attributes: Vec<DetailAttribute>,
    searchable_text: String,
}

impl DetailDocument {
    pub fn new(title: Option<String>) -> Self { Self { title, ..Self::default() } }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        if !self.searchable_text.is_empty() { self.searchable_text.push(' '); }
        self.searchable_text.push_str(&display_text(&value).to_lowercase());
        self.attributes.push(DetailAttribute { key: key.into(), value });
    }

    pub fn title(&self) -> Option<&str> { self.title.as_deref() }
    pub fn attributes(&self) -> &[DetailAttribute] { &self.attributes }
    pub fn searchable_text(&self) -> &str { &self.searchable_text }
    pub fn is_empty(&self) -> bool { self.attributes.is_empty() }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.iter().find(|a| a.key == key).map(|a| &a.value)
    }
}

/// Text form of a value: strings as-is, everything else as JSON.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
