use serde::Serialize;
use serde_json::Value;

use qlookup_core::config::LookupOptions;
use qlookup_core::types::RowObject;

use crate::attributes::{AttributeSpec, SpecCache};
use crate::document::{display_text, DetailDocument};
use crate::parse::parse_attribute;
use crate::path::resolve;

/// Detail view of a result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Details {
    /// No detail spec configured: rows go out untouched for generic rendering.
    Raw(Vec<RowObject>),
    Documents(Vec<DetailDocument>),
}

impl Details {
    pub fn show_as_json(&self) -> bool { matches!(self, Details::Raw(_)) }

    pub fn len(&self) -> usize {
        match self {
            Details::Raw(rows) => rows.len(),
            Details::Documents(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Holds the title, detail and summary spec caches.
#[derive(Debug)]
pub struct Projector {
    title: SpecCache,
    detail: SpecCache,
    summary: SpecCache,
    max_summary_documents: usize,
}

impl Default for Projector {
    fn default() -> Self {
        Self { title: SpecCache::default(), detail: SpecCache::default(), summary: SpecCache::default(), max_summary_documents: 3 }
    }
}

impl Projector {
    /// Brings every cache in line with `options`, recompiling only changed specs.
    pub fn refresh(&mut self, options: &LookupOptions) {
        self.title.refresh(options.title_attributes.as_deref());
        self.detail.refresh(options.detail_attributes.as_deref());
        self.summary.refresh(options.summary_attributes.as_deref());
        self.max_summary_documents = options.max_summary_documents;
    }

    pub fn title_cache(&self) -> &SpecCache { &self.title }
    pub fn detail_cache(&self) -> &SpecCache { &self.detail }
    pub fn summary_cache(&self) -> &SpecCache { &self.summary }

    /// Short, de-duplicated tags for a result set.
    ///
    /// Result sets larger than the summary document cutoff collapse to a
    /// count tag. Otherwise each summary attribute contributes one tag per row
    /// with a value, and a count tag stands in when nothing was found.
    pub fn summary_tags(&self, rows: &[RowObject]) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        if rows.len() <= self.max_summary_documents {
            for spec in self.summary.specs() {
                for row in rows {
                    if let Some(value) = extract(row, spec) {
                        let tag = spec.render(&display_text(&value));
                        if !tags.contains(&tag) { tags.push(tag); }
                    }
                }
            }
        }
        if tags.is_empty() || rows.len() > self.max_summary_documents {
            tags.push(count_tag(rows.len()));
        }
        tags
    }

    pub fn details(&self, rows: &[RowObject]) -> Details {
        if !self.detail.is_configured() { return Details::Raw(rows.to_vec()); }
        Details::Documents(rows.iter().filter_map(|row| self.document(row)).collect())
    }

    /// Projects one row; rows without any non-empty attribute yield nothing.
    pub fn document(&self, row: &RowObject) -> Option<DetailDocument> {
        let mut doc = DetailDocument::new(self.title(row));
        for spec in self.detail.specs() {
            if let Some(value) = extract(row, spec) { doc.push(spec.label.clone(), value); }
        }
        (!doc.is_empty()).then_some(doc)
    }

    pub fn title(&self, row: &RowObject) -> Option<String> {
        let parts: Vec<String> =
            self.title.specs().iter().filter_map(|spec| extract(row, spec).map(|v| spec.render(&display_text(&v)))).collect();
        (!parts.is_empty()).then(|| parts.join(" - "))
    }
}

fn count_tag(n: usize) -> String {
    if n == 1 { "1 result".to_string() } else { format!("{n} results") }
}

/// Resolves and formats one attribute. Null and empty values count as absent.
fn extract(row: &RowObject, spec: &AttributeSpec) -> Option<Value> {
    match resolve(row, &spec.path)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(Value::String(parse_attribute(&s, spec.parser))),
        Value::Number(n) => Some(Value::String(parse_attribute(&n.to_string(), spec.parser))),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        other => Some(other),
    }
}
