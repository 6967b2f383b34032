use serde_json::Value;

use qlookup_core::types::RowObject;

/// Resolves a dotted path such as `event.src.ip` or `hits[0].name` in `row`.
///
/// A column literally named like the full path wins. String values holding
/// JSON object or array text are parsed and walked into.
pub fn resolve(row: &RowObject, path: &str) -> Option<Value> {
    if let Some(v) = row.get(path) { return Some(v.clone()); }
    let normalized = path.replace('[', ".").replace(']', "");
    let mut segments = normalized.split('.').filter(|s| !s.is_empty());
    let mut current = row.get(segments.next()?)?.clone();
    for segment in segments {
        current = step(&current, segment)?;
    }
    Some(current)
}

fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        Value::String(text) if text.trim_start().starts_with(['{', '[']) => {
            serde_json::from_str::<Value>(text).ok().and_then(|parsed| step(&parsed, segment))
        }
        _ => None,
    }
}
