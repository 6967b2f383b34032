use serde_json::Value;
use std::collections::HashSet;

use qlookup_core::types::{ResultSet, RowObject};

/// Zips every data row against the header row. Values stay textual.
///
/// Repeated column names get a numeric suffix (`a`, `a_1`, `a_2`) so no value
/// is overwritten.
pub fn materialize(result: ResultSet) -> Vec<RowObject> {
    let mut rows = result.rows.into_iter();
    let Some(header) = rows.next() else { return Vec::new() };
    let mut seen = HashSet::new();
    let columns: Vec<String> = header
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = name.filter(|n| !n.is_empty()).unwrap_or_else(|| format!("_col{i}"));
            let mut column = base.clone();
            let mut n = 0;
            while !seen.insert(column.clone()) {
                n += 1;
                column = format!("{base}_{n}");
            }
            column
        })
        .collect();

    rows.map(|row| {
        let mut values = row.into_iter();
        columns
            .iter()
            .map(|col| (col.clone(), values.next().flatten().map_or(Value::Null, Value::String)))
            .collect::<RowObject>()
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Option<&str>]) -> Vec<Option<String>> { values.iter().map(|v| v.map(str::to_string)).collect() }

    #[test]
    fn header_only_and_empty_sets_materialize_to_nothing() {
        assert!(materialize(ResultSet::default()).is_empty());
        assert!(materialize(ResultSet { rows: vec![cells(&[Some("ip")])] }).is_empty());
    }

    #[test]
    fn rows_zip_against_header_in_order() {
        let rows = materialize(ResultSet {
            rows: vec![cells(&[Some("ip"), Some("severity")]), cells(&[Some("8.8.8.8"), Some("high")]), cells(&[Some("1.1.1.1"), None])],
        });
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().cloned().collect::<Vec<_>>(), vec!["ip", "severity"]);
        assert_eq!(rows[0]["severity"], Value::String("high".into()));
        assert_eq!(rows[1]["severity"], Value::Null);
    }

    #[test]
    fn numbers_are_not_type_converted() {
        let rows = materialize(ResultSet { rows: vec![cells(&[Some("count")]), cells(&[Some("42")])] });
        assert_eq!(rows[0]["count"], Value::String("42".into()));
    }

    #[test]
    fn duplicate_column_names_are_suffixed() {
        let rows = materialize(ResultSet {
            rows: vec![cells(&[Some("a"), Some("a"), Some("a_1"), Some("a")]), cells(&[Some("1"), Some("2"), Some("3"), Some("4")])],
        });
        assert_eq!(rows[0].keys().cloned().collect::<Vec<_>>(), vec!["a", "a_1", "a_1_1", "a_2"]);
        assert_eq!(rows[0]["a"], Value::String("1".into()));
        assert_eq!(rows[0]["a_1"], Value::String("2".into()));
        assert_eq!(rows[0]["a_2"], Value::String("4".into()));
    }

    #[test]
    fn short_rows_and_unnamed_columns_are_padded() {
        let rows = materialize(ResultSet { rows: vec![cells(&[None, Some("b")]), cells(&[Some("x")])] });
        assert_eq!(rows[0]["_col0"], Value::String("x".into()));
        assert_eq!(rows[0]["b"], Value::Null);
    }
}
