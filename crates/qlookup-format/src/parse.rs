//! Value parsers. Each date parser renders a short date-time string in UTC;
//! anything that does not parse is returned exactly as given.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::attributes::AttributeParser;

const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M %p";
// Roughly +/- 270,000 years; beyond this chrono has no representation.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Formats `value` with `parser`, falling back to `value` unchanged.
pub fn parse_attribute(value: &str, parser: Option<AttributeParser>) -> String {
    let Some(parser) = parser else { return value.to_string() };
    let trimmed = value.trim();
    let parsed = match parser {
        AttributeParser::DateIso => parse_iso(trimmed),
        AttributeParser::DateHttp => NaiveDateTime::parse_from_str(trimmed, "%a, %d %b %Y %H:%M:%S GMT").ok().map(|n| n.and_utc()),
        AttributeParser::DateRfc2822 => DateTime::parse_from_rfc2822(trimmed).ok().map(|d| d.with_timezone(&Utc)),
        AttributeParser::DateSql => parse_sql(trimmed),
        AttributeParser::DateSeconds => parse_epoch(trimmed, 1000.0),
        AttributeParser::DateMillis => parse_epoch(trimmed, 1.0),
    };
    parsed.map_or_else(|| value.to_string(), |dt| dt.format(DISPLAY_FORMAT).to_string())
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(dt.with_timezone(&Utc)); }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") { return Some(n.and_utc()); }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") { return Some(n.and_utc()); }
    start_of_day(s)
}

fn parse_sql(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") { return Some(n.and_utc()); }
    if let Ok(n) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") { return Some(n.and_utc()); }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %z") { return Some(dt.with_timezone(&Utc)); }
    start_of_day(s)
}

fn start_of_day(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

#[allow(clippy::cast_possible_truncation)]
fn parse_epoch(s: &str, millis_per_unit: f64) -> Option<DateTime<Utc>> {
    let n: f64 = s.parse().ok()?;
    let millis = (n * millis_per_unit).round();
    if !millis.is_finite() || millis.abs() > MAX_EPOCH_MILLIS { return None; }
    Utc.timestamp_millis_opt(millis as i64).single()
}
