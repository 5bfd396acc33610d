//! Wire-format decoding for the availability endpoint.
//!
//! The endpoint has served both JSON and an HTML fragment over time. Both
//! decode into [`PayloadRow`]s; nothing outside this module knows the shape.

use serde_json::{Map, Value};

use super::html::extract_table_rows;

/// Top-level object keys that may hold the record array.
const LIST_KEYS: [&str; 6] = ["data", "results", "items", "carParks", "CarParks", "Result"];

const NAME_KEYS: [&str; 3] = ["carParkName", "name", "carpark"];
const AVAILABLE_KEYS: [&str; 3] = ["availableSpaces", "available", "available_spaces"];
const CATEGORY_KEYS: [&str; 3] = ["category", "parkingOption", "parking_option"];

/// One carpark row as the source reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRow {
    pub name: String,
    pub category: Option<String>,
    /// `None` when the source value was missing or not numeric.
    pub available: Option<u32>,
}

/// Which decoder produced the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Html,
}

impl PayloadFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

/// Decode a response body. Fails only when the body is neither JSON nor a
/// document containing the availability table.
pub fn decode(body: &str) -> Result<(PayloadFormat, Vec<PayloadRow>), String> {
    let json = parse_json(body);

    if let Some(value) = &json {
        let rows = rows_from_json(value);
        if !rows.is_empty() {
            return Ok((PayloadFormat::Json, rows));
        }
    }

    let table = extract_table_rows(body).map_err(|e| format!("HTML parse error: {e}"))?;
    match table {
        Some(rows) => Ok((PayloadFormat::Html, rows_from_table(rows))),
        None if json.is_some() => Ok((PayloadFormat::Json, Vec::new())),
        None => Err("body is neither JSON nor an availability table".to_string()),
    }
}

/// Parse the body as JSON, falling back to the outermost embedded object or
/// array.
fn parse_json(body: &str) -> Option<Value> {
    let text = body.trim();
    if text.starts_with('{') || text.starts_with('[') {
        return serde_json::from_str(text).ok();
    }

    [('{', '}'), ('[', ']')].iter().find_map(|&(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    })
}

fn rows_from_json(value: &Value) -> Vec<PayloadRow> {
    let records = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    records.iter().filter_map(row_from_json).collect()
}

fn row_from_json(record: &Value) -> Option<PayloadRow> {
    let obj = record.as_object()?;
    let name = first_of(obj, &NAME_KEYS)?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let available = first_of(obj, &AVAILABLE_KEYS).and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => coerce_count(s),
        _ => None,
    });
    let category = first_of(obj, &CATEGORY_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(PayloadRow {
        name,
        category,
        available,
    })
}

/// First non-null value among `keys`.
fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()))
}

fn rows_from_table(rows: Vec<Vec<String>>) -> Vec<PayloadRow> {
    rows.into_iter()
        .filter(|cells| cells.len() >= 3 && !cells[0].is_empty())
        .map(|cells| PayloadRow {
            name: cells[0].clone(),
            category: Some(cells[1].clone()).filter(|c| !c.is_empty()),
            available: coerce_count(&cells[2]),
        })
        .collect()
}

/// Keep only the digits of a count ("1,024 spaces" → 1024).
pub fn coerce_count(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
