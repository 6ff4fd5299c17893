//! Ordered shape classifier for result payloads
//!
//! Payloads carry no schema, so the representation is picked from the
//! value's shape. Rules are tried in order and the first match wins.

use serde_json::{Map, Value};

use super::text_tables::{looks_like_text_tables, parse_text_tables, TextBlock};

#[derive(Clone, Debug, PartialEq)]
pub enum Shape<'a> {
    /// String with headed sections and pipe tables
    TextTables(Vec<TextBlock>),
    /// Array of objects
    Table {
        columns: Vec<String>,
        rows: &'a [Value],
    },
    /// Array of primitives
    List(&'a [Value]),
    /// Object with at least one array-valued property
    Cards(&'a Map<String, Value>),
    /// Plain object
    KeyValue(&'a Map<String, Value>),
    /// Anything else, shown as is
    Primitive(&'a Value),
}

pub fn classify(payload: &Value) -> Shape<'_> {
    match payload {
        Value::String(text) if looks_like_text_tables(text) => {
            Shape::TextTables(parse_text_tables(text))
        }
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            Shape::Table {
                columns: table_columns(items),
                rows: items,
            }
        }
        Value::Array(items) if items.iter().all(is_primitive) => Shape::List(items),
        Value::Object(map) if map.values().any(Value::is_array) => Shape::Cards(map),
        Value::Object(map) => Shape::KeyValue(map),
        other => Shape::Primitive(other),
    }
}

/// First item's keys in order, then keys first seen in later items
pub fn table_columns(items: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for item in items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

pub fn is_primitive(value: &Value) -> bool {
    !value.is_object() && !value.is_array()
}

/// Display text of a value inside a cell or list entry
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
