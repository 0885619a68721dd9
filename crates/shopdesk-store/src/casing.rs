//! # Field Casing
//!
//! Rows are snake_case at the store; models are camelCase. Only top-level
//! keys are mapped. Nested objects (movement logs, audit metadata) keep the
//! casing they were written with.
//!
//! ```text
//!  model (serde camelCase)          remote row
//!  { "cashInRegister": 9500 }  ──►  { "cash_in_register": 9500 }
//!  { "openTime": "..." }       ◄──  { "open_time": "..." }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::query::Row;

pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// camelCase model keys → snake_case row keys.
pub fn to_remote(row: Row) -> Row {
    row.into_iter().map(|(k, v)| (to_snake_case(&k), v)).collect()
}

/// snake_case row keys → camelCase model keys.
pub fn from_remote(row: Row) -> Row {
    row.into_iter().map(|(k, v)| (to_camel_case(&k), v)).collect()
}

/// Serializes a model into a remote row.
pub fn encode<T: Serialize>(model: &T) -> StoreResult<Row> {
    match serde_json::to_value(model)? {
        Value::Object(map) => Ok(to_remote(map)),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
    }
}

/// Deserializes a remote row into a model.
pub fn decode<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(from_remote(row)))?)
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(decode).collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
