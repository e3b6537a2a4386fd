//! The payload accessor capability boundary (§6).
//!
//! The engine treats payload bytes as opaque; it only ever reaches into
//! them through a [`PayloadAccessor`] the host supplies. This module also
//! ships `JsonAccessor`, a reference implementation behind the `json`
//! feature: a schema-driven accessor that stores each record as a
//! serialized `serde_json::Value` object. It exists to make the engine
//! testable and demoable without depending on an external payload codec,
//! not as a claim that it is the only or fastest valid accessor.

use crate::error::Result;
use crate::value::Value;

/// External capability for extracting fields from, and building, record
/// payloads. The engine never interprets payload bytes itself.
pub trait PayloadAccessor {
    /// Navigate `path` (a dotted field path, already split) into the
    /// logical object `payload` encodes. A missing or null path segment
    /// yields `Value::Null` rather than an error.
    fn get_field(&self, payload: &[u8], path: &[&str]) -> Result<Value>;

    /// Build a payload for `table_name` from `fields`.
    fn build_buffer(&self, table_name: &str, fields: &[(String, Value)]) -> Result<Vec<u8>>;

    /// Render a payload as a generic JSON object, for hosts that want a
    /// debug or export view. Default: unsupported.
    fn to_json(&self, _payload: &[u8], _table_name: &str) -> Result<serde_json::Value> {
        Err(crate::error::Error::new(crate::error::ErrorCode::InvalidType))
    }

    /// Build a payload from a generic JSON object. Default: unsupported.
    fn from_json(&self, _object: &serde_json::Value, _table_name: &str) -> Result<Vec<u8>> {
        Err(crate::error::Error::new(crate::error::ErrorCode::InvalidType))
    }
}

#[cfg(feature = "json")]
pub use json_accessor::JsonAccessor;

#[cfg(feature = "json")]
mod json_accessor {
    use super::*;
    use serde_json::{Map, Value as Json};

    /// A schema-driven [`PayloadAccessor`] that serializes each record as
    /// a JSON object via `serde_json`. Round-trips through [`Value`]'s
    /// own tags: `Value::Bytes` is carried as a base64-free array of
    /// bytes (a JSON array of integers) since JSON has no native binary
    /// type and this is a reference/test fixture, not a wire format
    /// meant to be space-efficient.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct JsonAccessor;

    impl JsonAccessor {
        pub fn new() -> Self {
            JsonAccessor
        }
    }

    fn value_to_json(v: &Value) -> Json {
        match v {
            Value::Null => Json::Null,
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
        }
    }

    fn json_to_value(j: &Json) -> Value {
        match j {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Int(if *b { 1 } else { 0 }),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::String(s.clone()),
            Json::Array(arr) => {
                if arr.iter().all(|e| e.as_u64().map(|n| n <= 255).unwrap_or(false)) {
                    Value::Bytes(arr.iter().filter_map(|e| e.as_u64().map(|n| n as u8)).collect())
                } else {
                    Value::Bytes(serde_json::to_vec(arr).unwrap_or_default())
                }
            }
            Json::Object(_) => Value::Bytes(serde_json::to_vec(j).unwrap_or_default()),
        }
    }

    fn navigate(doc: &Json, path: &[&str]) -> Json {
        let mut cur = doc;
        for segment in path {
            match cur.get(segment) {
                Some(next) => cur = next,
                None => return Json::Null,
            }
        }
        cur.clone()
    }

    impl PayloadAccessor for JsonAccessor {
        fn get_field(&self, payload: &[u8], path: &[&str]) -> Result<Value> {
            let doc: Json = serde_json::from_slice(payload)?;
            Ok(json_to_value(&navigate(&doc, path)))
        }

        fn build_buffer(&self, _table_name: &str, fields: &[(String, Value)]) -> Result<Vec<u8>> {
            let mut map = Map::new();
            for (name, value) in fields {
                map.insert(name.clone(), value_to_json(value));
            }
            Ok(serde_json::to_vec(&Json::Object(map))?)
        }

        fn to_json(&self, payload: &[u8], _table_name: &str) -> Result<Json> {
            Ok(serde_json::from_slice(payload)?)
        }

        fn from_json(&self, object: &Json, _table_name: &str) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(object)?)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn build_then_get_field_round_trips() {
            let accessor = JsonAccessor::new();
            let payload = accessor
                .build_buffer(
                    "t",
                    &[
                        ("name".to_string(), Value::String("widget".into())),
                        ("qty".to_string(), Value::Int(7)),
                    ],
                )
                .unwrap();
            assert_eq!(
                accessor.get_field(&payload, &["name"]).unwrap(),
                Value::String("widget".into())
            );
            assert_eq!(accessor.get_field(&payload, &["qty"]).unwrap(), Value::Int(7));
        }

        #[test]
        fn missing_path_is_null() {
            let accessor = JsonAccessor::new();
            let payload = accessor.build_buffer("t", &[]).unwrap();
            assert_eq!(accessor.get_field(&payload, &["absent"]).unwrap(), Value::Null);
        }

        #[test]
        fn nested_path_navigates_objects() {
            let accessor = JsonAccessor::new();
            let payload = br#"{"addr": {"city": "Rome"}}"#.to_vec();
            assert_eq!(
                accessor.get_field(&payload, &["addr", "city"]).unwrap(),
                Value::String("Rome".into())
            );
        }
    }
}

impl From<serde_json::Error> for crate::error::Error {
    fn from(err: serde_json::Error) -> Self {
        crate::error::Error::with_message(crate::error::ErrorCode::SyntaxError, err.to_string())
    }
}
