//! The JSON Schema front end (§4.3): treats the document as a single
//! table named after `title` (default `"Root"`).

use serde_json::Value as Json;

use crate::error::{Error, ErrorCode, Result};
use crate::value::Value;

use super::{ColumnDef, ColumnType, TableDef};

pub fn parse(source: &str) -> Result<Vec<TableDef>> {
    let doc: Json = serde_json::from_str(source)
        .map_err(|e| Error::with_message(ErrorCode::SyntaxError, e.to_string()))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| Error::with_message(ErrorCode::SyntaxError, "root must be a JSON object"))?;

    let name = obj
        .get("title")
        .and_then(Json::as_str)
        .unwrap_or("Root")
        .to_string();
    let mut table = TableDef::new(name);

    let required: Vec<String> = obj
        .get("required")
        .and_then(Json::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    let properties = obj
        .get("properties")
        .and_then(Json::as_object)
        .cloned()
        .unwrap_or_default();

    for (field_name, field_schema) in properties {
        let ty = resolve_type(&field_schema)?;
        let mut col = ColumnDef::new(field_name.clone(), ty);
        col.is_required = required.contains(&field_name);
        col.is_key = field_name == "id"
            || field_schema
                .get("x-key")
                .and_then(Json::as_bool)
                .unwrap_or(false);
        if let Some(default) = field_schema.get("default") {
            col.default = json_to_value(default, ty);
        }
        table.push_column(col);
    }

    Ok(vec![table])
}

fn resolve_type(field_schema: &Json) -> Result<ColumnType> {
    let type_name = field_schema.get("type").and_then(Json::as_str);
    Ok(match type_name {
        Some("integer") => ColumnType::Int,
        Some("number") => ColumnType::Float,
        Some("boolean") => ColumnType::Bool,
        Some("string") => {
            if field_schema.get("format").and_then(Json::as_str) == Some("binary") {
                ColumnType::Bytes
            } else {
                ColumnType::String
            }
        }
        Some("object") | Some("array") => ColumnType::Bytes,
        Some(other) => {
            return Err(Error::with_message(
                ErrorCode::InvalidType,
                format!("unsupported JSON Schema type '{}'", other),
            ))
        }
        None => ColumnType::Bytes,
    })
}

fn json_to_value(json: &Json, ty: ColumnType) -> Option<Value> {
    match ty {
        ColumnType::Int | ColumnType::Long | ColumnType::Bool => json.as_i64().map(Value::Int),
        ColumnType::Float => json.as_f64().map(Value::Float),
        ColumnType::String => json.as_str().map(|s| Value::String(s.to_string())),
        ColumnType::Bytes | ColumnType::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_properties_and_required() {
        let src = r#"{
            "title": "Order",
            "properties": {
                "id": { "type": "integer" },
                "total": { "type": "number" },
                "notes": { "type": "string" }
            },
            "required": ["id", "total"]
        }"#;
        let tables = parse(src).unwrap();
        let order = &tables[0];
        assert_eq!(order.name, "Order");
        assert!(order.column("id").unwrap().is_required);
        assert!(order.column("id").unwrap().is_key);
        assert_eq!(order.column("total").unwrap().ty, ColumnType::Float);
        assert!(!order.column("notes").unwrap().is_required);
    }

    #[test]
    fn x_key_annotation_marks_key_column() {
        let src = r#"{
            "properties": { "sku": { "type": "string", "x-key": true } }
        }"#;
        let tables = parse(src).unwrap();
        assert!(tables[0].column("sku").unwrap().is_key);
    }

    #[test]
    fn binary_format_string_maps_to_bytes() {
        let src = r#"{
            "properties": { "payload": { "type": "string", "format": "binary" } }
        }"#;
        let tables = parse(src).unwrap();
        assert_eq!(tables[0].column("payload").unwrap().ty, ColumnType::Bytes);
    }

    #[test]
    fn default_table_name_is_root() {
        let tables = parse(r#"{ "properties": {} }"#).unwrap();
        assert_eq!(tables[0].name, "Root");
    }

    #[test]
    fn unsupported_type_is_invalid_type() {
        let src = r#"{ "properties": { "x": { "type": "null" } } }"#;
        let err = parse(src).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidType);
    }
}
