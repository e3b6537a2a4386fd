//! Both schema front ends (§4.3) converge on a database that behaves the
//! same way from the outside, regardless of whether the table was
//! declared in the IDL or in JSON Schema.

use stackql::accessor::JsonAccessor;
use stackql::value::Value;
use stackql::Database;

const IDL: &str = r#"
table Widget {
    name: string (key);
    weight: int (indexed);
}
"#;

const JSON_SCHEMA: &str = r#"
{
  "title": "Widget",
  "properties": {
    "name": { "type": "string", "x-key": true },
    "weight": { "type": "integer" }
  },
  "required": ["name", "weight"]
}
"#;

#[test]
fn idl_schema_produces_a_queryable_table() {
    let mut db = Database::from_schema(IDL, Box::new(JsonAccessor::new()), "widgets").unwrap();
    db.insert(
        "Widget",
        &[
            ("name".to_string(), Value::String("bolt".into())),
            ("weight".to_string(), Value::Int(5)),
        ],
    )
    .unwrap();

    let result = db.query("SELECT name FROM Widget WHERE weight = 5").unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0], Value::String("bolt".into()));
}

#[test]
fn json_schema_front_end_parses_properties_and_required() {
    let db = Database::from_schema(JSON_SCHEMA, Box::new(JsonAccessor::new()), "widgets").unwrap();
    let table = db.get_table_def("Widget").expect("title names the table");
    let name_col = table.column("name").unwrap();
    assert!(name_col.is_required);
    assert!(name_col.is_key);
    let weight_col = table.column("weight").unwrap();
    assert!(weight_col.is_required);
}

#[test]
fn malformed_schema_source_is_a_syntax_error() {
    let err = Database::from_schema("table (((", Box::new(JsonAccessor::new()), "widgets").unwrap_err();
    assert_eq!(err.code(), stackql::ErrorCode::SyntaxError);
}
