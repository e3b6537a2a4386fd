//! Black-box coverage of the host-visible [`stackql::Database`] surface:
//! schema ingestion, insert/query, export-and-reload, and the poisoning
//! path, all driven through the public crate API rather than its
//! internals.

use std::fs;

use stackql::accessor::JsonAccessor;
use stackql::value::Value;
use stackql::{Database, ErrorCode};
use tempfile::tempdir;

const IDL_SCHEMA: &str = r#"
table Event {
    id: int (key);
    kind: string (indexed);
    amount: float;
}
"#;

fn seed(db: &mut Database) {
    db.insert(
        "Event",
        &[
            ("id".to_string(), Value::Int(1)),
            ("kind".to_string(), Value::String("login".into())),
            ("amount".to_string(), Value::Float(0.0)),
        ],
    )
    .unwrap();
    db.insert(
        "Event",
        &[
            ("id".to_string(), Value::Int(2)),
            ("kind".to_string(), Value::String("purchase".into())),
            ("amount".to_string(), Value::Float(19.99)),
        ],
    )
    .unwrap();
    db.insert(
        "Event",
        &[
            ("id".to_string(), Value::Int(3)),
            ("kind".to_string(), Value::String("purchase".into())),
            ("amount".to_string(), Value::Float(4.50)),
        ],
    )
    .unwrap();
}

#[test]
fn insert_and_query_against_indexed_column() {
    let mut db = Database::from_schema(IDL_SCHEMA, Box::new(JsonAccessor::new()), "events").unwrap();
    seed(&mut db);

    let result = db.query("SELECT id FROM Event WHERE kind = 'purchase'").unwrap();
    assert_eq!(result.row_count, 2);
}

#[test]
fn export_to_disk_and_reload_preserves_data_and_indexes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.log");

    let schema = {
        let mut db = Database::from_schema(IDL_SCHEMA, Box::new(JsonAccessor::new()), "events").unwrap();
        seed(&mut db);
        fs::write(&path, db.export_data()).unwrap();
        db.schema().clone()
    };

    let bytes = fs::read(&path).unwrap();
    let restored = Database::from_data(&bytes, schema, Box::new(JsonAccessor::new())).unwrap();

    let result = restored.query("SELECT id FROM Event WHERE kind = 'purchase'").unwrap();
    assert_eq!(result.row_count, 2);

    let stats = restored.get_stats();
    let event_stats = stats.iter().find(|s| s.name == "Event").unwrap();
    assert_eq!(event_stats.record_count, 3);
    assert_eq!(event_stats.indexes, vec!["Event_kind".to_string()]);
}

#[test]
fn count_star_does_not_require_an_index() {
    let mut db = Database::from_schema(IDL_SCHEMA, Box::new(JsonAccessor::new()), "events").unwrap();
    seed(&mut db);

    let result = db.query("SELECT COUNT(*) FROM Event WHERE amount < 10").unwrap();
    assert_eq!(result.rows[0][0], Value::Int(2));
}

#[test]
fn querying_an_unknown_table_reports_unknown_table() {
    let db = Database::from_schema(IDL_SCHEMA, Box::new(JsonAccessor::new()), "events").unwrap();
    let err = db.query("SELECT * FROM Ghost").unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownTable);
}

#[test]
fn inserting_wrong_typed_literal_is_rejected_before_any_write() {
    let mut db = Database::from_schema(IDL_SCHEMA, Box::new(JsonAccessor::new()), "events").unwrap();
    seed(&mut db);

    let err = db
        .query("SELECT * FROM Event WHERE kind = 42")
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TypeMismatch);

    // the earlier rejected query must not have touched the store or indexes
    let result = db.query("SELECT COUNT(*) FROM Event").unwrap();
    assert_eq!(result.rows[0][0], Value::Int(3));
}
