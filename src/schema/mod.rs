//! Schema ingestion: parses a table/field definition from an IDL document
//! or a JSON Schema document into a [`DatabaseSchema`] (§4.3).
//!
//! Both front ends are deterministic and order-independent; they converge
//! on the same data model so the rest of the engine (B-tree construction,
//! the query coordinator's column resolution) never has to know which
//! source syntax produced a given [`TableDef`].

mod idl;
mod json_schema;

use crate::error::{Error, ErrorCode, Result};
use crate::value::{Value, ValueTag};

/// A column's declared type, per §3. Distinct from [`ValueTag`]: the
/// schema remembers whether a field was declared `bool` or `long` even
/// though both collapse to an [`ValueTag::Int`] key at the B-tree layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    String,
    Bytes,
    Bool,
    Long,
    Null,
}

impl ColumnType {
    /// The B-tree/`Value` tag this column type is indexed and compared as.
    pub fn value_tag(self) -> ValueTag {
        match self {
            ColumnType::Int | ColumnType::Bool | ColumnType::Long => ValueTag::Int,
            ColumnType::Float => ValueTag::Float,
            ColumnType::String => ValueTag::String,
            ColumnType::Bytes => ValueTag::Bytes,
            ColumnType::Null => ValueTag::Null,
        }
    }
}

/// One column of a [`TableDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub is_key: bool,
    pub is_indexed: bool,
    pub is_required: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        ColumnDef {
            name: name.into(),
            ty,
            is_key: false,
            is_indexed: false,
            is_required: false,
            default: None,
        }
    }
}

/// A table's shape: its columns and which ones are keyed/indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub fb_namespace: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub key_column: Option<String>,
    pub indexed_columns: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        TableDef {
            name: name.into(),
            fb_namespace: None,
            columns: Vec::new(),
            key_column: None,
            indexed_columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Add a column, updating `key_column`/`indexed_columns` as needed.
    /// Public so both schema front ends and test fixtures elsewhere in
    /// the crate can build a [`TableDef`] without duplicating that
    /// bookkeeping.
    pub fn push_column(&mut self, col: ColumnDef) {
        if col.is_key && self.key_column.is_none() {
            self.key_column = Some(col.name.clone());
        }
        if col.is_indexed {
            self.indexed_columns.push(col.name.clone());
        }
        self.columns.push(col);
    }
}

/// Which front end produced a [`DatabaseSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Idl,
    JsonSchema,
}

/// The parsed schema: every table the source document defines.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSchema {
    pub name: String,
    pub tables: Vec<TableDef>,
    pub source: String,
    pub format: SchemaFormat,
}

impl DatabaseSchema {
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Parse `source` into a [`DatabaseSchema`] named `name`. Sniffs the first
/// non-whitespace character: `{` routes to the JSON Schema front end,
/// anything else to the IDL front end (§4.3).
pub fn parse(source: &str, name: &str) -> Result<DatabaseSchema> {
    let first_non_ws = source.trim_start().chars().next();
    let tables = match first_non_ws {
        Some('{') => json_schema::parse(source)?,
        Some(_) => idl::parse(source)?,
        None => return Err(Error::new(ErrorCode::EmptySchema)),
    };
    if tables.is_empty() {
        return Err(Error::new(ErrorCode::EmptySchema));
    }
    let format = match first_non_ws {
        Some('{') => SchemaFormat::JsonSchema,
        _ => SchemaFormat::Idl,
    };
    Ok(DatabaseSchema {
        name: name.to_string(),
        tables,
        source: source.to_string(),
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_json_schema_by_leading_brace() {
        let src = r#"{ "title": "Root", "properties": { "id": { "type": "integer" } } }"#;
        let schema = parse(src, "db").unwrap();
        assert_eq!(schema.format, SchemaFormat::JsonSchema);
    }

    #[test]
    fn sniffs_idl_otherwise() {
        let src = "table T { a: int; }";
        let schema = parse(src, "db").unwrap();
        assert_eq!(schema.format, SchemaFormat::Idl);
    }

    #[test]
    fn empty_source_is_empty_schema() {
        let err = parse("   ", "db").unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptySchema);
    }
}
