//! The database façade (§4.5): ties the schema, the stacked record
//! store, the per-column B-trees, and the host's payload accessor
//! together behind the small set of host-visible operations (§6).

use std::collections::HashMap;

use crate::accessor::PayloadAccessor;
use crate::btree::{BTree, BTreeConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::query::{self, IndexMap, QueryResult};
use crate::schema::{self, DatabaseSchema, TableDef};
use crate::store::{StackedRecordStore, StoreOptions};
use crate::value::Value;

/// Per-table record count and index names, as returned by
/// [`Database::get_stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub name: String,
    pub record_count: u64,
    pub indexes: Vec<String>,
}

/// The façade's `insert`/`stream`/`query` entry points, plus the
/// constructors a host uses to stand one up (`from_schema`, `from_data`).
pub struct Database {
    schema: DatabaseSchema,
    store: StackedRecordStore,
    indexes: IndexMap,
    accessor: Box<dyn PayloadAccessor>,
    /// Set once an append's paired index insert fails; every subsequent
    /// operation fails with [`ErrorCode::Poisoned`] until the host
    /// rebuilds a fresh `Database` from `export_data` + replay (§7).
    poisoned: bool,
}

impl Database {
    /// Parse `schema_text` and start a fresh, empty database named
    /// `name`.
    pub fn from_schema(schema_text: &str, accessor: Box<dyn PayloadAccessor>, name: &str) -> Result<Self> {
        let schema = schema::parse(schema_text, name)?;
        let store = StackedRecordStore::new(name, StoreOptions::default());
        let indexes = build_index_map(&schema);
        Ok(Database {
            schema,
            store,
            indexes,
            accessor,
            poisoned: false,
        })
    }

    /// Rebuild a database from a previously exported log plus its
    /// (separately retained) schema, replaying every record to
    /// reconstruct every index — the log is the ground truth; indexes are
    /// always a derivative of it (§1).
    pub fn from_data(bytes: &[u8], schema: DatabaseSchema, accessor: Box<dyn PayloadAccessor>) -> Result<Self> {
        let store = StackedRecordStore::from_data(bytes, StoreOptions::default())?;
        let mut indexes = build_index_map(&schema);
        for record in store.iterate_records() {
            if let Some(table) = schema.table(&record.header.table_name) {
                for column in &table.indexed_columns {
                    let value = accessor.get_field(&record.payload, &[column.as_str()])?;
                    let tree = indexes
                        .get_mut(&(table.name.clone(), column.clone()))
                        .expect("index map built from the same schema");
                    tree.insert(value, record.offset, record.header.data_length, record.header.sequence)?;
                }
            }
        }
        Ok(Database {
            schema,
            store,
            indexes,
            accessor,
            poisoned: false,
        })
    }

    fn check_not_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::with_message(
                ErrorCode::Poisoned,
                "database is poisoned after a partial write; rebuild from export_data",
            ));
        }
        Ok(())
    }

    fn resolve_table(&self, table_name: &str) -> Result<&TableDef> {
        self.schema
            .table(table_name)
            .ok_or_else(|| Error::with_message(ErrorCode::UnknownTable, table_name.to_string()))
    }

    /// Build a payload via the accessor, append it, and index every
    /// indexed column. Returns the record's sequence as its row id.
    pub fn insert(&mut self, table_name: &str, fields: &[(String, Value)]) -> Result<u64> {
        self.check_not_poisoned()?;
        self.resolve_table(table_name)?;
        let payload = self.accessor.build_buffer(table_name, fields)?;
        self.insert_raw(table_name, &payload)
    }

    /// Append an already-built payload and index it. Used by streaming
    /// ingest where payloads already exist in the wire format (§6).
    pub fn insert_raw(&mut self, table_name: &str, payload: &[u8]) -> Result<u64> {
        self.check_not_poisoned()?;
        self.resolve_table(table_name)?;

        let offset = self.store.append(table_name, payload)?;
        match self.index_record(table_name, offset) {
            Ok(sequence) => Ok(sequence),
            Err(e) => {
                self.poisoned = true;
                log::error!("poisoning database: index insert failed after append at offset {}: {}", offset, e);
                Err(Error::with_message(ErrorCode::Poisoned, e.to_string()))
            }
        }
    }

    fn index_record(&mut self, table_name: &str, offset: u64) -> Result<u64> {
        let record = self.store.read_record(offset)?;
        let table = self.resolve_table(table_name)?;
        for column in table.indexed_columns.clone() {
            let value = self.accessor.get_field(&record.payload, &[column.as_str()])?;
            let tree = self
                .indexes
                .get_mut(&(table_name.to_string(), column))
                .expect("index map built from the same schema");
            tree.insert(value, offset, record.header.data_length, record.header.sequence)?;
        }
        Ok(record.header.sequence)
    }

    /// Batch [`Self::insert_raw`]. No transaction semantics: a failure
    /// midway through leaves every prior payload applied (§4.5).
    pub fn stream(&mut self, table_name: &str, payloads: &[Vec<u8>]) -> Result<Vec<u64>> {
        let mut rowids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            rowids.push(self.insert_raw(table_name, payload)?);
        }
        Ok(rowids)
    }

    /// Unframe `buf` as `repeated (u32 length LE, payload[length])` and
    /// call [`Self::insert_raw`] per element — the wire-level ingest
    /// entry point for hosts that hand the engine one buffer instead of
    /// an already-split payload list (§6). Same no-rollback semantics as
    /// [`Self::stream`]. A trailing run of bytes too short to hold the
    /// next declared length, or shorter than the length it declares, is
    /// tolerated as an incomplete tail rather than an error, mirroring
    /// the log's own truncated-tail tolerance on replay.
    pub fn stream_framed(&mut self, table_name: &str, buf: &[u8]) -> Result<Vec<u64>> {
        let mut rowids = Vec::new();
        let mut offset = 0usize;
        while offset + 4 <= buf.len() {
            let len = u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]) as usize;
            offset += 4;
            if offset + len > buf.len() {
                break;
            }
            rowids.push(self.insert_raw(table_name, &buf[offset..offset + len])?);
            offset += len;
        }
        Ok(rowids)
    }

    /// Run one SQL statement (§4.4).
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        self.check_not_poisoned()?;
        query::execute(&self.schema, &self.store, &self.indexes, self.accessor.as_ref(), sql)
    }

    /// The live log bytes — a standalone, replayable artifact (§4.1).
    pub fn export_data(&self) -> Vec<u8> {
        self.store.get_data()
    }

    pub fn list_tables(&self) -> Vec<&str> {
        self.schema.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn get_table_def(&self, table_name: &str) -> Option<&TableDef> {
        self.schema.table(table_name)
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Per-table record count and index names.
    pub fn get_stats(&self) -> Vec<TableStats> {
        self.schema
            .tables
            .iter()
            .map(|t| TableStats {
                name: t.name.clone(),
                record_count: self.store.iterate_table_records(&t.name).count() as u64,
                indexes: t
                    .indexed_columns
                    .iter()
                    .map(|c| index_name(&t.name, c))
                    .collect(),
            })
            .collect()
    }
}

fn index_name(table_name: &str, column_name: &str) -> String {
    format!("{}_{}", table_name, column_name)
}

fn build_index_map(schema: &DatabaseSchema) -> IndexMap {
    let mut indexes = HashMap::new();
    for table in &schema.tables {
        for column_name in &table.indexed_columns {
            let column = table
                .column(column_name)
                .expect("indexed_columns only names columns declared on the table");
            let config = BTreeConfig::new(
                index_name(&table.name, column_name),
                table.name.clone(),
                column_name.clone(),
                column.ty.value_tag(),
            );
            indexes.insert((table.name.clone(), column_name.clone()), BTree::new(config));
        }
    }
    indexes
}
