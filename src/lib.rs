//! An embedded, schema-driven storage and query engine over an
//! append-only log of length-framed, self-describing binary records.
//!
//! The log (`store`) is ground truth; the B-tree indexes (`btree`) are
//! derivatives rebuilt from it on demand. A schema (`schema`) declares a
//! table's columns and which ones are keyed or indexed; a host-supplied
//! [`accessor::PayloadAccessor`] is the only thing that ever looks inside
//! a payload. The query coordinator (`query`) plans and executes the
//! narrow SQL dialect of §4.4 against those pieces, and [`db::Database`]
//! ties everything together behind the small host-visible surface of §6.

pub mod accessor;
pub mod btree;
pub mod crc;
pub mod db;
pub mod error;
pub mod query;
pub mod schema;
pub mod store;
pub mod value;

pub use db::{Database, TableStats};
pub use error::{Error, ErrorCode, Result};
pub use query::QueryResult;
pub use value::{Value, ValueTag};
