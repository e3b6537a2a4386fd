//! B-tree type definitions: configuration, index entries, and nodes.

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueTag};

/// Default branching factor (order).
pub const DEFAULT_ORDER: usize = 128;

/// Identifies one B-tree: which table/column it indexes and how its keys
/// compare. Stored alongside the tree so a serialized snapshot is
/// self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BTreeConfig {
    pub name: String,
    pub table_name: String,
    pub column_name: String,
    pub key_type: ValueTag,
    pub order: usize,
}

impl BTreeConfig {
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        key_type: ValueTag,
    ) -> Self {
        BTreeConfig {
            name: name.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            key_type,
            order: DEFAULT_ORDER,
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order.max(3);
        self
    }
}

/// One entry in a B-tree: a key and the location of the record it points
/// at. `data_offset` addresses the record's *header*, not its payload
/// (§3): readers derive the payload position via `RECORD_HEADER_SIZE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: Value,
    pub data_offset: u64,
    pub data_length: u32,
    pub sequence: u64,
}

/// A node in the B-tree arena, referenced by id rather than by pointer so
/// the tree has no reference cycles (§9 design note): children and parent
/// are `u64` ids looked up in the tree's node map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTreeNode {
    pub id: u64,
    pub is_leaf: bool,
    pub entries: Vec<IndexEntry>,
    pub children: Vec<u64>,
    pub parent: Option<u64>,
}

impl BTreeNode {
    pub fn new_leaf(id: u64) -> Self {
        BTreeNode {
            id,
            is_leaf: true,
            entries: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn new_internal(id: u64, entries: Vec<IndexEntry>, children: Vec<u64>) -> Self {
        BTreeNode {
            id,
            is_leaf: false,
            entries,
            children,
            parent: None,
        }
    }
}

/// Summary statistics returned by [`crate::btree::BTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeStats {
    pub entry_count: usize,
    pub height: usize,
    pub node_count: usize,
}

/// A structural snapshot produced by [`crate::btree::BTree::serialize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BTreeSnapshot {
    pub config: BTreeConfig,
    pub root: u64,
    pub next_node_id: u64,
    pub nodes: Vec<BTreeNode>,
}
