//! The in-memory B-tree index: typed keys, duplicates, range scans,
//! serializable snapshots.
//!
//! Nodes live in an arena (`nodes: HashMap<u64, BTreeNode>`) addressed by
//! `nodeId` rather than linked by pointer, so the parent/child references
//! the source keeps never form a reference cycle (§9 design note).
//! Rebalancing — splitting a full child before descending into it — is
//! pure id arithmetic over that map.

pub mod types;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, ErrorCode, Result};
use crate::value::Value;

pub use types::{BTreeConfig, BTreeNode, BTreeSnapshot, BTreeStats, IndexEntry, DEFAULT_ORDER};

/// An order-`m` B-tree mapping typed keys to index entries.
pub struct BTree {
    config: BTreeConfig,
    nodes: HashMap<u64, BTreeNode>,
    root: u64,
    next_node_id: u64,
    entry_count: usize,
}

impl BTree {
    /// Create an empty tree with a single leaf root.
    pub fn new(config: BTreeConfig) -> Self {
        let root_id = 0;
        let mut nodes = HashMap::new();
        nodes.insert(root_id, BTreeNode::new_leaf(root_id));
        BTree {
            config,
            nodes,
            root: root_id,
            next_node_id: root_id + 1,
            entry_count: 0,
        }
    }

    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    fn order(&self) -> usize {
        self.config.order
    }

    fn alloc_node(&mut self, node: BTreeNode) -> u64 {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    fn node(&self, id: u64) -> &BTreeNode {
        self.nodes.get(&id).expect("node id present in arena")
    }

    fn node_mut(&mut self, id: u64) -> &mut BTreeNode {
        self.nodes.get_mut(&id).expect("node id present in arena")
    }

    /// Insert `key -> (data_offset, data_length, sequence)`. Duplicates are
    /// permitted; a later insert of an already-present key is appended
    /// after its predecessors so in-order traversal preserves insertion
    /// order among ties (§4.2).
    pub fn insert(
        &mut self,
        key: Value,
        data_offset: u64,
        data_length: u32,
        sequence: u64,
    ) -> Result<()> {
        key.check_key_type(self.config.key_type)?;
        let entry = IndexEntry {
            key,
            data_offset,
            data_length,
            sequence,
        };

        let order = self.order();
        if self.node(self.root).entries.len() == order - 1 {
            let new_root_id = self.next_node_id;
            self.next_node_id += 1;
            let old_root = self.root;
            let new_root = BTreeNode::new_internal(new_root_id, Vec::new(), vec![old_root]);
            self.nodes.insert(new_root_id, new_root);
            self.node_mut(old_root).parent = Some(new_root_id);
            self.split_child(new_root_id, 0);
            self.root = new_root_id;
        }
        self.insert_non_full(self.root, entry);
        self.entry_count += 1;
        Ok(())
    }

    /// Split the full child `parent.children[i]` in two, promoting its
    /// median entry into `parent`.
    fn split_child(&mut self, parent_id: u64, i: usize) {
        let order = self.order();
        let child_id = self.node(parent_id).children[i];
        let mid = (order - 1) / 2;

        let new_id = self.next_node_id;
        self.next_node_id += 1;

        let (median, sibling) = {
            let child = self.node_mut(child_id);
            let right_entries = child.entries.split_off(mid + 1);
            let median = child.entries.pop().expect("full node has a median entry");
            let right_children = if child.is_leaf {
                Vec::new()
            } else {
                child.children.split_off(mid + 1)
            };
            let mut sibling = BTreeNode::new_internal(new_id, right_entries, right_children);
            sibling.is_leaf = child.is_leaf;
            sibling.parent = Some(parent_id);
            (median, sibling)
        };

        if !sibling.is_leaf {
            for &child_of_sibling in &sibling.children {
                self.node_mut(child_of_sibling).parent = Some(new_id);
            }
        }
        self.nodes.insert(new_id, sibling);

        let parent = self.node_mut(parent_id);
        parent.entries.insert(i, median);
        parent.children.insert(i + 1, new_id);
    }

    /// Find the insertion index among `entries`: the first position whose
    /// key is strictly greater than `key`, so duplicates land after every
    /// existing entry with the same key (stable insertion order).
    fn insertion_index(entries: &[IndexEntry], key: &Value) -> usize {
        entries.partition_point(|e| e.key.compare(key) != Ordering::Greater)
    }

    fn insert_non_full(&mut self, node_id: u64, entry: IndexEntry) {
        let order = self.order();
        let is_leaf = self.node(node_id).is_leaf;
        if is_leaf {
            let node = self.node_mut(node_id);
            let i = Self::insertion_index(&node.entries, &entry.key);
            node.entries.insert(i, entry);
            return;
        }

        let mut i = Self::insertion_index(&self.node(node_id).entries, &entry.key);
        let mut child_id = self.node(node_id).children[i];
        if self.node(child_id).entries.len() == order - 1 {
            self.split_child(node_id, i);
            // The split may have promoted a new separator at `i`; recompute
            // which child the key now belongs under.
            i = Self::insertion_index(&self.node(node_id).entries, &entry.key);
            child_id = self.node(node_id).children[i];
        }
        self.insert_non_full(child_id, entry);
    }

    /// All entries whose key equals `key`.
    pub fn search(&self, key: &Value) -> Result<Vec<IndexEntry>> {
        key.check_key_type(self.config.key_type)?;
        Ok(self.search_node(self.root, key))
    }

    fn search_node(&self, node_id: u64, key: &Value) -> Vec<IndexEntry> {
        let node = self.node(node_id);
        if node.is_leaf {
            return node
                .entries
                .iter()
                .filter(|e| e.key.compare(key) == Ordering::Equal)
                .cloned()
                .collect();
        }

        let mut results = Vec::new();
        let mut visited = vec![false; node.children.len()];
        let mut i = 0;
        let visit = |results: &mut Vec<IndexEntry>, visited: &mut Vec<bool>, idx: usize, tree: &BTree| {
            if !visited[idx] {
                visited[idx] = true;
                results.extend(tree.search_node(node.children[idx], key));
            }
        };
        while i < node.entries.len() {
            match key.compare(&node.entries[i].key) {
                Ordering::Less => {
                    visit(&mut results, &mut visited, i, self);
                    break;
                }
                Ordering::Equal => {
                    results.push(node.entries[i].clone());
                    visit(&mut results, &mut visited, i, self);
                    visit(&mut results, &mut visited, i + 1, self);
                    i += 1;
                }
                Ordering::Greater => i += 1,
            }
        }
        if i == node.entries.len() {
            visit(&mut results, &mut visited, node.children.len() - 1, self);
        }
        results
    }

    /// Every entry with `min <= key <= max`, key-ascending, ties in
    /// insertion order.
    pub fn range(&self, min: &Value, max: &Value) -> Result<Vec<IndexEntry>> {
        self.range_open(Some(min), Some(max))
    }

    /// Every entry, key-ascending.
    pub fn all(&self) -> Vec<IndexEntry> {
        let mut out = Vec::new();
        self.range_node(self.root, None, None, &mut out);
        out
    }

    /// Like [`Self::range`] but either bound may be open (`None`), for
    /// the query planner's single-sided `< v` / `> v` predicates, which
    /// have no finite counterpart to hand `range` for an arbitrary key
    /// type. Bounds that are present are still type-checked.
    pub fn range_open(&self, min: Option<&Value>, max: Option<&Value>) -> Result<Vec<IndexEntry>> {
        if let Some(m) = min {
            m.check_key_type(self.config.key_type)?;
        }
        if let Some(m) = max {
            m.check_key_type(self.config.key_type)?;
        }
        let mut out = Vec::new();
        self.range_node(self.root, min, max, &mut out);
        Ok(out)
    }

    fn range_node(&self, node_id: u64, min: Option<&Value>, max: Option<&Value>, out: &mut Vec<IndexEntry>) {
        let node = self.node(node_id);
        if node.is_leaf {
            for e in &node.entries {
                if within(&e.key, min, max) {
                    out.push(e.clone());
                }
            }
            return;
        }

        let k = node.entries.len();
        for i in 0..=k {
            let lower = if i > 0 { Some(&node.entries[i - 1].key) } else { None };
            let upper = if i < k { Some(&node.entries[i].key) } else { None };
            let upper_ok = match (upper, min) {
                (Some(u), Some(m)) => u.compare(m) != Ordering::Less,
                _ => true,
            };
            let lower_ok = match (lower, max) {
                (Some(l), Some(m)) => l.compare(m) != Ordering::Greater,
                _ => true,
            };
            if upper_ok && lower_ok {
                self.range_node(node.children[i], min, max, out);
            }
            if i < k && within(&node.entries[i].key, min, max) {
                out.push(node.entries[i].clone());
            }
        }
    }

    /// `(entryCount, height, nodeCount)`. Height is 1 for a leaf root.
    pub fn stats(&self) -> BTreeStats {
        let mut height = 1;
        let mut node_id = self.root;
        while !self.node(node_id).is_leaf {
            node_id = self.node(node_id).children[0];
            height += 1;
        }
        BTreeStats {
            entry_count: self.entry_count,
            height,
            node_count: self.nodes.len(),
        }
    }

    /// Structural snapshot for persistence alongside the log.
    pub fn serialize(&self) -> BTreeSnapshot {
        BTreeSnapshot {
            config: self.config.clone(),
            root: self.root,
            next_node_id: self.next_node_id,
            nodes: self.nodes.values().cloned().collect(),
        }
    }

    /// Restore a tree from a snapshot. `entryCount` is recomputed as the
    /// sum of leaf entries only (§9 open question, decided: leaves only —
    /// internal separators are not double-counted).
    pub fn deserialize(snapshot: BTreeSnapshot) -> Self {
        let entry_count = snapshot
            .nodes
            .iter()
            .filter(|n| n.is_leaf)
            .map(|n| n.entries.len())
            .sum();
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|n| (n.id, n))
            .collect::<HashMap<_, _>>();
        BTree {
            config: snapshot.config,
            nodes,
            root: snapshot.root,
            next_node_id: snapshot.next_node_id,
            entry_count,
        }
    }
}

fn within(key: &Value, min: Option<&Value>, max: Option<&Value>) -> bool {
    if let Some(m) = min {
        if key.compare(m) == Ordering::Less {
            return false;
        }
    }
    if let Some(m) = max {
        if key.compare(m) == Ordering::Greater {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueTag;

    fn int_tree(order: usize) -> BTree {
        let config = BTreeConfig::new("idx", "t", "k", ValueTag::Int).with_order(order);
        BTree::new(config)
    }

    #[test]
    fn range_over_small_order_tree() {
        let mut tree = int_tree(4);
        for i in 0..20 {
            tree.insert(Value::Int(i), i as u64 * 10, 1, i as u64).unwrap();
        }
        let hits = tree.range(&Value::Int(5), &Value::Int(10)).unwrap();
        let keys: Vec<i64> = hits
            .iter()
            .map(|e| match &e.key {
                Value::Int(v) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn all_is_sorted_after_many_inserts() {
        let mut tree = int_tree(4);
        for i in (0..50).rev() {
            tree.insert(Value::Int(i), i as u64, 1, i as u64).unwrap();
        }
        let all = tree.all();
        for w in all.windows(2) {
            assert_ne!(w[0].key.compare(&w[1].key), Ordering::Greater);
        }
        assert_eq!(all.len(), 50);
    }

    #[test]
    fn string_point_query() {
        let config = BTreeConfig::new("idx", "t", "name", ValueTag::String).with_order(4);
        let mut tree = BTree::new(config);
        tree.insert(Value::String("alice".into()), 100, 1, 0).unwrap();
        tree.insert(Value::String("bob".into()), 200, 1, 1).unwrap();
        tree.insert(Value::String("charlie".into()), 300, 1, 2).unwrap();
        let hits = tree.search(&Value::String("bob".into())).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].data_offset, 200);
    }

    #[test]
    fn duplicate_keys_all_found() {
        let mut tree = int_tree(4);
        for i in 0..30 {
            tree.insert(Value::Int(7), i, 1, i).unwrap();
        }
        let hits = tree.search(&Value::Int(7)).unwrap();
        assert_eq!(hits.len(), 30);
        let stats = tree.stats();
        assert_eq!(stats.entry_count, 30);
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut tree = int_tree(4);
        let err = tree
            .insert(Value::String("x".into()), 0, 0, 0)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn serialize_round_trip_preserves_all() {
        let mut tree = int_tree(4);
        for i in 0..40 {
            tree.insert(Value::Int(i), i as u64, 1, i as u64).unwrap();
        }
        let snapshot = tree.serialize();
        let restored = BTree::deserialize(snapshot);
        assert_eq!(restored.all(), tree.all());
    }

    #[test]
    fn height_is_one_for_leaf_root() {
        let tree = int_tree(128);
        assert_eq!(tree.stats().height, 1);
    }
}
