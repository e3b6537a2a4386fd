//! The dynamic scalar value type shared by record fields, B-tree keys, and
//! SQL literals.
//!
//! [`Value`] mirrors the tagged scalar most embedded engines use internally
//! (compare SQLite's `sqlite3_value`): a small closed sum of the primitive
//! kinds a self-describing payload can carry, with a total order defined
//! across same-tagged values and a stable cross-tag order so keys with
//! heterogeneous producers still sort deterministically in tests.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode, Result};

/// A tagged scalar value.
///
/// `Float` never carries NaN once it reaches a B-tree key position —
/// callers that extract a NaN field value for an indexed column get
/// [`ErrorCode::TypeMismatch`] from [`BTree::insert`](crate::btree::BTree::insert)
/// rather than a silently-unordered key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

/// The tag of a [`Value`], independent of its payload. Used to type B-tree
/// keys and schema columns without carrying a live value around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueTag {
    Null,
    Int,
    Float,
    String,
    Bytes,
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Null => ValueTag::Null,
            Value::Int(_) => ValueTag::Int,
            Value::Float(_) => ValueTag::Float,
            Value::String(_) => ValueTag::String,
            Value::Bytes(_) => ValueTag::Bytes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values under the engine's total order.
    ///
    /// Null sorts below every non-null value. Same-tag comparisons use the
    /// natural order for that tag (numeric for Int/Float, code-unit order
    /// for String, lexicographic for Bytes). Cross-tag comparisons between
    /// two non-null values are a programmer error in the data model proper
    /// (§3: "Comparison is defined only between values of the same
    /// non-null tag") but are still given a deterministic answer here,
    /// ordering tags `Int < Float < String < Bytes`, so that tests and
    /// diagnostic tooling built on top of `Value` never observe a panic.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.as_str().cmp(b.as_str()),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.tag_rank().cmp(&other.tag_rank()),
        }
    }

    fn tag_rank(&self) -> u8 {
        match self.tag() {
            ValueTag::Null => 0,
            ValueTag::Int => 1,
            ValueTag::Float => 2,
            ValueTag::String => 3,
            ValueTag::Bytes => 4,
        }
    }

    /// Validate that `self` can serve as a key of the given tag, per the
    /// B-tree's `keyType`. Fails with [`ErrorCode::TypeMismatch`] on a tag
    /// mismatch, and rejects NaN floats (they have no place in a total
    /// order and the spec excludes them from keys). `Null` is valid
    /// against any expected tag: a lookup keyed on `Null` is well-formed
    /// for every column, it just never matches an indexed entry (indexed
    /// columns never index a null field — see [`BTree::insert`]).
    pub fn check_key_type(&self, expected: ValueTag) -> Result<()> {
        if self.is_null() {
            return Ok(());
        }
        if let Value::Float(f) = self {
            if f.is_nan() {
                return Err(Error::with_message(
                    ErrorCode::TypeMismatch,
                    "NaN is not a valid B-tree key",
                ));
            }
        }
        if self.tag() != expected {
            return Err(Error::with_message(
                ErrorCode::TypeMismatch,
                format!("expected key of type {:?}, got {:?}", expected, self.tag()),
            ));
        }
        Ok(())
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_below_everything() {
        assert_eq!(Value::Null.compare(&Value::Int(-999)), Ordering::Less);
        assert_eq!(Value::Int(-999).compare(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn numeric_order() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Ordering::Less);
        assert_eq!(
            Value::Float(1.5).compare(&Value::Float(1.25)),
            Ordering::Greater
        );
    }

    #[test]
    fn string_order_is_code_unit() {
        assert_eq!(
            Value::String("alice".into()).compare(&Value::String("bob".into())),
            Ordering::Less
        );
    }

    #[test]
    fn bytes_order_is_lexicographic() {
        assert_eq!(
            Value::Bytes(vec![1, 2]).compare(&Value::Bytes(vec![1, 3])),
            Ordering::Less
        );
    }

    #[test]
    fn check_key_type_rejects_mismatch() {
        let err = Value::Int(1).check_key_type(ValueTag::String).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn check_key_type_rejects_nan() {
        let err = Value::Float(f64::NAN)
            .check_key_type(ValueTag::Float)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }
}
