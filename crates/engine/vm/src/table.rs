//! Table storage for the engine heap

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::value::{TableKey, Value};

/// An ordered map from keys to values.
///
/// Storing `Nil` removes the entry: absent and nil are indistinguishable at
/// the table layer.
#[derive(Debug, Default)]
pub struct Table {
    entries: BTreeMap<TableKey, Value>,
}

impl Table {
    /// Look up a key, returning `Nil` when absent
    pub fn get(&self, key: &TableKey) -> Value {
        self.entries.get(key).cloned().unwrap_or(Value::Nil)
    }

    /// Store a value under a key; `Nil` removes the entry
    pub fn set(&mut self, key: TableKey, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Total number of entries, regardless of key kind
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry following `prev` in key order, or the first entry when
    /// `prev` is `None`. Drives stateless enumeration: the caller hands back
    /// the last key it saw.
    pub fn next_after(&self, prev: Option<&TableKey>) -> Option<(TableKey, Value)> {
        let mut range = match prev {
            None => self.entries.range::<TableKey, _>(..),
            Some(key) => self
                .entries
                .range((Bound::Excluded(key.clone()), Bound::Unbounded)),
        };
        range.next().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Length of the contiguous integer sequence starting at position 1.
    ///
    /// This is the fast "array length" and deliberately ignores holes and
    /// non-integer keys; total entry count is [`Table::len`].
    pub fn seq_len(&self) -> i64 {
        let mut n = 0;
        while self.entries.contains_key(&TableKey::Int(n + 1)) {
            n += 1;
        }
        n
    }
}
