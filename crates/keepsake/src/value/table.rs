//! Plain composite values

use indexmap::IndexMap;

use super::{TableKey, Value};
use crate::heap::ObjectId;

/// A table: an insertion-ordered map plus an optional metatable.
///
/// Uses IndexMap so iteration (and therefore serialization) follows the
/// order in which entries were first assigned.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Entries in insertion order. Never contains a `nil` value.
    pub entries: IndexMap<TableKey, Value>,

    /// Attached metatable
    pub metatable: Option<ObjectId>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an entry. Assigning `nil` removes it, keeping the order of the rest.
    pub fn set(&mut self, key: TableKey, value: Value) {
        if value.is_nil() {
            self.entries.shift_remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Read an entry (`nil` when absent)
    pub fn get(&self, key: &TableKey) -> Value {
        self.entries.get(key).cloned().unwrap_or(Value::Nil)
    }

    /// Read a string-keyed entry
    pub fn get_name(&self, name: &str) -> Value {
        self.get(&TableKey::name(name))
    }

    /// Add a field (builder pattern)
    pub fn with(mut self, key: impl Into<TableKey>, value: impl Into<Value>) -> Self {
        self.set(key.into(), value.into());
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &Value)> {
        self.entries.iter()
    }
}
