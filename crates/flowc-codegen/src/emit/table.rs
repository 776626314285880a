//! Side data tables, indexed by grouping key.

use flowc_core::{Grouping, Key, Record, Value};
use indexmap::IndexMap;

/// Read-only lookup table handed to user functions.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    grouping: Grouping,
    groups: IndexMap<Key, Vec<Record>>,
}

impl DataTable {
    pub fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            groups: IndexMap::new(),
        }
    }

    pub fn from_records(grouping: Grouping, records: impl IntoIterator<Item = Record>) -> Self {
        let mut table = Self::new(grouping);
        for record in records {
            table.add(record);
        }
        table
    }

    pub fn add(&mut self, record: Record) {
        let key = self.grouping.key_of(&record);
        self.groups.entry(key).or_default().push(record);
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// Records whose key equals `key`; empty when none match.
    pub fn find(&self, key: &[Value]) -> &[Record] {
        self.groups
            .get(&Key(key.to_vec()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
