use std::collections::HashMap;

use greenmap_common::{Error, Result};

use super::{KeyValue, Record, RecordStore};

/// In-memory tables keyed by table name
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table
    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Record>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    fn table(&self, name: &str) -> Result<&[Record]> {
        self.tables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Database(format!("table {name} does not exist")))
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.table(table)?.to_vec())
    }

    fn fetch_by_key(&self, table: &str, column: &str, key: &KeyValue) -> Result<Option<Record>> {
        Ok(self
            .table(table)?
            .iter()
            .find(|row| row.get(column).is_some_and(|value| key.matches(value)))
            .cloned())
    }
}
