use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::StorageError;
use crate::traits::{BatchOp, Column, KvPairs, KvStore};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory store, one ordered map per column. Used by tests and by nodes
/// configured without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    columns: RwLock<HashMap<Column, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned(e: impl std::fmt::Display) -> StorageError {
        StorageError::LockPoisoned {
            reason: format!("memory store: {e}"),
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let columns = self.columns.read().map_err(Self::poisoned)?;
        Ok(columns.get(&column).and_then(|t| t.get(key)).cloned())
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut columns = self.columns.write().map_err(Self::poisoned)?;
        columns
            .entry(column)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        let mut columns = self.columns.write().map_err(Self::poisoned)?;
        if let Some(table) = columns.get_mut(&column) {
            table.remove(key);
        }
        Ok(())
    }

    fn prefix_scan(&self, column: Column, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let columns = self.columns.read().map_err(Self::poisoned)?;
        let Some(table) = columns.get(&column) else {
            return Ok(Vec::new());
        };
        Ok(table
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut columns = self.columns.write().map_err(Self::poisoned)?;
        for op in ops {
            match op {
                BatchOp::Put { column, key, value } => {
                    columns.entry(column).or_default().insert(key, value);
                }
                BatchOp::Delete { column, key } => {
                    if let Some(table) = columns.get_mut(&column) {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}
