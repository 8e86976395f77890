use std::sync::Arc;

use crate::error::StorageError;

/// Key-value pairs returned by a prefix scan, in key order.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Logical keyspaces. Each backend keeps them physically separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Quorum-signed VAAs, keyed by message id.
    Vaas,
    /// Governor ledger and pending queue snapshots.
    Governor,
}

impl Column {
    pub const ALL: [Column; 2] = [Column::Vaas, Column::Governor];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Vaas => "vaas",
            Column::Governor => "governor",
        }
    }
}

/// A write applied as part of an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        column: Column,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Vec<u8>,
    },
}

/// Column-aware key-value store.
pub trait KvStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError>;
    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError>;
    fn prefix_scan(&self, column: Column, prefix: &[u8]) -> Result<KvPairs, StorageError>;

    /// Apply all `ops` or none of them.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;

    fn exists(&self, column: Column, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(column, key)?.is_some())
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(column, key)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        (**self).put(column, key, value)
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        (**self).delete(column, key)
    }

    fn prefix_scan(&self, column: Column, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        (**self).prefix_scan(column, prefix)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        (**self).write_batch(ops)
    }

    fn exists(&self, column: Column, key: &[u8]) -> Result<bool, StorageError> {
        (**self).exists(column, key)
    }
}
