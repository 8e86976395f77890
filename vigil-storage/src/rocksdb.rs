use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatchWithTransaction,
};

use crate::error::StorageError;
use crate::traits::{BatchOp, Column, KvPairs, KvStore};

/// RocksDB-backed store. Each [`Column`] maps to a column family.
pub struct RocksDbStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksDbStore {
    /// Open (or create) a database at `path` with every column family present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = Column::ALL
            .iter()
            .map(|c| ColumnFamilyDescriptor::new(c.name(), Options::default()));
        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, descriptors)?;
        tracing::debug!(path = %db.path().display(), "opened rocksdb store");
        Ok(Self { db })
    }

    fn cf(&self, column: Column) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(column.name())
            .ok_or(StorageError::MissingColumn {
                name: column.name(),
            })
    }
}

impl KvStore for RocksDbStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get_cf(&self.cf(column)?, key)?)
    }

    fn put(&self, column: Column, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db.put_cf(&self.cf(column)?, key, value)?;
        Ok(())
    }

    fn delete(&self, column: Column, key: &[u8]) -> Result<(), StorageError> {
        self.db.delete_cf(&self.cf(column)?, key)?;
        Ok(())
    }

    fn prefix_scan(&self, column: Column, prefix: &[u8]) -> Result<KvPairs, StorageError> {
        let cf = self.cf(column)?;
        let mut results = Vec::new();
        for item in self.db.prefix_iterator_cf(&cf, prefix) {
            let (key, value) = item?;
            // The iterator seeks to the prefix but does not stop after it.
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut batch = WriteBatchWithTransaction::<false>::default();
        for op in ops {
            match op {
                BatchOp::Put { column, key, value } => batch.put_cf(&self.cf(column)?, key, value),
                BatchOp::Delete { column, key } => batch.delete_cf(&self.cf(column)?, key),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}
