// Database - Abstraction RocksDB
use super::kv::{KvStore, StoreError, WriteOp};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Wrapper autour de RocksDB
pub struct Database {
    db: Arc<DB>,
}

impl Database {
    /// Ouvre ou crée une base de données
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Limiter l'accumulation de fichiers
        opts.set_keep_log_file_num(5);
        opts.set_max_manifest_file_size(64 * 1024 * 1024);
        opts.set_max_background_jobs(2);
        opts.set_recycle_log_file_num(2);

        let db = DB::open(&opts, path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Batch write (transaction atomique)
    pub fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut batch = rocksdb::WriteBatch::default();

        for op in ops {
            match op {
                WriteOp::Put { key, value } => batch.put(&key, &value),
                WriteOp::Delete { key } => batch.delete(&key),
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }
}

impl KvStore for Database {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db
            .put(key, value)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.db
            .delete(key)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut items = Vec::new();

        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            if end.map_or(false, |end| key.as_ref() >= end) {
                break;
            }
            items.push((key.to_vec(), value.to_vec()));
        }

        Ok(items)
    }

    fn write_batch(&mut self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        self.batch_write(ops)
    }
}
