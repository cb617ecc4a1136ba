// crates/cadence-store/src/rocks.rs
//
// RocksDB-backed persistent storage for standalone hosts.
//
// The engine's keys are plain namespaced byte strings, so no column families
// or secondary indexes are needed; one default column holds everything.

use rocksdb::{DBWithThreadMode, MultiThreaded, Options};

use cadence_core::error::CadenceError;

use crate::kv::KvStore;

/// RocksDB wrapper implementing [`KvStore`].
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, CadenceError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)
            .map_err(|e| CadenceError::Storage(format!("Failed to open RocksDB at {}: {}", path, e)))?;

        Ok(Self { db })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CadenceError> {
        self.db
            .get(key)
            .map_err(|e| CadenceError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), CadenceError> {
        self.db
            .put(key, value)
            .map_err(|e| CadenceError::Storage(format!("RocksDB put failed: {}", e)))
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), CadenceError> {
        self.db
            .delete(key)
            .map_err(|e| CadenceError::Storage(format!("RocksDB delete failed: {}", e)))
    }
}
