// crates/cadence-store/src/kv.rs
//
// The raw key-value seam plus the typed SCALE accessors the engine actually
// uses. Storage failures are wrapped as `CadenceError::Storage`; decode
// failures of persisted values as `CadenceError::Codec`.

use cadence_core::error::CadenceError;
use parity_scale_codec::{Decode, Encode};

/// Synchronous key-value storage.
///
/// Implemented by the backends in this crate and by any host that brings its
/// own state store. All engine reads and writes go through this trait.
pub trait KvStore {
    /// Get the raw value under `key`, if present.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CadenceError>;

    /// Put a raw value under `key`, overwriting any existing value.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), CadenceError>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), CadenceError>;
}

/// Typed get/put/take/mutate over any [`KvStore`], using the SCALE codec.
pub trait KvStoreExt: KvStore {
    /// Decode the value under `key`, if present.
    fn get_typed<T: Decode>(&self, key: &[u8]) -> Result<Option<T>, CadenceError> {
        match self.get(key)? {
            Some(bytes) => {
                let value = T::decode(&mut bytes.as_slice())?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Decode the value under `key`, or its `Default` when absent.
    fn get_or_default<T: Decode + Default>(&self, key: &[u8]) -> Result<T, CadenceError> {
        Ok(self.get_typed(key)?.unwrap_or_default())
    }

    /// Encode and store a value under `key`.
    fn put_typed<T: Encode>(&mut self, key: &[u8], value: &T) -> Result<(), CadenceError> {
        self.put(key, &value.encode())
    }

    /// Remove and decode the value under `key`, if present.
    fn take_typed<T: Decode>(&mut self, key: &[u8]) -> Result<Option<T>, CadenceError> {
        let value = self.get_typed(key)?;
        if value.is_some() {
            self.delete(key)?;
        }
        Ok(value)
    }

    /// Read-modify-write the value under `key`, starting from `Default` when
    /// absent. Returns the stored result.
    fn mutate_typed<T, F>(&mut self, key: &[u8], f: F) -> Result<T, CadenceError>
    where
        T: Decode + Encode + Default,
        F: FnOnce(&mut T),
    {
        let mut value: T = self.get_or_default(key)?;
        f(&mut value);
        self.put_typed(key, &value)?;
        Ok(value)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemStore;

    #[test]
    fn test_typed_round_trip() {
        let mut store = MemStore::new();
        store.put_typed(b"n", &42u64).unwrap();
        assert_eq!(store.get_typed::<u64>(b"n").unwrap(), Some(42));
        assert_eq!(store.get_typed::<u64>(b"missing").unwrap(), None);
    }

    #[test]
    fn test_get_or_default() {
        let store = MemStore::new();
        assert_eq!(store.get_or_default::<u32>(b"absent").unwrap(), 0);
    }

    #[test]
    fn test_take_removes() {
        let mut store = MemStore::new();
        store.put_typed(b"k", &7u32).unwrap();
        assert_eq!(store.take_typed::<u32>(b"k").unwrap(), Some(7));
        assert_eq!(store.get_typed::<u32>(b"k").unwrap(), None);
        assert_eq!(store.take_typed::<u32>(b"k").unwrap(), None);
    }

    #[test]
    fn test_mutate_starts_from_default() {
        let mut store = MemStore::new();
        let result = store.mutate_typed::<u64, _>(b"counter", |n| *n += 5).unwrap();
        assert_eq!(result, 5);
        let result = store.mutate_typed::<u64, _>(b"counter", |n| *n += 5).unwrap();
        assert_eq!(result, 10);
    }

    #[test]
    fn test_decode_failure_is_codec_error() {
        let mut store = MemStore::new();
        store.put(b"k", &[1u8]).unwrap();
        assert!(matches!(
            store.get_typed::<u64>(b"k"),
            Err(CadenceError::Codec(_))
        ));
    }
}
