// crates/cadence-store/src/overlay.rs
//
// Block-scoped write buffer over an arbitrary backend.
//
// The engine's crash-consistency model is "whole-block atomic commit or
// discard": every write a block makes either lands together or not at all.
// `Overlay` gives a host that boundary: run the per-block hooks against the
// overlay, then `commit` on success or drop it on failure.

use std::collections::BTreeMap;

use cadence_core::error::CadenceError;

use crate::kv::KvStore;

/// A buffered view over a backing store. Reads fall through to the backend
/// for keys the overlay has not touched; writes and deletes stay buffered
/// until [`Overlay::commit`].
pub struct Overlay<'a, S: KvStore> {
    base: &'a mut S,
    // None marks a buffered delete.
    changes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore> Overlay<'a, S> {
    /// Open an overlay over `base`.
    pub fn new(base: &'a mut S) -> Self {
        Self { base, changes: BTreeMap::new() }
    }

    /// Number of buffered changes (writes and deletes).
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    /// Apply all buffered changes to the backend.
    ///
    /// A mid-commit backend failure leaves the backend partially written;
    /// hosts that need stronger guarantees should hand the engine a backend
    /// with native atomic batches instead.
    pub fn commit(self) -> Result<(), CadenceError> {
        for (key, change) in self.changes {
            match change {
                Some(value) => self.base.put(&key, &value)?,
                None => self.base.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Drop all buffered changes, leaving the backend untouched.
    pub fn discard(self) {
        drop(self);
    }
}

impl<S: KvStore> KvStore for Overlay<'_, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CadenceError> {
        match self.changes.get(key) {
            Some(change) => Ok(change.clone()),
            None => self.base.get(key),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), CadenceError> {
        self.changes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), CadenceError> {
        self.changes.insert(key.to_vec(), None);
        Ok(())
    }
}
