// crates/cadence-consensus/src/queries.rs
//
// The read-only query surface exposed across the host boundary: pure
// projections over persisted state, returned as SCALE-encoded byte buffers.
// Typed counterparts live on the engine itself (`configuration`,
// `current_epoch`, `next_epoch`, `current_epoch_start`).

use parity_scale_codec::Encode;

use cadence_core::error::CadenceError;
use cadence_store::KvStore;

use crate::engine::EpochEngine;

impl<S: KvStore> EpochEngine<'_, S> {
    /// `configuration()`, encoded.
    pub fn configuration_encoded(&self) -> Result<Vec<u8>, CadenceError> {
        Ok(self.configuration()?.encode())
    }

    /// `current_epoch_start()`, encoded.
    pub fn current_epoch_start_encoded(&self) -> Result<Vec<u8>, CadenceError> {
        Ok(self.current_epoch_start()?.encode())
    }

    /// `current_epoch()`, encoded.
    pub fn current_epoch_encoded(&self) -> Result<Vec<u8>, CadenceError> {
        Ok(self.current_epoch()?.encode())
    }

    /// `next_epoch()`, encoded.
    pub fn next_epoch_encoded(&self) -> Result<Vec<u8>, CadenceError> {
        Ok(self.next_epoch()?.encode())
    }
}
