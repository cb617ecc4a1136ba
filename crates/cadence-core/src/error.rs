// crates/cadence-core/src/error.rs

use thiserror::Error;

/// Engine-wide error types for Cadence.
///
/// Decode-time corruption always surfaces typed so the host can reject the
/// offending block or extrinsic without a partial commit. Storage failures
/// are wrapped unchanged; they are fatal at the per-block hooks.
#[derive(Debug, Error)]
pub enum CadenceError {
    /// A pre-runtime digest carried this engine's tag but its payload did not
    /// decode to a known pre-digest variant.
    #[error("Invalid pre-digest: {0}")]
    InvalidPreDigest(String),

    /// An allowed-slots policy byte outside the known discriminants.
    #[error("Invalid allowed-slots policy: {0}")]
    InvalidAllowedSlots(String),

    /// A next-config descriptor with an unknown version tag or corrupt body.
    #[error("Invalid next-config descriptor: {0}")]
    InvalidNextConfigDescriptor(String),

    /// An epoch configuration rejected by governance validation.
    #[error("Invalid epoch configuration: {0}")]
    InvalidConfiguration(String),

    /// Storage backend failure (RocksDB, host state, overlay commit).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error outside the typed decode paths.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Cryptographic error (key parsing, VRF verification).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Invalid state transition or call ordering violation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A read-only query was issued before the required genesis state exists.
    #[error("Uninitialized: {0}")]
    Uninitialized(&'static str),
}

impl From<parity_scale_codec::Error> for CadenceError {
    fn from(e: parity_scale_codec::Error) -> Self {
        CadenceError::Codec(e.to_string())
    }
}

impl From<schnorrkel::SignatureError> for CadenceError {
    fn from(e: schnorrkel::SignatureError) -> Self {
        CadenceError::Crypto(e.to_string())
    }
}
