// crates/cadence-core/src/lib.rs
//
// cadence-core: value types, digest codec, consensus logs, errors, and VRF
// primitives for the Cadence slot-leader-election engine.
//
// Everything here is pure data plus stateless crypto helpers. The stateful
// epoch machinery lives in cadence-consensus; persistence in cadence-store.

pub mod digests;
pub mod error;
pub mod traits;
pub mod types;
pub mod vrf;

pub use digests::{ConsensusLog, DigestItem, PreDigest, VrfSignature};
pub use error::CadenceError;
pub use vrf::AuthorRandomness;
pub use types::{
    AllowedSlots, Authority, AuthorityId, AuthorityIndex, AuthorityWeight, Epoch,
    EpochConfiguration, EpochStartBlocks, NextConfigDescriptor, NextEpochDescriptor, Randomness,
    SkippedEpoch, Slot,
};

/// The 4-byte engine tag identifying this engine's pre-runtime digests and
/// consensus logs. Untagged digests are ignored.
pub const ENGINE_ID: [u8; 4] = *b"BABE";

/// Length in bytes of an epoch randomness value.
pub const RANDOMNESS_LENGTH: usize = 32;

/// Length in bytes of a VRF pre-output.
pub const VRF_OUTPUT_LENGTH: usize = 32;

/// Length in bytes of a VRF proof.
pub const VRF_PROOF_LENGTH: usize = 64;

/// Length in bytes of an sr25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length in bytes of the per-block randomness derived from the author's VRF.
pub const AUTHOR_RANDOMNESS_LENGTH: usize = 16;
