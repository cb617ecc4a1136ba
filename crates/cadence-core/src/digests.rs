// crates/cadence-core/src/digests.rs
//
// The digest codec: pre-digest variants embedded in block headers by the
// authoring node, the consensus logs this engine deposits in response, and
// the generic digest-item wrapper both travel in.
//
// Discriminants are part of the wire contract and are pinned with explicit
// codec indices rather than relying on declaration order.

use parity_scale_codec::{Decode, Encode};

use crate::error::CadenceError;
use crate::types::{AuthorityIndex, NextConfigDescriptor, NextEpochDescriptor, Slot};
use crate::ENGINE_ID;

/// A VRF signature: the pre-output point plus the proof of correct
/// evaluation, both in compressed Ristretto form.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct VrfSignature {
    /// VRF pre-output.
    pub pre_output: [u8; 32],
    /// VRF proof.
    pub proof: [u8; 64],
}

/// A primary slot claim, won through the VRF lottery.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PrimaryPreDigest {
    /// Index of the claiming authority.
    pub authority_index: AuthorityIndex,
    /// The claimed slot.
    pub slot: Slot,
    /// The lottery VRF signature.
    pub vrf_signature: VrfSignature,
}

/// A secondary slot claim without a VRF output.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SecondaryPlainPreDigest {
    /// Index of the claiming authority.
    pub authority_index: AuthorityIndex,
    /// The claimed slot.
    pub slot: Slot,
}

/// A secondary slot claim carrying a VRF output.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SecondaryVRFPreDigest {
    /// Index of the claiming authority.
    pub authority_index: AuthorityIndex,
    /// The claimed slot.
    pub slot: Slot,
    /// The per-block VRF signature.
    pub vrf_signature: VrfSignature,
}

/// Per-block proof of which authority produced the block in which slot,
/// embedded as a pre-runtime digest before sealing. Exactly one admissible
/// per block.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum PreDigest {
    /// Primary (VRF lottery) claim.
    #[codec(index = 1)]
    Primary(PrimaryPreDigest),
    /// Secondary claim without VRF.
    #[codec(index = 2)]
    SecondaryPlain(SecondaryPlainPreDigest),
    /// Secondary claim with VRF.
    #[codec(index = 3)]
    SecondaryVRF(SecondaryVRFPreDigest),
}

impl PreDigest {
    /// Decode a pre-digest payload, surfacing unknown discriminants or a
    /// corrupt body as a typed error.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, CadenceError> {
        Self::decode(&mut bytes).map_err(|e| CadenceError::InvalidPreDigest(e.to_string()))
    }

    /// Index of the authority that produced the block.
    pub fn authority_index(&self) -> AuthorityIndex {
        match self {
            PreDigest::Primary(digest) => digest.authority_index,
            PreDigest::SecondaryPlain(digest) => digest.authority_index,
            PreDigest::SecondaryVRF(digest) => digest.authority_index,
        }
    }

    /// The slot this block claims.
    pub fn slot(&self) -> Slot {
        match self {
            PreDigest::Primary(digest) => digest.slot,
            PreDigest::SecondaryPlain(digest) => digest.slot,
            PreDigest::SecondaryVRF(digest) => digest.slot,
        }
    }

    /// Whether this is a primary slot claim.
    pub fn is_primary(&self) -> bool {
        matches!(self, PreDigest::Primary(_))
    }

    /// The VRF signature, if this claim carries one.
    pub fn vrf_signature(&self) -> Option<&VrfSignature> {
        match self {
            PreDigest::Primary(digest) => Some(&digest.vrf_signature),
            PreDigest::SecondaryPlain(_) => None,
            PreDigest::SecondaryVRF(digest) => Some(&digest.vrf_signature),
        }
    }
}

/// Consensus log payloads this engine deposits into block headers.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ConsensusLog {
    /// The epoch has changed; carries the authorities and randomness of the
    /// *next* epoch so external verifiers can track the handoff.
    #[codec(index = 1)]
    NextEpochData(NextEpochDescriptor),
    /// An authority was disabled and must stop authoring.
    #[codec(index = 2)]
    OnDisabled(AuthorityIndex),
    /// A configuration change was planned; applies one epoch after the next.
    #[codec(index = 3)]
    NextConfigData(NextConfigDescriptor),
}

impl ConsensusLog {
    /// Decode a consensus log payload.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, CadenceError> {
        Self::decode(&mut bytes).map_err(|e| CadenceError::Codec(e.to_string()))
    }
}

/// A generic header digest item. The engine only produces `PreRuntime` and
/// `Consensus` entries but must skip past the other kinds when scanning.
///
/// Codec indices match the host header format.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum DigestItem {
    /// Opaque payload owned by some other component.
    #[codec(index = 0)]
    Other(Vec<u8>),
    /// Engine-tagged message from the consensus engine to the outside world.
    #[codec(index = 4)]
    Consensus([u8; 4], Vec<u8>),
    /// Block seal, added after execution.
    #[codec(index = 5)]
    Seal([u8; 4], Vec<u8>),
    /// Engine-tagged message from the authoring node to the runtime,
    /// deposited before execution.
    #[codec(index = 6)]
    PreRuntime([u8; 4], Vec<u8>),
}

impl DigestItem {
    /// The engine tag and payload, if this is a pre-runtime item.
    pub fn as_pre_runtime(&self) -> Option<([u8; 4], &[u8])> {
        match self {
            DigestItem::PreRuntime(engine, data) => Some((*engine, data.as_slice())),
            _ => None,
        }
    }

    /// The engine tag and payload, if this is a consensus item.
    pub fn as_consensus(&self) -> Option<([u8; 4], &[u8])> {
        match self {
            DigestItem::Consensus(engine, data) => Some((*engine, data.as_slice())),
            _ => None,
        }
    }

    /// Wrap a pre-digest as a pre-runtime item under this engine's tag.
    pub fn cadence_pre_digest(pre_digest: &PreDigest) -> DigestItem {
        DigestItem::PreRuntime(ENGINE_ID, pre_digest.encode())
    }

    /// Wrap a consensus log as a consensus item under this engine's tag.
    pub fn cadence_consensus_log(log: &ConsensusLog) -> DigestItem {
        DigestItem::Consensus(ENGINE_ID, log.encode())
    }
}
