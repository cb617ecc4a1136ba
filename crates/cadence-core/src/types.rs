// crates/cadence-core/src/types.rs
//
// Value types shared across the engine: slots, authorities, epoch snapshots,
// and the in-band descriptors announced through consensus logs.
//
// Everything that crosses the wire or lands in storage carries the SCALE
// codec derives; the byte layout (fixed-width little-endian integers, 1-byte
// discriminants, compact length prefixes) is a cross-implementation contract.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::CadenceError;

/// A monotonic wall-clock tick. At most one primary author per slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode,
)]
pub struct Slot(u64);

impl Slot {
    /// Wrap a raw slot number.
    pub const fn new(slot: u64) -> Self {
        Slot(slot)
    }

    /// The raw slot number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Slots elapsed since `other`, clamped at zero.
    pub fn saturating_sub(self, other: Slot) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl From<u64> for Slot {
    fn from(slot: u64) -> Self {
        Slot(slot)
    }
}

impl core::fmt::Display for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of an authority in the epoch's authority list.
pub type AuthorityIndex = u32;

/// Authority voting weight. Informational only: the engine never weighs
/// authorities against each other, it just carries the value through.
pub type AuthorityWeight = u64;

/// Epoch randomness: the output of the per-epoch hash reduction.
pub type Randomness = [u8; 32];

/// An sr25519 public key identifying a block-producing authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub struct AuthorityId(pub [u8; 32]);

impl AuthorityId {
    /// Parse an authority id from a hex string (with or without `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self, CadenceError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CadenceError::Codec(e.to_string()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CadenceError::Codec("authority key must be exactly 32 bytes".into()))?;
        Ok(AuthorityId(key))
    }

    /// Hex rendering of the key, `0x`-prefixed.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for AuthorityId {
    fn from(key: [u8; 32]) -> Self {
        AuthorityId(key)
    }
}

/// A block-producing authority: public key plus informational weight.
pub type Authority = (AuthorityId, AuthorityWeight);

/// Which slot-assignment strategies an epoch permits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize, Deserialize,
)]
pub enum AllowedSlots {
    /// Only primary (VRF lottery) slot claims are valid.
    PrimarySlots,
    /// Primary claims plus round-robin secondary claims without a VRF.
    PrimaryAndSecondaryPlainSlots,
    /// Primary claims plus round-robin secondary claims carrying a VRF.
    PrimaryAndSecondaryVRFSlots,
}

impl AllowedSlots {
    /// Whether this policy permits any form of secondary slot claim.
    pub fn allows_secondary(&self) -> bool {
        !matches!(self, AllowedSlots::PrimarySlots)
    }

    /// Decode from a raw discriminant byte sequence.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, CadenceError> {
        Self::decode(&mut bytes).map_err(|e| CadenceError::InvalidAllowedSlots(e.to_string()))
    }
}

/// The per-epoch leader-election parameters.
///
/// `c` is the rational threshold (numerator, denominator) governing the
/// probability that a slot has at least one primary leader. The denominator
/// must be non-zero by the time the configuration is consumed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize, Deserialize,
)]
pub struct EpochConfiguration {
    /// Primary slot threshold as a rational `numerator / denominator`.
    pub c: (u64, u64),
    /// Slot-assignment strategies permitted this epoch.
    pub allowed_slots: AllowedSlots,
}

/// A derived snapshot of one epoch. Never stored monolithically; assembled
/// on demand from the persisted pieces.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Epoch {
    /// Zero-based index of the epoch since genesis.
    pub epoch_index: u64,
    /// First slot of the epoch.
    pub start_slot: Slot,
    /// Epoch length in slots.
    pub duration: u64,
    /// The authority set governing the epoch.
    pub authorities: Vec<Authority>,
    /// The randomness fixed for the epoch.
    pub randomness: Randomness,
    /// Leader-election parameters for the epoch.
    pub config: EpochConfiguration,
}

/// In-band announcement of the upcoming epoch, deposited once at the block
/// where the epoch changes.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct NextEpochDescriptor {
    /// Authority set of the next epoch.
    pub authorities: Vec<Authority>,
    /// Randomness of the next epoch.
    pub randomness: Randomness,
}

/// Versioned announcement of an upcoming configuration change. Recorded via
/// the governance entry point, applied one epoch after being enacted.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum NextConfigDescriptor {
    /// Version 1.
    #[codec(index = 1)]
    V1(EpochConfiguration),
}

impl NextConfigDescriptor {
    /// Decode from bytes, surfacing unknown version tags as a typed error.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, CadenceError> {
        Self::decode(&mut bytes)
            .map_err(|e| CadenceError::InvalidNextConfigDescriptor(e.to_string()))
    }

    /// The configuration carried by this descriptor, independent of version.
    pub fn into_config(self) -> EpochConfiguration {
        match self {
            NextConfigDescriptor::V1(config) => config,
        }
    }
}

/// Bookkeeping entry for an epoch that passed with no blocks produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct SkippedEpoch {
    /// Index of the epoch that was skipped over.
    pub epoch_index: u64,
    /// Session in force when the skip was detected.
    pub session_index: u32,
}

/// Block numbers at which the previous and current epoch started.
///
/// Epochs are defined in slots, which may be skipped, so these do not in
/// general line up with `epoch_index * duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct EpochStartBlocks {
    /// First block of the previous epoch.
    pub previous: u64,
    /// First block of the current epoch.
    pub current: u64,
}
