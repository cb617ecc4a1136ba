// crates/cadence-consensus/src/randomness.rs
//
// The randomness accumulator: per-block VRF outputs are collected into
// bounded segments during the epoch, then folded by a deterministic hash
// reduction at the transition to become the next epoch's randomness.
//
// The reduction's byte layout is a wire-format contract:
// blake2b-256( last_epoch_randomness || epoch_index_le || output_0 || ... ).

use cadence_core::error::CadenceError;
use cadence_core::types::Randomness;
use cadence_core::vrf::{blake2_256, AuthorRandomness};
use cadence_core::{AUTHOR_RANDOMNESS_LENGTH, RANDOMNESS_LENGTH};
use cadence_store::KvStore;

use crate::engine::EpochEngine;

/// Maximum number of VRF outputs held in one under-construction segment.
///
/// A tradeoff between storage accesses and value length: once a segment
/// reaches this bound the next deposit opens a fresh one. All segments are
/// drained and the counter returns to zero at every epoch transition.
pub const UNDER_CONSTRUCTION_SEGMENT_LENGTH: u32 = 256;

/// Compute the randomness for a new epoch: a 256-bit hash over the previous
/// epoch's randomness, the new epoch index in little-endian, and every VRF
/// output collected during the prior epoch, in deposit order.
///
/// Pure and deterministic; `rho_size_hint` only pre-sizes the buffer.
pub fn compute_randomness(
    last_epoch_randomness: Randomness,
    epoch_index: u64,
    rho: impl Iterator<Item = AuthorRandomness>,
    rho_size_hint: Option<usize>,
) -> Randomness {
    let mut buf = Vec::with_capacity(
        RANDOMNESS_LENGTH + 8 + rho_size_hint.unwrap_or(0) * AUTHOR_RANDOMNESS_LENGTH,
    );
    buf.extend_from_slice(&last_epoch_randomness);
    buf.extend_from_slice(&epoch_index.to_le_bytes());
    for output in rho {
        buf.extend_from_slice(&output);
    }
    blake2_256(&buf)
}

impl<S: KvStore> EpochEngine<'_, S> {
    /// Append a per-block VRF output to the under-construction randomness.
    pub(crate) fn deposit_randomness(
        &mut self,
        output: AuthorRandomness,
    ) -> Result<(), CadenceError> {
        let segment_index = self.segment_index()?;
        let mut segment = self.under_construction_segment(segment_index)?;
        if (segment.len() as u32) < UNDER_CONSTRUCTION_SEGMENT_LENGTH {
            segment.push(output);
            self.set_under_construction_segment(segment_index, &segment)?;
        } else {
            // Current segment is full: the output opens the next one.
            let segment_index = segment_index + 1;
            self.set_under_construction_segment(segment_index, &[output])?;
            self.set_segment_index(segment_index)?;
        }
        Ok(())
    }

    /// Roll the randomness at an epoch change. Called exactly once per
    /// transition.
    ///
    /// The previously-fixed "next" value becomes current and is returned;
    /// every segment collected during the ending epoch (the final, partially
    /// filled one included) is drained and folded into the new "next" value.
    pub(crate) fn randomness_change_epoch(
        &mut self,
        next_epoch_index: u64,
    ) -> Result<Randomness, CadenceError> {
        let this_randomness = self.next_randomness()?;
        let segment_index = self.segment_index()?;
        self.set_segment_index(0)?;

        let mut outputs = Vec::new();
        for index in 0..=segment_index {
            outputs.extend(self.take_under_construction_segment(index)?);
        }

        // Overestimate to every segment being full.
        let rho_size_hint = (segment_index as usize + 1) * UNDER_CONSTRUCTION_SEGMENT_LENGTH as usize;
        let next_randomness = compute_randomness(
            this_randomness,
            next_epoch_index,
            outputs.into_iter(),
            Some(rho_size_hint),
        );
        self.set_next_randomness(&next_randomness)?;
        Ok(this_randomness)
    }
}
