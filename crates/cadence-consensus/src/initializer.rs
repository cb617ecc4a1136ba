// crates/cadence-consensus/src/initializer.rs
//
// The per-block hooks: initialization before the block body runs, and
// finalization after it. Initialization extracts the pre-digest, anchors the
// genesis slot on the first block, updates the slot clock, and fires the
// epoch-change trigger; finalization resolves the author, derives the
// author-VRF randomness, and clears the block-scoped entries.

use cadence_core::digests::{ConsensusLog, DigestItem, PreDigest};
use cadence_core::error::CadenceError;
use cadence_core::traits::DisabledValidators;
use cadence_core::types::NextEpochDescriptor;
use cadence_core::vrf;
use cadence_core::ENGINE_ID;
use cadence_store::KvStore;

use crate::engine::EpochEngine;
use crate::trigger::EpochChangeTrigger;

impl<S: KvStore> EpochEngine<'_, S> {
    /// Per-block initialization. Idempotent: a second call for the same
    /// block (e.g. from a session collaborator that needs the slot synced
    /// before its own hook) is a no-op.
    ///
    /// A pre-runtime digest that carries this engine's tag but fails to
    /// decode fails the whole block.
    pub fn initialize<T: EpochChangeTrigger>(
        &mut self,
        now: u64,
        digests: &[DigestItem],
        trigger: &T,
    ) -> Result<(), CadenceError> {
        self.block_number = Some(now);
        if self.is_initialized()? {
            return Ok(());
        }

        let mut pre_digest = None;
        for item in digests {
            if let Some((engine, data)) = item.as_pre_runtime() {
                if engine == ENGINE_ID {
                    pre_digest = Some(PreDigest::from_bytes(data)?);
                    break;
                }
            }
        }

        if let Some(digest) = &pre_digest {
            // The first block carrying a slot claim is where epoch 0
            // actually starts: anchor the epoch clock there and announce
            // epoch 0 with the genesis authorities and randomness, since no
            // outputs have been collected yet.
            if self.genesis_slot()?.get() == 0 {
                self.set_genesis_slot(digest.slot())?;
                let descriptor = NextEpochDescriptor {
                    authorities: self.authorities()?,
                    randomness: self.randomness()?,
                };
                self.deposit_consensus_log(ConsensusLog::NextEpochData(descriptor));
            }

            let current_slot = digest.slot();
            let lateness = current_slot.get().saturating_sub(self.current_slot()?.get() + 1);
            self.set_lateness(lateness)?;
            self.set_current_slot(current_slot)?;
        }

        self.set_initialized(&pre_digest)?;

        // The sole entry point for transitions from ordinary block
        // production; the external trigger variant makes this a no-op.
        trigger.trigger(self, now);
        Ok(())
    }

    /// Per-block finalization.
    ///
    /// Runs after any epoch change of this block has been enacted, so a
    /// deposited VRF output always lands in the epoch it belongs to.
    pub fn on_finalize<D: DisabledValidators>(
        &mut self,
        disabled_validators: &D,
    ) -> Result<(), CadenceError> {
        if let Some(pre_digest) = self.take_initialized()? {
            let authority_index = pre_digest.authority_index();
            let authorities = self.authorities()?;
            let author = authorities.get(authority_index as usize).unwrap_or_else(|| {
                panic!(
                    "Pre-digest claims authority index {} but only {} authorities are active; \
                     the host imported a block that was never validated",
                    authority_index,
                    authorities.len()
                )
            });

            if disabled_validators.is_disabled(authority_index) {
                tracing::error!(
                    "Validator with index {} is disabled and should not be authoring blocks",
                    authority_index
                );
            }

            let author_randomness = match pre_digest.vrf_signature() {
                Some(signature) => {
                    let transcript = vrf::make_transcript(
                        &self.randomness()?,
                        self.current_slot()?,
                        self.epoch_index()?,
                    );
                    let randomness = vrf::author_vrf_randomness(&author.0, signature, transcript)?;
                    // Only primary outputs feed the epoch randomness;
                    // secondary-VRF outputs are exposed but not accumulated.
                    if pre_digest.is_primary() {
                        self.deposit_randomness(randomness)?;
                    }
                    Some(randomness)
                }
                None => None,
            };
            self.set_author_vrf_randomness(&author_randomness)?;
        }

        self.clear_lateness()?;
        Ok(())
    }

    /// The wall-clock length of one slot, in milliseconds: twice the minimum
    /// block period, so each author can always propose within the majority
    /// of its slot.
    pub fn slot_duration(&self) -> u64 {
        self.params().minimum_period_ms.saturating_mul(2)
    }

    /// Consistency check run when the block's timestamp is set. A zero slot
    /// duration or a timestamp disagreeing with the claimed slot means the
    /// chain spec and the authoring nodes have diverged; halt.
    pub fn on_timestamp_set(&self, moment_ms: u64) -> Result<(), CadenceError> {
        let slot_duration = self.slot_duration();
        assert!(slot_duration != 0, "Cadence slot duration cannot be zero");

        let timestamp_slot = moment_ms / slot_duration;
        let current_slot = self.current_slot()?;
        assert!(
            current_slot.get() == timestamp_slot,
            "Timestamp slot must match the slot claimed by the pre-digest \
             (claimed {}, timestamp implies {})",
            current_slot,
            timestamp_slot
        );
        Ok(())
    }
}
