// crates/cadence-consensus/src/epochs.rs
//
// The epoch transition state machine.
//
// Epochs are defined in slots, not blocks: an epoch ends when enough slots
// have elapsed since its start, whether or not blocks filled them. The
// transition is an atomic handoff of authorities, randomness, and
// configuration, announced in-band through a NextEpochData log.

use cadence_core::digests::ConsensusLog;
use cadence_core::error::CadenceError;
use cadence_core::types::{
    Authority, Epoch, EpochConfiguration, NextEpochDescriptor, SkippedEpoch, Slot,
};
use cadence_store::KvStore;

use crate::engine::EpochEngine;

/// Ring-buffer bound on the skipped-epoch bookkeeping.
const SKIPPED_EPOCHS_BOUND: usize = 100;

const SLOT_PROOF: &str =
    "slot numbers are u64 and relate to wall-clock time; \
     if u64 is not enough the only safe option is to halt";

/// The epoch a slot falls in, given the chain's genesis slot and the epoch
/// duration. Slots before genesis count as epoch 0.
pub fn epoch_index(slot: Slot, genesis_slot: Slot, epoch_duration: u64) -> u64 {
    debug_assert!(epoch_duration != 0);
    slot.saturating_sub(genesis_slot) / epoch_duration
}

/// The first slot of the epoch at `index`.
///
/// Halts on u64 overflow: a slot clock that far gone cannot be recovered
/// from within the state-transition function.
pub fn epoch_start_slot(index: u64, genesis_slot: Slot, epoch_duration: u64) -> Slot {
    let start = index.checked_mul(epoch_duration).expect(SLOT_PROOF);
    Slot::new(start.checked_add(genesis_slot.get()).expect(SLOT_PROOF))
}

impl<S: KvStore> EpochEngine<'_, S> {
    /// Determine whether an epoch change should take place at this block.
    /// Assumes that per-block initialization has already run.
    pub fn should_epoch_change(&self, now: u64) -> Result<bool, CadenceError> {
        // The epoch has technically ended during the passage of time between
        // this block and the last, but it can only be "ended" now, at the
        // first block that observes it.
        //
        // The exception is block 1: the genesis block has slot 0, so epoch 0
        // is treated as starting at the slot of block 1, keeping the genesis
        // authorities and randomness in force.
        if now == 1 {
            return Ok(false);
        }
        let elapsed = self.current_slot()?.saturating_sub(self.current_epoch_start()?);
        Ok(elapsed >= self.params.epoch_duration)
    }

    /// First slot of the current epoch. Only meaningful after the first
    /// block anchored the genesis slot.
    pub fn current_epoch_start(&self) -> Result<Slot, CadenceError> {
        let genesis_slot = self.initialized_genesis_slot()?;
        Ok(epoch_start_slot(self.epoch_index()?, genesis_slot, self.params.epoch_duration))
    }

    /// Enact an epoch change.
    ///
    /// Must run after per-block initialization, at most once per transition;
    /// callers gate on [`Self::should_epoch_change`] first. Typically driven
    /// by a higher-level validator-set manager through the external trigger,
    /// with `session_index` supplied for skipped-epoch bookkeeping.
    pub fn enact_epoch_change(
        &mut self,
        authorities: Vec<Authority>,
        next_authorities: Vec<Authority>,
        session_index: Option<u32>,
    ) -> Result<(), CadenceError> {
        // An empty set would brick block production; refuse the handoff
        // without failing the block.
        if authorities.is_empty() {
            tracing::warn!("Ignoring epoch change with an empty authority set");
            return Ok(());
        }
        if authorities.len() as u32 > self.params.max_authorities
            || next_authorities.len() as u32 > self.params.max_authorities
        {
            tracing::warn!(
                "Epoch change carries more authorities than the expected maximum of {}",
                self.params.max_authorities
            );
        }

        let block_number = self.current_block_number()?;
        let genesis_slot = self.initialized_genesis_slot()?;
        let new_epoch_index =
            epoch_index(self.current_slot()?, genesis_slot, self.params.epoch_duration);
        let stored_epoch_index = self.epoch_index()?;

        if stored_epoch_index.saturating_add(1) != new_epoch_index {
            // At least one epoch passed with no block produced. Remember
            // which session the chain was in when the skip was detected, so
            // historical proofs can still be mapped to their session.
            tracing::warn!(
                "Detected {} skipped epoch(s), resuming from epoch {}",
                new_epoch_index.saturating_sub(stored_epoch_index.saturating_add(1)),
                new_epoch_index
            );
            if let Some(session_index) = session_index {
                self.note_skipped_epoch(new_epoch_index, session_index)?;
            }
        }

        self.set_epoch_index(new_epoch_index)?;
        self.set_authorities(&authorities)?;

        let next_epoch_index = new_epoch_index
            .checked_add(1)
            .expect("epoch index increments once per epoch; overflowing u64 means a corrupt slot clock");

        // Returns the randomness for the new current epoch and fixes the
        // next epoch's value from the outputs collected so far.
        let randomness = self.randomness_change_epoch(next_epoch_index)?;
        self.set_randomness(&randomness)?;
        self.set_next_authorities(&next_authorities)?;

        let mut epoch_start = self.epoch_start_blocks()?;
        epoch_start.previous = epoch_start.current;
        epoch_start.current = block_number;
        self.set_epoch_start_blocks(epoch_start)?;

        // With the current epoch updated, signal the *next* epoch so
        // observers can track the handoff.
        let next_randomness = self.next_randomness()?;
        self.deposit_consensus_log(ConsensusLog::NextEpochData(NextEpochDescriptor {
            authorities: next_authorities,
            randomness: next_randomness,
        }));

        if let Some(next_config) = self.next_epoch_config()? {
            self.set_epoch_config(&next_config)?;
        }

        if let Some(pending) = self.take_pending_epoch_config_change()? {
            self.set_next_epoch_config(&pending.clone().into_config())?;
            self.deposit_consensus_log(ConsensusLog::NextConfigData(pending));
        }

        Ok(())
    }

    /// Append to the skipped-epoch ring, evicting the oldest entry past the
    /// bound. A session index from before the skipped epoch means the view
    /// is stale; the whole update is abandoned rather than recorded wrong.
    fn note_skipped_epoch(
        &mut self,
        epoch_index: u64,
        session_index: u32,
    ) -> Result<(), CadenceError> {
        if epoch_index < session_index as u64 {
            tracing::warn!(
                "Epoch index {} is lower than session index {}; not recording the skipped epoch",
                epoch_index,
                session_index
            );
            return Ok(());
        }
        let mut skipped = self.skipped_epochs()?;
        if skipped.len() >= SKIPPED_EPOCHS_BOUND {
            skipped.remove(0);
        }
        skipped.push(SkippedEpoch { epoch_index, session_index });
        self.set_skipped_epochs(&skipped)
    }

    /// The leader-election configuration of the current epoch.
    pub fn configuration(&self) -> Result<EpochConfiguration, CadenceError> {
        self.epoch_config()?
            .ok_or(CadenceError::Uninitialized("epoch configuration"))
    }

    /// A snapshot of the current epoch.
    pub fn current_epoch(&self) -> Result<Epoch, CadenceError> {
        Ok(Epoch {
            epoch_index: self.epoch_index()?,
            start_slot: self.current_epoch_start()?,
            duration: self.params.epoch_duration,
            authorities: self.authorities()?,
            randomness: self.randomness()?,
            config: self.configuration()?,
        })
    }

    /// A snapshot of the next epoch, as already announced.
    pub fn next_epoch(&self) -> Result<Epoch, CadenceError> {
        let next_epoch_index = self
            .epoch_index()?
            .checked_add(1)
            .expect("epoch index increments once per epoch; overflowing u64 means a corrupt slot clock");
        let genesis_slot = self.initialized_genesis_slot()?;
        let config = match self.next_epoch_config()? {
            Some(config) => config,
            None => self.configuration()?,
        };
        Ok(Epoch {
            epoch_index: next_epoch_index,
            start_slot: epoch_start_slot(next_epoch_index, genesis_slot, self.params.epoch_duration),
            duration: self.params.epoch_duration,
            authorities: self.next_authorities()?,
            randomness: self.next_randomness()?,
            config,
        })
    }

    /// Best-guess block number of the next epoch change.
    ///
    /// Accurate only if no slots are missed; with missed slots the slot
    /// number grows while the block number does not, so this is an upper
    /// bound. `None` if the prediction lands in the past.
    pub fn next_expected_epoch_change(&self, now: u64) -> Result<Option<u64>, CadenceError> {
        let next_slot = self
            .current_epoch_start()?
            .get()
            .saturating_add(self.params.epoch_duration);
        Ok(next_slot
            .checked_sub(self.current_slot()?.get())
            .map(|slots_remaining| now.saturating_add(slots_remaining)))
    }
}
