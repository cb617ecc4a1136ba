// crates/cadence-consensus/src/engine.rs
//
// The epoch engine: a per-block view over the module's persisted state.
//
// The engine holds no epoch state in memory beyond the static parameters and
// the block-scoped context (block number, emitted logs); every other value
// lives under a namespaced key in the injected store. Hosts construct one
// engine per block, run the hooks, drain the emitted logs, and commit.
//
// Key layout: `cadence:{item}` for single values and
// `cadence:under_construction:{segment}` for the randomness segments.

use cadence_core::digests::{ConsensusLog, DigestItem, PreDigest};
use cadence_core::error::CadenceError;
use cadence_core::types::{
    Authority, AuthorityId, AuthorityIndex, EpochConfiguration, EpochStartBlocks,
    NextConfigDescriptor, Randomness, SkippedEpoch, Slot,
};
use cadence_core::vrf::AuthorRandomness;
use cadence_store::{KvStore, KvStoreExt};

use crate::config::{EngineParams, GenesisConfig};
use crate::governance::validate_epoch_configuration;

const KEY_EPOCH_INDEX: &[u8] = b"cadence:epoch_index";
const KEY_AUTHORITIES: &[u8] = b"cadence:authorities";
const KEY_NEXT_AUTHORITIES: &[u8] = b"cadence:next_authorities";
const KEY_GENESIS_SLOT: &[u8] = b"cadence:genesis_slot";
const KEY_CURRENT_SLOT: &[u8] = b"cadence:current_slot";
const KEY_RANDOMNESS: &[u8] = b"cadence:randomness";
const KEY_NEXT_RANDOMNESS: &[u8] = b"cadence:next_randomness";
const KEY_SEGMENT_INDEX: &[u8] = b"cadence:segment_index";
const KEY_INITIALIZED: &[u8] = b"cadence:initialized";
const KEY_AUTHOR_VRF_RANDOMNESS: &[u8] = b"cadence:author_vrf_randomness";
const KEY_EPOCH_START: &[u8] = b"cadence:epoch_start";
const KEY_LATENESS: &[u8] = b"cadence:lateness";
const KEY_EPOCH_CONFIG: &[u8] = b"cadence:epoch_config";
const KEY_NEXT_EPOCH_CONFIG: &[u8] = b"cadence:next_epoch_config";
const KEY_PENDING_EPOCH_CONFIG_CHANGE: &[u8] = b"cadence:pending_epoch_config_change";
const KEY_SKIPPED_EPOCHS: &[u8] = b"cadence:skipped_epochs";

fn segment_key(index: u32) -> Vec<u8> {
    format!("cadence:under_construction:{}", index).into_bytes()
}

/// Per-block handle over the engine's persisted state.
pub struct EpochEngine<'a, S: KvStore> {
    pub(crate) store: &'a mut S,
    pub(crate) params: EngineParams,
    pub(crate) block_number: Option<u64>,
    pub(crate) logs: Vec<DigestItem>,
}

impl<'a, S: KvStore> EpochEngine<'a, S> {
    /// Create an engine over `store` with the given parameters.
    pub fn new(store: &'a mut S, params: EngineParams) -> Result<Self, CadenceError> {
        params.validate()?;
        Ok(Self { store, params, block_number: None, logs: Vec::new() })
    }

    /// The static parameters this engine runs with.
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Seed genesis state: segment counter, authorities, and the epoch
    /// configuration. Runs once, before the first block.
    pub fn build_genesis(&mut self, genesis: &GenesisConfig) -> Result<(), CadenceError> {
        validate_epoch_configuration(&genesis.epoch_config)?;
        self.set_segment_index(0)?;
        let authorities = genesis.parsed_authorities()?;
        self.initialize_authorities(&authorities)?;
        self.set_epoch_config(&genesis.epoch_config)?;
        Ok(())
    }

    /// Seed the genesis authority set.
    ///
    /// A session collaborator may call this instead of `build_genesis`
    /// carrying the set; seeding twice is an error unless the set is empty.
    pub fn initialize_authorities(&mut self, authorities: &[Authority]) -> Result<(), CadenceError> {
        if authorities.is_empty() {
            return Ok(());
        }
        if !self.authorities()?.is_empty() {
            return Err(CadenceError::InvalidState(
                "authorities are already initialized".into(),
            ));
        }
        if authorities.len() as u32 > self.params.max_authorities {
            tracing::warn!(
                "Genesis has {} authorities, more than the expected maximum of {}",
                authorities.len(),
                self.params.max_authorities
            );
        }
        self.set_authorities(authorities)?;
        self.set_next_authorities(authorities)?;
        Ok(())
    }

    /// Record that the validator at `index` was disabled, so downstream
    /// observers stop accepting its blocks.
    pub fn note_disabled(&mut self, index: AuthorityIndex) {
        self.deposit_consensus_log(ConsensusLog::OnDisabled(index));
    }

    /// Append a consensus log to this block's emission list.
    ///
    /// Logs are emitted in call order, which external verifiers replay in
    /// sequence relative to the storage writes of the same block.
    pub(crate) fn deposit_consensus_log(&mut self, log: ConsensusLog) {
        self.logs.push(DigestItem::cadence_consensus_log(&log));
    }

    /// The digest items deposited so far in this block, in emission order.
    pub fn logs(&self) -> &[DigestItem] {
        &self.logs
    }

    /// Drain the deposited digest items for inclusion in the block header.
    pub fn drain_logs(&mut self) -> Vec<DigestItem> {
        std::mem::take(&mut self.logs)
    }

    /// The block number this engine was initialized for.
    pub(crate) fn current_block_number(&self) -> Result<u64, CadenceError> {
        self.block_number.ok_or_else(|| {
            CadenceError::InvalidState(
                "per-block initialization must run before epoch transitions".into(),
            )
        })
    }

    // --- typed state accessors -------------------------------------------

    /// Index of the current epoch.
    pub fn epoch_index(&self) -> Result<u64, CadenceError> {
        self.store.get_or_default(KEY_EPOCH_INDEX)
    }

    pub(crate) fn set_epoch_index(&mut self, index: u64) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_EPOCH_INDEX, &index)
    }

    /// The current epoch's authority set.
    pub fn authorities(&self) -> Result<Vec<Authority>, CadenceError> {
        self.store.get_or_default(KEY_AUTHORITIES)
    }

    pub(crate) fn set_authorities(&mut self, authorities: &[Authority]) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_AUTHORITIES, &authorities.to_vec())
    }

    /// The next epoch's authority set.
    pub fn next_authorities(&self) -> Result<Vec<Authority>, CadenceError> {
        self.store.get_or_default(KEY_NEXT_AUTHORITIES)
    }

    pub(crate) fn set_next_authorities(
        &mut self,
        authorities: &[Authority],
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_NEXT_AUTHORITIES, &authorities.to_vec())
    }

    /// The slot at which the first epoch actually started. Zero until the
    /// first block of the chain.
    pub fn genesis_slot(&self) -> Result<Slot, CadenceError> {
        self.store.get_or_default(KEY_GENESIS_SLOT)
    }

    /// Like [`Self::genesis_slot`], but fails explicitly before the first
    /// block instead of handing out a zero anchor.
    pub(crate) fn initialized_genesis_slot(&self) -> Result<Slot, CadenceError> {
        let genesis_slot = self.genesis_slot()?;
        if genesis_slot.get() == 0 {
            return Err(CadenceError::Uninitialized("genesis slot"));
        }
        Ok(genesis_slot)
    }

    pub(crate) fn set_genesis_slot(&mut self, slot: Slot) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_GENESIS_SLOT, &slot)
    }

    /// The slot claimed by the block currently executing.
    pub fn current_slot(&self) -> Result<Slot, CadenceError> {
        self.store.get_or_default(KEY_CURRENT_SLOT)
    }

    pub(crate) fn set_current_slot(&mut self, slot: Slot) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_CURRENT_SLOT, &slot)
    }

    /// The epoch randomness for the current epoch.
    ///
    /// Public like everything else on chain, and influenceable by the last
    /// author of an epoch in the short term; fine for protocols that only
    /// need a value no single adversary could have chosen.
    pub fn randomness(&self) -> Result<Randomness, CadenceError> {
        self.store.get_or_default(KEY_RANDOMNESS)
    }

    pub(crate) fn set_randomness(&mut self, randomness: &Randomness) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_RANDOMNESS, randomness)
    }

    /// The randomness for the next epoch, already fixed by the reduction at
    /// the last transition.
    pub fn next_randomness(&self) -> Result<Randomness, CadenceError> {
        self.store.get_or_default(KEY_NEXT_RANDOMNESS)
    }

    pub(crate) fn set_next_randomness(
        &mut self,
        randomness: &Randomness,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_NEXT_RANDOMNESS, randomness)
    }

    /// Index of the under-construction segment currently being filled.
    pub(crate) fn segment_index(&self) -> Result<u32, CadenceError> {
        self.store.get_or_default(KEY_SEGMENT_INDEX)
    }

    pub(crate) fn set_segment_index(&mut self, index: u32) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_SEGMENT_INDEX, &index)
    }

    pub(crate) fn under_construction_segment(
        &self,
        index: u32,
    ) -> Result<Vec<AuthorRandomness>, CadenceError> {
        self.store.get_or_default(&segment_key(index))
    }

    pub(crate) fn set_under_construction_segment(
        &mut self,
        index: u32,
        segment: &[AuthorRandomness],
    ) -> Result<(), CadenceError> {
        self.store.put_typed(&segment_key(index), &segment.to_vec())
    }

    pub(crate) fn take_under_construction_segment(
        &mut self,
        index: u32,
    ) -> Result<Vec<AuthorRandomness>, CadenceError> {
        Ok(self
            .store
            .take_typed::<Vec<AuthorRandomness>>(&segment_key(index))?
            .unwrap_or_default())
    }

    /// Whether per-block initialization already ran for this block.
    pub(crate) fn is_initialized(&self) -> Result<bool, CadenceError> {
        Ok(self.store.get(KEY_INITIALIZED)?.is_some())
    }

    pub(crate) fn set_initialized(
        &mut self,
        pre_digest: &Option<PreDigest>,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_INITIALIZED, pre_digest)
    }

    pub(crate) fn take_initialized(&mut self) -> Result<Option<PreDigest>, CadenceError> {
        Ok(self
            .store
            .take_typed::<Option<PreDigest>>(KEY_INITIALIZED)?
            .flatten())
    }

    /// Randomness derived from the VRF output of the block author, when the
    /// pre-digest carried one. Populated at finalization.
    pub fn author_vrf_randomness(&self) -> Result<Option<AuthorRandomness>, CadenceError> {
        self.store.get_or_default(KEY_AUTHOR_VRF_RANDOMNESS)
    }

    pub(crate) fn set_author_vrf_randomness(
        &mut self,
        randomness: &Option<AuthorRandomness>,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_AUTHOR_VRF_RANDOMNESS, randomness)
    }

    /// Block numbers at which the previous and current epoch started.
    pub fn epoch_start_blocks(&self) -> Result<EpochStartBlocks, CadenceError> {
        self.store.get_or_default(KEY_EPOCH_START)
    }

    pub(crate) fn set_epoch_start_blocks(
        &mut self,
        blocks: EpochStartBlocks,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_EPOCH_START, &blocks)
    }

    /// How late the current block is compared to its parent, in slots.
    /// Zero outside block execution.
    pub fn lateness(&self) -> Result<u64, CadenceError> {
        self.store.get_or_default(KEY_LATENESS)
    }

    pub(crate) fn set_lateness(&mut self, lateness: u64) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_LATENESS, &lateness)
    }

    pub(crate) fn clear_lateness(&mut self) -> Result<(), CadenceError> {
        self.store.delete(KEY_LATENESS)
    }

    pub(crate) fn epoch_config(&self) -> Result<Option<EpochConfiguration>, CadenceError> {
        self.store.get_typed(KEY_EPOCH_CONFIG)
    }

    pub(crate) fn set_epoch_config(
        &mut self,
        config: &EpochConfiguration,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_EPOCH_CONFIG, config)
    }

    pub(crate) fn next_epoch_config(&self) -> Result<Option<EpochConfiguration>, CadenceError> {
        self.store.get_typed(KEY_NEXT_EPOCH_CONFIG)
    }

    pub(crate) fn set_next_epoch_config(
        &mut self,
        config: &EpochConfiguration,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_NEXT_EPOCH_CONFIG, config)
    }

    /// The configuration change planned through governance, if any.
    pub fn pending_epoch_config_change(
        &self,
    ) -> Result<Option<NextConfigDescriptor>, CadenceError> {
        self.store.get_typed(KEY_PENDING_EPOCH_CONFIG_CHANGE)
    }

    pub(crate) fn set_pending_epoch_config_change(
        &mut self,
        descriptor: &NextConfigDescriptor,
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_PENDING_EPOCH_CONFIG_CHANGE, descriptor)
    }

    pub(crate) fn take_pending_epoch_config_change(
        &mut self,
    ) -> Result<Option<NextConfigDescriptor>, CadenceError> {
        self.store.take_typed(KEY_PENDING_EPOCH_CONFIG_CHANGE)
    }

    /// Epochs that passed with no block, newest last.
    pub fn skipped_epochs(&self) -> Result<Vec<SkippedEpoch>, CadenceError> {
        self.store.get_or_default(KEY_SKIPPED_EPOCHS)
    }

    pub(crate) fn set_skipped_epochs(
        &mut self,
        skipped: &[SkippedEpoch],
    ) -> Result<(), CadenceError> {
        self.store.put_typed(KEY_SKIPPED_EPOCHS, &skipped.to_vec())
    }

    /// Whether `authority_id` is part of the current authority set.
    pub fn is_member(&self, authority_id: &AuthorityId) -> Result<bool, CadenceError> {
        Ok(self.authorities()?.iter().any(|(id, _)| id == authority_id))
    }
}
