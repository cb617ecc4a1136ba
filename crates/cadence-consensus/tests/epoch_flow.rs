// crates/cadence-consensus/tests/epoch_flow.rs
//
// End-to-end tests for the epoch pipeline: genesis anchoring, per-block
// initialization and finalization with real VRF signatures, internally and
// externally triggered epoch changes, skipped-epoch bookkeeping, and the
// governance config-change flow.
//
// Blocks are driven the way a host would: one engine per block over a shared
// store, initialize -> finalize -> drain logs.

use cadence_consensus::{
    compute_randomness, epoch_index, EngineParams, EpochEngine, ExternalTrigger, GenesisAuthority,
    GenesisConfig, SameAuthoritiesForever,
};
use cadence_core::digests::{
    ConsensusLog, DigestItem, PreDigest, PrimaryPreDigest, SecondaryPlainPreDigest, VrfSignature,
};
use cadence_core::traits::{NoDisabledValidators, SessionIndexProvider};
use cadence_core::types::{AllowedSlots, AuthorityId, EpochConfiguration, NextConfigDescriptor, Slot};
use cadence_core::vrf::{make_transcript, AuthorRandomness};
use cadence_core::Randomness;
use cadence_store::{KvStore, MemStore};
use schnorrkel::{ExpansionMode, Keypair, MiniSecretKey};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn keypair_from_seed(seed: u8) -> Keypair {
    MiniSecretKey::from_bytes(&[seed; 32])
        .unwrap()
        .expand_to_keypair(ExpansionMode::Ed25519)
}

fn params(epoch_duration: u64) -> EngineParams {
    EngineParams { epoch_duration, ..Default::default() }
}

fn genesis_for(keypair: &Keypair) -> GenesisConfig {
    GenesisConfig {
        authorities: vec![GenesisAuthority {
            public_key: AuthorityId(keypair.public.to_bytes()).to_hex(),
            weight: 1,
        }],
        epoch_config: EpochConfiguration {
            c: (1, 4),
            allowed_slots: AllowedSlots::PrimaryAndSecondaryPlainSlots,
        },
    }
}

fn build_genesis(store: &mut MemStore, params: &EngineParams, genesis: &GenesisConfig) {
    let mut engine = EpochEngine::new(store, params.clone()).unwrap();
    engine.build_genesis(genesis).unwrap();
}

/// A primary slot claim signed against the given randomness and epoch index.
fn primary_claim(
    keypair: &Keypair,
    slot: u64,
    randomness: &Randomness,
    epoch_index: u64,
) -> DigestItem {
    let transcript = make_transcript(randomness, Slot::new(slot), epoch_index);
    let (inout, proof, _) = keypair.vrf_sign(transcript);
    DigestItem::cadence_pre_digest(&PreDigest::Primary(PrimaryPreDigest {
        authority_index: 0,
        slot: Slot::new(slot),
        vrf_signature: VrfSignature {
            pre_output: inout.to_output().to_bytes(),
            proof: proof.to_bytes(),
        },
    }))
}

fn secondary_claim(slot: u64) -> DigestItem {
    DigestItem::cadence_pre_digest(&PreDigest::SecondaryPlain(SecondaryPlainPreDigest {
        authority_index: 0,
        slot: Slot::new(slot),
    }))
}

/// The (randomness, epoch_index) pair finalization will verify the block's
/// VRF against. The author signs with the *post-transition* values when the
/// block itself rotates the epoch, so predict the rotation from the state
/// before the block.
fn signing_context(
    store: &mut MemStore,
    params: &EngineParams,
    now: u64,
    slot: u64,
) -> (Randomness, u64) {
    let engine = EpochEngine::new(store, params.clone()).unwrap();
    let genesis_slot = engine.genesis_slot().unwrap();
    if genesis_slot.get() == 0 {
        return (engine.randomness().unwrap(), engine.epoch_index().unwrap());
    }
    let epoch_start = engine.current_epoch_start().unwrap();
    let rotates = now != 1 && slot.saturating_sub(epoch_start.get()) >= params.epoch_duration;
    if rotates {
        (
            engine.next_randomness().unwrap(),
            epoch_index(Slot::new(slot), genesis_slot, params.epoch_duration),
        )
    } else {
        (engine.randomness().unwrap(), engine.epoch_index().unwrap())
    }
}

/// Run one block with an internally triggered engine. Returns the consensus
/// logs it deposited and the author-VRF randomness it derived.
fn run_block(
    store: &mut MemStore,
    params: &EngineParams,
    now: u64,
    digest: DigestItem,
) -> (Vec<ConsensusLog>, Option<AuthorRandomness>) {
    let mut engine = EpochEngine::new(store, params.clone()).unwrap();
    engine.initialize(now, &[digest], &SameAuthoritiesForever).unwrap();
    engine.on_finalize(&NoDisabledValidators).unwrap();
    let author_randomness = engine.author_vrf_randomness().unwrap();
    let logs = engine
        .drain_logs()
        .iter()
        .filter_map(DigestItem::as_consensus)
        .map(|(_, data)| ConsensusLog::from_bytes(data).unwrap())
        .collect();
    (logs, author_randomness)
}

fn next_epoch_data(logs: &[ConsensusLog]) -> Option<(Vec<(AuthorityId, u64)>, Randomness)> {
    logs.iter().find_map(|log| match log {
        ConsensusLog::NextEpochData(descriptor) => {
            Some((descriptor.authorities.clone(), descriptor.randomness))
        }
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Epoch lifecycle with primary (VRF) blocks
// ---------------------------------------------------------------------------

#[test]
fn test_primary_blocks_through_two_epoch_changes() {
    let keypair = keypair_from_seed(42);
    let params = params(3);
    let mut store = MemStore::new();
    build_genesis(&mut store, &params, &genesis_for(&keypair));

    // Epoch 0 spans slots [100, 103). Collect the per-block outputs as we go
    // to later recompute the reduction independently.
    let mut epoch0_outputs: Vec<AuthorRandomness> = Vec::new();

    // Block 1, slot 100: anchors the genesis slot and announces epoch 0 with
    // the genesis authorities and all-zero randomness.
    let (randomness, epoch) = signing_context(&mut store, &params, 1, 100);
    assert_eq!((randomness, epoch), ([0u8; 32], 0));
    let (logs, output) =
        run_block(&mut store, &params, 1, primary_claim(&keypair, 100, &randomness, epoch));
    let (authorities, announced) = next_epoch_data(&logs).expect("genesis announcement");
    assert_eq!(authorities, vec![(AuthorityId(keypair.public.to_bytes()), 1)]);
    assert_eq!(announced, [0u8; 32]);
    epoch0_outputs.push(output.expect("primary block derives randomness"));

    // Blocks 2 and 3 stay in epoch 0.
    for (now, slot) in [(2u64, 101u64), (3, 102)] {
        let (randomness, epoch) = signing_context(&mut store, &params, now, slot);
        assert_eq!(epoch, 0);
        let (logs, output) =
            run_block(&mut store, &params, now, primary_claim(&keypair, slot, &randomness, epoch));
        assert!(logs.is_empty());
        epoch0_outputs.push(output.unwrap());
    }

    // Block 4, slot 103: three slots elapsed, the epoch rotates.
    let (randomness, epoch) = signing_context(&mut store, &params, 4, 103);
    assert_eq!(epoch, 1);
    let (logs, _) =
        run_block(&mut store, &params, 4, primary_claim(&keypair, 103, &randomness, epoch));
    let (_, announced_for_epoch2) = next_epoch_data(&logs).expect("transition announcement");

    // The announced next-epoch randomness is the reduction over epoch 0's
    // three outputs, keyed by the epoch index the value is produced for.
    let expected = compute_randomness([0u8; 32], 2, epoch0_outputs.into_iter(), None);
    assert_eq!(announced_for_epoch2, expected);

    {
        let engine = EpochEngine::new(&mut store, params.clone()).unwrap();
        assert_eq!(engine.epoch_index().unwrap(), 1);
        assert_eq!(engine.current_epoch_start().unwrap(), Slot::new(103));
        assert_eq!(engine.epoch_start_blocks().unwrap().current, 4);
        // Epoch 1 still runs on the genesis-era randomness.
        assert_eq!(engine.randomness().unwrap(), [0u8; 32]);
        assert_eq!(engine.next_randomness().unwrap(), expected);
    }

    // Blocks 5 and 6 fill epoch 1; block 7 rotates again and the value fixed
    // at block 4 becomes the current epoch randomness.
    for (now, slot) in [(5u64, 104u64), (6, 105)] {
        let (randomness, epoch) = signing_context(&mut store, &params, now, slot);
        assert_eq!(epoch, 1);
        run_block(&mut store, &params, now, primary_claim(&keypair, slot, &randomness, epoch));
    }
    let (randomness, epoch) = signing_context(&mut store, &params, 7, 106);
    assert_eq!(epoch, 2);
    assert_eq!(randomness, expected);
    run_block(&mut store, &params, 7, primary_claim(&keypair, 106, &randomness, epoch));

    let engine = EpochEngine::new(&mut store, params.clone()).unwrap();
    assert_eq!(engine.epoch_index().unwrap(), 2);
    assert_eq!(engine.randomness().unwrap(), expected);
    let start_blocks = engine.epoch_start_blocks().unwrap();
    assert_eq!((start_blocks.previous, start_blocks.current), (4, 7));
}

#[test]
fn test_secondary_blocks_leave_randomness_untouched() {
    let keypair = keypair_from_seed(5);
    let params = params(4);
    let mut store = MemStore::new();
    build_genesis(&mut store, &params, &genesis_for(&keypair));

    let (logs, output) = run_block(&mut store, &params, 1, secondary_claim(100));
    assert!(next_epoch_data(&logs).is_some());
    assert_eq!(output, None);

    let (_, output) = run_block(&mut store, &params, 2, secondary_claim(101));
    assert_eq!(output, None);

    // No outputs were collected, so the next transition folds an empty rho.
    let (_, epoch) = signing_context(&mut store, &params, 3, 104);
    assert_eq!(epoch, 1);
    let (logs, _) = run_block(&mut store, &params, 3, secondary_claim(104));
    let (_, announced) = next_epoch_data(&logs).unwrap();
    assert_eq!(announced, compute_randomness([0u8; 32], 2, std::iter::empty(), None));
}

// ---------------------------------------------------------------------------
// Externally driven transitions and skipped epochs
// ---------------------------------------------------------------------------

/// Stand-in for the host's session component.
struct FixedSession(u32);

impl SessionIndexProvider for FixedSession {
    fn current_session_index(&self) -> u32 {
        self.0
    }
}

#[test]
fn test_external_trigger_with_skipped_epochs() {
    let keypair = keypair_from_seed(9);
    let params = params(3);
    let session = FixedSession(2);
    let mut store = MemStore::new();
    build_genesis(&mut store, &params, &genesis_for(&keypair));

    // Block 1 anchors genesis at slot 100; the external trigger never
    // rotates on its own.
    run_external_block(&mut store, &params, &session, 1, secondary_claim(100));
    run_external_block(&mut store, &params, &session, 2, secondary_claim(101));

    // Slot 112 falls in epoch 4: epochs 1 through 3 passed with no block.
    // The external driver notices the due change and enacts it, passing the
    // session index it is currently in.
    let mut engine = EpochEngine::new(&mut store, params.clone()).unwrap();
    engine.initialize(3, &[secondary_claim(112)], &ExternalTrigger).unwrap();
    assert!(engine.should_epoch_change(3).unwrap());
    let authorities = engine.authorities().unwrap();
    engine
        .enact_epoch_change(authorities.clone(), authorities, Some(session.current_session_index()))
        .unwrap();
    engine.on_finalize(&NoDisabledValidators).unwrap();

    assert_eq!(engine.epoch_index().unwrap(), 4);
    let skipped = engine.skipped_epochs().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!((skipped[0].epoch_index, skipped[0].session_index), (4, 2));
}

fn run_external_block(
    store: &mut MemStore,
    params: &EngineParams,
    session: &impl SessionIndexProvider,
    now: u64,
    digest: DigestItem,
) {
    let mut engine = EpochEngine::new(store, params.clone()).unwrap();
    engine.initialize(now, &[digest], &ExternalTrigger).unwrap();
    if engine.should_epoch_change(now).unwrap() {
        let authorities = engine.authorities().unwrap();
        engine
            .enact_epoch_change(
                authorities.clone(),
                authorities,
                Some(session.current_session_index()),
            )
            .unwrap();
    }
    engine.on_finalize(&NoDisabledValidators).unwrap();
}

// ---------------------------------------------------------------------------
// Governance: config changes land one epoch after announcement
// ---------------------------------------------------------------------------

#[test]
fn test_config_change_applies_one_epoch_after_enactment() {
    let keypair = keypair_from_seed(13);
    let params = params(3);
    let mut store = MemStore::new();
    build_genesis(&mut store, &params, &genesis_for(&keypair));

    run_block(&mut store, &params, 1, secondary_claim(100));

    // Governance plans the change somewhere mid-epoch.
    let new_config = EpochConfiguration {
        c: (3, 5),
        allowed_slots: AllowedSlots::PrimaryAndSecondaryVRFSlots,
    };
    {
        let mut engine = EpochEngine::new(&mut store, params.clone()).unwrap();
        engine.plan_config_change(NextConfigDescriptor::V1(new_config)).unwrap();
    }

    // First transition: announced, scheduled, but not yet live.
    let (logs, _) = run_block(&mut store, &params, 2, secondary_claim(103));
    assert!(logs.iter().any(|log| matches!(
        log,
        ConsensusLog::NextConfigData(NextConfigDescriptor::V1(config)) if *config == new_config
    )));
    {
        let engine = EpochEngine::new(&mut store, params.clone()).unwrap();
        assert_eq!(engine.configuration().unwrap().c, (1, 4));
        assert_eq!(engine.next_epoch().unwrap().config, new_config);
    }

    // Second transition: the scheduled config goes live.
    let (logs, _) = run_block(&mut store, &params, 3, secondary_claim(106));
    assert!(next_epoch_data(&logs).is_some());
    let engine = EpochEngine::new(&mut store, params.clone()).unwrap();
    assert_eq!(engine.configuration().unwrap(), new_config);
}

// ---------------------------------------------------------------------------
// Whole-block atomicity through the overlay
// ---------------------------------------------------------------------------

#[test]
fn test_failed_block_discards_cleanly_through_overlay() {
    let keypair = keypair_from_seed(21);
    let params = params(3);
    let mut store = MemStore::new();
    build_genesis(&mut store, &params, &genesis_for(&keypair));

    run_block(&mut store, &params, 1, secondary_claim(100));

    // A block whose tagged pre-digest is corrupt fails initialization; the
    // overlay is dropped and the backend keeps the pre-block state.
    {
        let mut overlay = cadence_store::Overlay::new(&mut store);
        let mut engine = EpochEngine::new(&mut overlay, params.clone()).unwrap();
        let bad = DigestItem::PreRuntime(cadence_core::ENGINE_ID, vec![0xde, 0xad]);
        assert!(engine.initialize(2, &[bad], &SameAuthoritiesForever).is_err());
        overlay.discard();
    }

    // A good block then commits through an overlay.
    {
        let mut overlay = cadence_store::Overlay::new(&mut store);
        let mut engine = EpochEngine::new(&mut overlay, params.clone()).unwrap();
        engine.initialize(2, &[secondary_claim(101)], &SameAuthoritiesForever).unwrap();
        engine.on_finalize(&NoDisabledValidators).unwrap();
        overlay.commit().unwrap();
    }

    let engine = EpochEngine::new(&mut store, params.clone()).unwrap();
    assert_eq!(engine.current_slot().unwrap(), Slot::new(101));
    // The failed block left no block-scoped residue behind.
    assert!(store.get(b"cadence:initialized").unwrap().is_none());
}
