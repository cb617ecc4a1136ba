// crates/cadence-consensus/src/trigger.rs
//
// Pluggable policy for how epoch transitions get driven. The trigger runs on
// every block, right after per-block initialization.

use cadence_store::KvStore;

use crate::engine::EpochEngine;

/// Decides whether and how an epoch change is invoked each block.
pub trait EpochChangeTrigger {
    /// May trigger an epoch change, if one is due. Called once per block,
    /// after initialization is done.
    fn trigger<S: KvStore>(&self, engine: &mut EpochEngine<'_, S>, now: u64);
}

/// A trigger for hosts where an external collaborator (typically the
/// validator-set manager) drives `enact_epoch_change` directly.
pub struct ExternalTrigger;

impl EpochChangeTrigger for ExternalTrigger {
    fn trigger<S: KvStore>(&self, _engine: &mut EpochEngine<'_, S>, _now: u64) {
        // Nothing: the transition is driven externally.
    }
}

/// A trigger that rotates epochs internally, recycling the same authority
/// set forever. Only for hosts where no other component manages the set.
pub struct SameAuthoritiesForever;

impl EpochChangeTrigger for SameAuthoritiesForever {
    fn trigger<S: KvStore>(&self, engine: &mut EpochEngine<'_, S>, now: u64) {
        // A storage hiccup here skips this block's attempt; the next block
        // retries. It must not fail the block.
        match engine.should_epoch_change(now) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::warn!("Could not determine whether the epoch should change: {}", e);
                return;
            }
        }

        let authorities = match engine.authorities() {
            Ok(authorities) => authorities,
            Err(e) => {
                tracing::warn!("Could not fetch the current authorities: {}; skipping epoch change", e);
                return;
            }
        };
        let next_authorities = authorities.clone();

        if let Err(e) = engine.enact_epoch_change(authorities, next_authorities, None) {
            tracing::warn!("Epoch change failed: {}; retrying next block", e);
        }
    }
}
