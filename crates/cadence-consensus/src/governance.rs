// crates/cadence-consensus/src/governance.rs
//
// The governance entry point: planning an epoch configuration change.
// Origin checks (root, sudo, referenda) belong to the host; this module only
// validates the configuration itself and records it.

use cadence_core::error::CadenceError;
use cadence_core::types::{EpochConfiguration, NextConfigDescriptor};
use cadence_store::KvStore;

use crate::engine::EpochEngine;

impl<S: KvStore> EpochEngine<'_, S> {
    /// Plan an epoch configuration change.
    ///
    /// The change is recorded, announced at the next call to
    /// `enact_epoch_change`, and activated one epoch after that. Planning
    /// again before enactment replaces the previous plan.
    pub fn plan_config_change(
        &mut self,
        descriptor: NextConfigDescriptor,
    ) -> Result<(), CadenceError> {
        let NextConfigDescriptor::V1(config) = &descriptor;
        validate_epoch_configuration(config)?;
        self.set_pending_epoch_config_change(&descriptor)
    }
}

/// Validate a leader-election configuration.
///
/// The threshold `c = numerator / denominator` is the per-slot probability
/// of at least one primary leader, so it must be a probability: denominator
/// non-zero and numerator at most the denominator. A zero numerator means no
/// primary block is ever produced, which is only viable when secondary slots
/// can fill the gaps.
pub fn validate_epoch_configuration(config: &EpochConfiguration) -> Result<(), CadenceError> {
    let (numerator, denominator) = config.c;
    if denominator == 0 {
        return Err(CadenceError::InvalidConfiguration(
            "threshold denominator must be non-zero".into(),
        ));
    }
    if numerator > denominator {
        return Err(CadenceError::InvalidConfiguration(format!(
            "threshold {}/{} exceeds one",
            numerator, denominator
        )));
    }
    if numerator == 0 && !config.allowed_slots.allows_secondary() {
        return Err(CadenceError::InvalidConfiguration(
            "a zero primary-slot threshold requires secondary slots to be allowed".into(),
        ));
    }
    Ok(())
}
