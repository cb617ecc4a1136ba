// crates/cadence-consensus/src/author.rs

use cadence_core::digests::{DigestItem, PreDigest};
use cadence_core::error::CadenceError;
use cadence_core::types::AuthorityIndex;
use cadence_core::ENGINE_ID;

/// Resolve the index of the authority that produced a block from its digest
/// set.
///
/// Returns `None` when no digest carries this engine's tag; a tagged digest
/// that fails to decode propagates the error.
pub fn find_author(digests: &[DigestItem]) -> Result<Option<AuthorityIndex>, CadenceError> {
    for item in digests {
        if let Some((engine, data)) = item.as_pre_runtime() {
            if engine == ENGINE_ID {
                let pre_digest = PreDigest::from_bytes(data)?;
                return Ok(Some(pre_digest.authority_index()));
            }
        }
    }
    Ok(None)
}
