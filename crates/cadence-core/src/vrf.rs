// crates/cadence-core/src/vrf.rs
//
// VRF transcript construction and per-block randomness derivation.
//
// The transcript layout and the expansion context are wire-format contracts:
// an authoring node and every verifying implementation must derive the same
// bytes from the same (randomness, slot, epoch) triple.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use merlin::Transcript;
use schnorrkel::vrf::{VRFOutput, VRFProof};
use schnorrkel::PublicKey;

use crate::digests::VrfSignature;
use crate::error::CadenceError;
use crate::types::{AuthorityId, Randomness, Slot};
use crate::AUTHOR_RANDOMNESS_LENGTH;

/// Contextual label used when expanding a VRF in/out pair into per-block
/// randomness.
pub const RANDOMNESS_VRF_CONTEXT: &[u8] = b"BabeVRFInOutContext";

/// Per-block randomness derived from the author's VRF output.
pub type AuthorRandomness = [u8; AUTHOR_RANDOMNESS_LENGTH];

/// Build the VRF signing/verification transcript for a slot claim.
pub fn make_transcript(randomness: &Randomness, slot: Slot, epoch_index: u64) -> Transcript {
    let mut transcript = Transcript::new(b"BABE");
    transcript.append_u64(b"slot number", slot.get());
    transcript.append_u64(b"current epoch", epoch_index);
    transcript.append_message(b"chain randomness", &randomness[..]);
    transcript
}

/// Verify a block author's VRF signature against the claimed public key and
/// derive the per-block randomness from the verified in/out pair.
///
/// Fails with a `Crypto` error if the key does not parse, the pre-output or
/// proof are malformed, or the proof does not verify for this transcript.
pub fn author_vrf_randomness(
    authority: &AuthorityId,
    signature: &VrfSignature,
    transcript: Transcript,
) -> Result<AuthorRandomness, CadenceError> {
    let public = PublicKey::from_bytes(&authority.0)?;
    let pre_output = VRFOutput::from_bytes(&signature.pre_output)?;
    let proof = VRFProof::from_bytes(&signature.proof)?;
    let (inout, _) = public.vrf_verify(transcript, &pre_output, &proof)?;
    Ok(inout.make_bytes::<AuthorRandomness>(RANDOMNESS_VRF_CONTEXT))
}

/// Compute the Blake2b-256 hash of the given bytes.
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
