use vigil_types::error::VigilError;
use vigil_types::guardian_set::GuardianSet;
use vigil_types::vaa::{Vaa, VaaSignature};

use crate::hash::vaa_signing_digest;
use crate::keys::{recover_address, GuardianKey};

/// Verify that `vaa` carries a quorum of valid signatures from `gs`.
///
/// Signatures must be in strictly ascending guardian-index order, each index
/// must exist in the set, and each signature must recover to the key at that
/// index.
pub fn verify_signatures(vaa: &Vaa, gs: &GuardianSet) -> Result<(), VigilError> {
    if vaa.guardian_set_index != gs.index {
        return Err(VigilError::GuardianSetMismatch {
            vaa: vaa.guardian_set_index,
            set: gs.index,
        });
    }

    let need = gs.quorum();
    if vaa.signatures.len() < need {
        return Err(VigilError::NoQuorum {
            have: vaa.signatures.len(),
            need,
        });
    }

    let digest = vaa_signing_digest(vaa);
    let mut last: Option<u8> = None;
    for (position, sig) in vaa.signatures.iter().enumerate() {
        if last.is_some_and(|prev| sig.index <= prev) {
            return Err(VigilError::SignaturesNotAscending { position });
        }
        last = Some(sig.index);

        let expected = gs
            .keys
            .get(sig.index as usize)
            .ok_or(VigilError::UnknownGuardianIndex {
                index: sig.index,
                size: gs.len(),
            })?;
        let signer = recover_address(&digest, &sig.signature)?;
        if &signer != expected {
            return Err(VigilError::InvalidSignature {
                signer_index: sig.index as usize,
            });
        }
    }
    Ok(())
}

/// Produce this guardian's signature entry for `vaa`.
pub fn sign_vaa(vaa: &Vaa, key: &GuardianKey, index: u8) -> Result<VaaSignature, VigilError> {
    Ok(VaaSignature {
        index,
        signature: key.sign(&vaa_signing_digest(vaa))?,
    })
}
