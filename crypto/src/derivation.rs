//! Key derivation using HKDF

use civica_core::{CivicaError, CivicaResult};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::keys::{KeyPair, SecretKey};

const PHRASE_SALT: &[u8] = b"civica-seed";

/// Derive a 32-byte key using HKDF-SHA256
pub fn derive_key_32(
    input_key_material: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
) -> CivicaResult<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(salt, input_key_material);
    let mut output = [0u8; 32];

    hk.expand(info, &mut output)
        .map_err(|e| CivicaError::KeyDerivationFailed(e.to_string()))?;

    Ok(output)
}

/// Derive the keypair at `index` from a pass phrase
///
/// The same phrase and index always produce the same keypair, so an operator
/// can recreate admin or registrar keys without storing them.
pub fn keypair_from_phrase(phrase: &str, index: u32) -> CivicaResult<KeyPair> {
    if phrase.is_empty() {
        return Err(CivicaError::KeyDerivationFailed("empty phrase".into()));
    }
    let master = SecretKey::new(derive_key_32(phrase.as_bytes(), Some(PHRASE_SALT), b"master")?);
    let info = format!("civica/key/{}", index);
    let child = SecretKey::new(derive_key_32(master.as_bytes(), None, info.as_bytes())?);
    Ok(child.to_keypair())
}
