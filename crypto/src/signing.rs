//! Digital signature operations using Ed25519

use civica_core::{CivicaError, CivicaResult, PublicKey, Signature};
use ed25519_dalek::Signer;

use crate::keys::{public_key_to_ed25519, KeyPair};

/// Sign a message using Ed25519
pub fn sign(keypair: &KeyPair, message: &[u8]) -> Signature {
    let signature = keypair.signing_key().sign(message);
    Signature::from_bytes(signature.to_bytes())
}

/// Verify a signature using Ed25519
///
/// Any failure, including a public key that is not a valid curve point,
/// is reported as `InvalidSignature`.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> CivicaResult<()> {
    let verifying_key =
        public_key_to_ed25519(public_key).map_err(|_| CivicaError::InvalidSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    verifying_key
        .verify_strict(message, &sig)
        .map_err(|_| CivicaError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"Hello, CIVICA!";

        let signature = sign(&keypair, message);
        assert!(verify(&keypair.public_key(), message, &signature).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::generate();
        let message = b"Hello, CIVICA!";

        let signature = sign(&keypair1, message);

        // Wrong public key should fail
        assert!(matches!(
            verify(&keypair2.public_key(), message, &signature),
            Err(CivicaError::InvalidSignature)
        ));

        // Wrong message should fail
        assert!(verify(&keypair1.public_key(), b"Different message", &signature).is_err());
    }

    #[test]
    fn test_zeroed_signature_is_invalid() {
        let keypair = KeyPair::generate();
        let zeroed = Signature::from_bytes([0u8; 64]);
        assert!(matches!(
            verify(&keypair.public_key(), b"ballot", &zeroed),
            Err(CivicaError::InvalidSignature)
        ));
    }
}
