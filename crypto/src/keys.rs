//! Key management for CIVICA
//!
//! Handles key generation and conversion between our key types and Ed25519.

use civica_core::{CivicaError, CivicaResult, PublicKey};
use ed25519_dalek::{
    SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
    SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A keypair for signing and verification
#[derive(Clone)]
pub struct KeyPair {
    signing_key: Ed25519SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create keypair from seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = Ed25519SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create keypair from secret key bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> CivicaResult<Self> {
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(CivicaError::InvalidPrivateKey);
        }
        let mut seed = SecretKey::new([0u8; 32]);
        seed.bytes.copy_from_slice(bytes);
        Ok(seed.to_keypair())
    }

    /// Create keypair from a hex-encoded secret key
    pub fn from_secret_hex(secret: &str) -> CivicaResult<Self> {
        let bytes = hex::decode(secret.trim()).map_err(|_| CivicaError::InvalidPrivateKey)?;
        Self::from_secret_bytes(&bytes)
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        public_key_from_ed25519(&self.signing_key.verifying_key())
    }

    /// Get the secret key bytes (BE CAREFUL with this!)
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Get the internal signing key for signing operations
    pub(crate) fn signing_key(&self) -> &Ed25519SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Convert Ed25519 verifying key to our PublicKey type
pub fn public_key_from_ed25519(key: &Ed25519VerifyingKey) -> PublicKey {
    PublicKey::from_bytes(key.to_bytes())
}

/// Convert our PublicKey type to Ed25519 verifying key
pub fn public_key_to_ed25519(key: &PublicKey) -> CivicaResult<Ed25519VerifyingKey> {
    Ed25519VerifyingKey::from_bytes(key.as_bytes())
        .map_err(|_| CivicaError::InvalidPublicKey)
}

/// Secure secret key storage (zeroizes on drop)
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; 32],
}

impl SecretKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn to_keypair(&self) -> KeyPair {
        KeyPair::from_seed(&self.bytes)
    }
}

/// Serializable key file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    pub public_key: String,
    pub secret_key: String,
}

impl From<&KeyPair> for KeyFile {
    fn from(keypair: &KeyPair) -> Self {
        Self {
            public_key: keypair.public_key().to_hex(),
            secret_key: hex::encode(keypair.secret_bytes()),
        }
    }
}

impl KeyFile {
    /// Rebuild the keypair, checking the stored public key matches
    pub fn to_keypair(&self) -> CivicaResult<KeyPair> {
        let keypair = KeyPair::from_secret_hex(&self.secret_key)?;
        let stored = PublicKey::from_hex(self.public_key.trim())
            .map_err(|_| CivicaError::InvalidPublicKey)?;
        if keypair.public_key() != stored {
            return Err(CivicaError::InvalidPublicKey);
        }
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let kp1 = KeyPair::from_seed(&seed);
        let kp2 = KeyPair::from_seed(&seed);

        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_secret_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());

        assert!(matches!(
            KeyPair::from_secret_bytes(&[1u8; 16]),
            Err(CivicaError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_public_key_conversion() {
        let kp = KeyPair::generate();
        let ed = public_key_to_ed25519(&kp.public_key()).unwrap();
        assert_eq!(public_key_from_ed25519(&ed), kp.public_key());
    }

    #[test]
    fn test_key_file() {
        let kp = KeyPair::generate();
        let file = KeyFile::from(&kp);
        assert_eq!(file.to_keypair().unwrap().public_key(), kp.public_key());

        let mismatched = KeyFile {
            public_key: KeyPair::generate().public_key().to_hex(),
            secret_key: file.secret_key.clone(),
        };
        assert!(matches!(mismatched.to_keypair(), Err(CivicaError::InvalidPublicKey)));
    }

    #[test]
    fn test_secret_key_zeroize() {
        let secret = SecretKey::new([42u8; 32]);
        let kp = secret.to_keypair();
        assert!(kp.public_key().as_bytes() != &[0u8; 32]);
    }
}
