//! CIVICA Cryptography Module
//! 
//! Provides cryptographic primitives using standard, audited algorithms:
//! - Ed25519 for signatures
//! - BLAKE3 for hashing
//! - HKDF-SHA256 for phrase-based key derivation

pub mod keys;
pub mod signing;
pub mod hashing;
pub mod derivation;

pub use keys::*;
pub use signing::*;
pub use hashing::*;
pub use derivation::*;
