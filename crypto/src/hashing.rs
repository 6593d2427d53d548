//! Hashing functions using BLAKE3

use civica_core::Hash;

/// Default hash function (BLAKE3)
pub fn hash(data: &[u8]) -> Hash {
    let hash = blake3::hash(data);
    Hash::from_bytes(*hash.as_bytes())
}

/// Hash multiple pieces of data
///
/// Each part is length-prefixed so that moving bytes between adjacent parts
/// changes the digest.
pub fn hash_multiple(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let hash = hasher.finalize();
    Hash::from_bytes(*hash.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"Hello, CIVICA!";
        let hash1 = hash(data);
        let hash2 = hash(data);

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, Hash::ZERO);
    }

    #[test]
    fn test_hash_multiple_boundaries() {
        let a = hash_multiple(&[b"ab", b"c"]);
        let b = hash_multiple(&[b"a", b"bc"]);
        assert_ne!(a, b);
        assert_eq!(a, hash_multiple(&[b"ab", b"c"]));
    }
}
