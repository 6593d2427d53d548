//! Key files on disk

use civica_core::{CivicaError, CivicaResult};
use civica_crypto::keys::{KeyFile, KeyPair};
use std::path::Path;

/// Load a keypair from a JSON key file
pub fn load_keypair(path: &Path) -> CivicaResult<KeyPair> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CivicaError::Io(format!("{}: {}", path.display(), e)))?;

    let key_file: KeyFile = serde_json::from_str(&content)
        .map_err(|e| CivicaError::DeserializationError(e.to_string()))?;

    key_file.to_keypair()
}

/// Save a keypair as a JSON key file
pub fn save_keypair(keypair: &KeyPair, path: &Path) -> CivicaResult<()> {
    if path.exists() {
        return Err(CivicaError::ConfigError(format!(
            "Key file '{}' already exists",
            path.display()
        )));
    }

    let content = key_file_json(keypair)?;

    std::fs::write(path, content)
        .map_err(|e| CivicaError::Io(format!("{}: {}", path.display(), e)))?;

    Ok(())
}

/// Key file contents as pretty JSON
pub fn key_file_json(keypair: &KeyPair) -> CivicaResult<String> {
    Ok(serde_json::to_string_pretty(&KeyFile::from(keypair))?)
}
