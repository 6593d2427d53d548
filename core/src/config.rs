//! Configuration types for CIVICA

use serde::{Deserialize, Serialize};

use crate::error::CivicaError;
use crate::traits::CivicaResult;
use crate::types::PublicKey;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CivicaConfig {
    /// Instance name, recorded on the CLI's log span
    pub name: String,

    /// Voting engine configuration
    pub voting: VotingConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for CivicaConfig {
    fn default() -> Self {
        Self {
            name: "civica".to_string(),
            voting: VotingConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl CivicaConfig {
    pub fn from_json(json: &str) -> CivicaResult<Self> {
        serde_json::from_str(json).map_err(|e| CivicaError::ConfigError(e.to_string()))
    }

    pub fn to_json(&self) -> CivicaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Voting engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VotingConfig {
    /// Allow approve/reject on a voter or candidate that was already reviewed
    pub allow_re_review: bool,

    /// Keys allowed to review voters. Empty means voter review is open.
    pub registrars: Vec<PublicKey>,
}

impl VotingConfig {
    /// Whether `key` may approve or reject voters
    pub fn is_registrar(&self, key: &PublicKey) -> bool {
        self.registrars.is_empty() || self.registrars.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CivicaConfig::default();
        assert!(!config.voting.allow_re_review);
        assert!(config.voting.is_registrar(&PublicKey([1u8; 32])));
    }

    #[test]
    fn test_registrars_restrict_review() {
        let registrar = PublicKey([1u8; 32]);
        let config = VotingConfig {
            allow_re_review: false,
            registrars: vec![registrar],
        };
        assert!(config.is_registrar(&registrar));
        assert!(!config.is_registrar(&PublicKey([2u8; 32])));
    }

    #[test]
    fn test_partial_json() {
        let config = CivicaConfig::from_json(r#"{"voting": {"allow_re_review": true}}"#).unwrap();
        assert!(config.voting.allow_re_review);
        assert_eq!(config.log_level, "info");

        let json = config.to_json().unwrap();
        let back = CivicaConfig::from_json(&json).unwrap();
        assert!(back.voting.allow_re_review);
    }

    #[test]
    fn test_invalid_json() {
        let result = CivicaConfig::from_json(r#"{"voting": {"registrars": ["zz"]}}"#);
        assert!(matches!(result, Err(CivicaError::ConfigError(_))));
    }
}
