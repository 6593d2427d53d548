//! Error types for CIVICA

use std::fmt;
use thiserror::Error;

/// Kind of entity held by the voting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Voter,
    Candidate,
    Election,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Voter => "Voter",
            EntityKind::Candidate => "Candidate",
            EntityKind::Election => "Election",
        };
        f.write_str(name)
    }
}

/// Main error type for CIVICA
#[derive(Error, Debug)]
pub enum CivicaError {
    // ============ Cryptography Errors ============
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // ============ Registry Errors ============
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: EntityKind, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{kind} {id} was already reviewed ({status})")]
    AlreadyReviewed {
        kind: EntityKind,
        id: String,
        status: String,
    },

    // ============ Voting Errors ============
    #[error("Election {0} has not started yet")]
    NotStarted(String),

    #[error("Election {0} has ended")]
    Ended(String),

    #[error("Election {0} has not ended yet")]
    NotEnded(String),

    #[error("No registered voter for public key {0}")]
    VoterNotFound(String),

    #[error("Voter {0} is not approved to vote")]
    VoterIneligible(String),

    #[error("Candidate {candidate_id} does not exist in election {election_id}")]
    CandidateNotFound {
        election_id: String,
        candidate_id: String,
    },

    #[error("Candidate {candidate_id} in election {election_id} is not approved to receive votes")]
    CandidateIneligible {
        election_id: String,
        candidate_id: String,
    },

    #[error("Voter {voter_id} has already voted in election {election_id}")]
    DuplicateVote {
        election_id: String,
        voter_id: String,
    },

    // ============ State Errors ============
    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    // ============ Encoding Errors ============
    #[error("Serialization failed: {0}")]
    SerializationError(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ General Errors ============
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CivicaError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        CivicaError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: EntityKind, id: impl Into<String>) -> Self {
        CivicaError::AlreadyExists {
            kind,
            id: id.into(),
        }
    }
}

impl From<std::io::Error> for CivicaError {
    fn from(err: std::io::Error) -> Self {
        CivicaError::Io(err.to_string())
    }
}

impl From<bincode::Error> for CivicaError {
    fn from(err: bincode::Error) -> Self {
        CivicaError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for CivicaError {
    fn from(err: serde_json::Error) -> Self {
        CivicaError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CivicaError::not_found(EntityKind::Election, "e1");
        assert_eq!(err.to_string(), "Election e1 not found");

        let err = CivicaError::DuplicateVote {
            election_id: "e1".into(),
            voter_id: "v1".into(),
        };
        assert_eq!(err.to_string(), "Voter v1 has already voted in election e1");
    }
}
