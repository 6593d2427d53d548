//! Voting domain records: voters, candidates and elections

use civica_core::{PublicKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::transaction::ReviewDecision;

/// Review status of a voter or candidate registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, RegistrationStatus::Pending)
    }
}

impl From<ReviewDecision> for RegistrationStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approve => RegistrationStatus::Approved,
            ReviewDecision::Reject => RegistrationStatus::Rejected,
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Election lifecycle status
///
/// Ordered so that a later phase compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    #[default]
    Pending,
    Active,
    Ended,
}

impl ElectionStatus {
    /// Status of the window `[start, end)` as seen at `now`
    pub fn at(now: Timestamp, start: Timestamp, end: Timestamp) -> Self {
        if now >= end {
            ElectionStatus::Ended
        } else if now >= start {
            ElectionStatus::Active
        } else {
            ElectionStatus::Pending
        }
    }
}

impl fmt::Display for ElectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElectionStatus::Pending => "pending",
            ElectionStatus::Active => "active",
            ElectionStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// A registered voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub id: String,
    pub public_key: PublicKey,
    /// Content hash reference to the voter's identity document
    pub document_hash: String,
    pub status: RegistrationStatus,
    pub timestamp: Timestamp,
}

/// A candidate registered for one election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub election_id: String,
    pub public_key: PublicKey,
    /// Content hash reference to the candidate's profile
    pub profile_hash: String,
    pub status: RegistrationStatus,
    pub timestamp: Timestamp,
    pub vote_count: u64,
}

/// An election and its candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub admin_key: PublicKey,
    pub status: ElectionStatus,
    pub timestamp: Timestamp,
    pub candidates: BTreeMap<String, Candidate>,
    /// Candidate ID -> votes received
    pub vote_counts: BTreeMap<String, u64>,
}

impl Election {
    /// Whether votes are accepted at `now`
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        now >= self.start_time && now < self.end_time
    }

    pub fn total_votes(&self) -> u64 {
        self.vote_counts.values().sum()
    }
}

/// Entity counts across the voting state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VotingStats {
    pub voters: usize,
    pub elections: usize,
    pub candidates: usize,
    pub votes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_election_status_at() {
        let start = Timestamp::from_secs(100);
        let end = Timestamp::from_secs(200);

        assert_eq!(ElectionStatus::at(Timestamp::from_secs(99), start, end), ElectionStatus::Pending);
        assert_eq!(ElectionStatus::at(start, start, end), ElectionStatus::Active);
        assert_eq!(ElectionStatus::at(Timestamp::from_secs(199), start, end), ElectionStatus::Active);
        assert_eq!(ElectionStatus::at(end, start, end), ElectionStatus::Ended);
    }

    #[test]
    fn test_inverted_window_is_never_active() {
        let start = Timestamp::from_secs(200);
        let end = Timestamp::from_secs(100);

        assert_eq!(ElectionStatus::at(Timestamp::from_secs(50), start, end), ElectionStatus::Pending);
        assert_eq!(ElectionStatus::at(Timestamp::from_secs(150), start, end), ElectionStatus::Ended);
    }

    #[test]
    fn test_status_ordering() {
        assert!(ElectionStatus::Pending < ElectionStatus::Active);
        assert!(ElectionStatus::Active < ElectionStatus::Ended);
    }

    #[test]
    fn test_review_decision_maps_to_status() {
        assert_eq!(RegistrationStatus::from(ReviewDecision::Approve), RegistrationStatus::Approved);
        assert_eq!(RegistrationStatus::from(ReviewDecision::Reject), RegistrationStatus::Rejected);
        assert!(RegistrationStatus::default().is_pending());
    }
}
