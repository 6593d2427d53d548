//! Voting state engine
//!
//! [`VotingState`] is the single authoritative store for voters, candidates
//! and elections. Every table lives behind one reader/writer lock: mutations
//! serialize against each other and against readers, so the tallies, the
//! per-candidate counts and the has-voted index always change together.
//!
//! The engine trusts its inputs to be verified. Signature checks, including
//! that a payload naming a key is signed by that key, happen upstream, see
//! [`VerifiedTransaction`]. Reviews are authorized here against the signer.

use civica_core::{
    CivicaError, CivicaResult, Clock, EntityKind, PublicKey, SystemClock, VotingConfig,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::model::{
    Candidate, Election, ElectionStatus, RegistrationStatus, Voter, VotingStats,
};
use crate::transaction::{
    CandidateRegistration, ElectionCreation, Payload, ReviewDecision, VerifiedTransaction, Vote,
    VoterRegistration,
};

/// Result of applying a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    VoterRegistered(Voter),
    CandidateRegistered(Candidate),
    ElectionCreated(Election),
    /// Candidate after the vote was counted
    VoteCast(Candidate),
    VoterReviewed(Voter),
    CandidateReviewed(Candidate),
}

#[derive(Debug, Default)]
struct Ledger {
    voters: HashMap<String, Voter>,
    /// Public key -> voter ID. Each key belongs to exactly one voter.
    voters_by_key: HashMap<PublicKey, String>,
    elections: HashMap<String, Election>,
    /// Election ID -> IDs of voters who have voted in it
    has_voted: HashMap<String, HashSet<String>>,
}

/// Authoritative, thread-safe voting state
pub struct VotingState {
    ledger: RwLock<Ledger>,
    clock: Arc<dyn Clock>,
    config: VotingConfig,
}

impl VotingState {
    /// Create an empty state reading the system clock
    pub fn new(config: VotingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty state with a custom time source
    pub fn with_clock(config: VotingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            clock,
            config,
        }
    }

    /// Apply a verified transaction to the state
    pub fn apply(&self, tx: &VerifiedTransaction) -> CivicaResult<Receipt> {
        debug!("Applying {} tx {}", tx.payload().kind(), tx.id());

        match tx.payload() {
            Payload::VoterRegistration(p) => self.register_voter(p).map(Receipt::VoterRegistered),
            Payload::CandidateRegistration(p) => {
                self.register_candidate(p).map(Receipt::CandidateRegistered)
            }
            Payload::ElectionCreation(p) => self.create_election(p).map(Receipt::ElectionCreated),
            Payload::Vote(p) => self.cast_vote(p).map(Receipt::VoteCast),
            Payload::VoterReview(p) => {
                let voter = match p.decision {
                    ReviewDecision::Approve => self.approve_voter(&p.voter_id, tx.signer())?,
                    ReviewDecision::Reject => self.reject_voter(&p.voter_id, tx.signer())?,
                };
                Ok(Receipt::VoterReviewed(voter))
            }
            Payload::CandidateReview(p) => {
                let candidate = match p.decision {
                    ReviewDecision::Approve => {
                        self.approve_candidate(&p.election_id, &p.candidate_id, tx.signer())?
                    }
                    ReviewDecision::Reject => {
                        self.reject_candidate(&p.election_id, &p.candidate_id, tx.signer())?
                    }
                };
                Ok(Receipt::CandidateReviewed(candidate))
            }
        }
    }

    // ============ Voters ============

    /// Register a new voter with status Pending
    ///
    /// Both the voter ID and the public key must be unused.
    pub fn register_voter(&self, reg: &VoterRegistration) -> CivicaResult<Voter> {
        let mut ledger = self.ledger.write();

        if ledger.voters.contains_key(&reg.voter_id) {
            return Err(CivicaError::already_exists(EntityKind::Voter, &reg.voter_id));
        }
        if ledger.voters_by_key.contains_key(&reg.voter_public_key) {
            return Err(CivicaError::already_exists(
                EntityKind::Voter,
                format!("with key {}", reg.voter_public_key),
            ));
        }

        let voter = Voter {
            id: reg.voter_id.clone(),
            public_key: reg.voter_public_key,
            document_hash: reg.document_hash.clone(),
            status: RegistrationStatus::Pending,
            timestamp: reg.timestamp,
        };

        ledger
            .voters_by_key
            .insert(reg.voter_public_key, reg.voter_id.clone());
        ledger.voters.insert(reg.voter_id.clone(), voter.clone());

        info!("Registered voter {} with key {}", voter.id, voter.public_key);
        Ok(voter)
    }

    pub fn approve_voter(&self, voter_id: &str, approver: &PublicKey) -> CivicaResult<Voter> {
        self.review_voter(voter_id, approver, ReviewDecision::Approve)
    }

    pub fn reject_voter(&self, voter_id: &str, approver: &PublicKey) -> CivicaResult<Voter> {
        self.review_voter(voter_id, approver, ReviewDecision::Reject)
    }

    fn review_voter(
        &self,
        voter_id: &str,
        approver: &PublicKey,
        decision: ReviewDecision,
    ) -> CivicaResult<Voter> {
        let mut ledger = self.ledger.write();

        let voter = ledger
            .voters
            .get_mut(voter_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Voter, voter_id))?;

        if !self.config.is_registrar(approver) {
            return Err(CivicaError::Unauthorized(format!(
                "{} is not a voter registrar",
                approver
            )));
        }

        self.set_review_status(&mut voter.status, decision, EntityKind::Voter, voter_id)?;

        info!("Voter {} is now {}", voter_id, voter.status);
        Ok(voter.clone())
    }

    // ============ Elections ============

    /// Create an election; its status reflects the current time
    pub fn create_election(&self, creation: &ElectionCreation) -> CivicaResult<Election> {
        let mut ledger = self.ledger.write();

        if ledger.elections.contains_key(&creation.election_id) {
            return Err(CivicaError::already_exists(
                EntityKind::Election,
                &creation.election_id,
            ));
        }

        let status = ElectionStatus::at(self.clock.now(), creation.start_time, creation.end_time);
        let election = Election {
            id: creation.election_id.clone(),
            title: creation.title.clone(),
            description: creation.description.clone(),
            start_time: creation.start_time,
            end_time: creation.end_time,
            admin_key: creation.admin_public_key,
            status,
            timestamp: creation.timestamp,
            candidates: BTreeMap::new(),
            vote_counts: BTreeMap::new(),
        };

        ledger
            .elections
            .insert(creation.election_id.clone(), election.clone());
        ledger
            .has_voted
            .insert(creation.election_id.clone(), HashSet::new());

        info!(
            "Created election {} [{}, {}) status={}",
            election.id, election.start_time, election.end_time, election.status
        );
        Ok(election)
    }

    /// Recompute every election's status from the current time
    ///
    /// Statuses only move forward: an election never returns to an earlier
    /// phase, even if the clock does. Returns the number of elections whose
    /// status changed.
    pub fn update_election_statuses(&self) -> usize {
        let now = self.clock.now();
        let mut ledger = self.ledger.write();
        let mut changed = 0;

        for election in ledger.elections.values_mut() {
            let target = ElectionStatus::at(now, election.start_time, election.end_time);
            if target > election.status {
                debug!(
                    "Election {} status {} -> {}",
                    election.id, election.status, target
                );
                election.status = target;
                changed += 1;
            }
        }

        changed
    }

    // ============ Candidates ============

    /// Register a candidate for an existing election with status Pending
    pub fn register_candidate(&self, reg: &CandidateRegistration) -> CivicaResult<Candidate> {
        let mut ledger = self.ledger.write();

        let election = ledger
            .elections
            .get_mut(&reg.election_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, &reg.election_id))?;

        if election.candidates.contains_key(&reg.candidate_id) {
            return Err(CivicaError::already_exists(
                EntityKind::Candidate,
                format!("{}/{}", reg.election_id, reg.candidate_id),
            ));
        }

        let candidate = Candidate {
            id: reg.candidate_id.clone(),
            election_id: reg.election_id.clone(),
            public_key: reg.candidate_public_key,
            profile_hash: reg.profile_hash.clone(),
            status: RegistrationStatus::Pending,
            timestamp: reg.timestamp,
            vote_count: 0,
        };

        election
            .candidates
            .insert(reg.candidate_id.clone(), candidate.clone());
        election.vote_counts.insert(reg.candidate_id.clone(), 0);

        info!(
            "Registered candidate {} for election {}",
            candidate.id, candidate.election_id
        );
        Ok(candidate)
    }

    pub fn approve_candidate(
        &self,
        election_id: &str,
        candidate_id: &str,
        approver: &PublicKey,
    ) -> CivicaResult<Candidate> {
        self.review_candidate(election_id, candidate_id, approver, ReviewDecision::Approve)
    }

    pub fn reject_candidate(
        &self,
        election_id: &str,
        candidate_id: &str,
        approver: &PublicKey,
    ) -> CivicaResult<Candidate> {
        self.review_candidate(election_id, candidate_id, approver, ReviewDecision::Reject)
    }

    fn review_candidate(
        &self,
        election_id: &str,
        candidate_id: &str,
        approver: &PublicKey,
        decision: ReviewDecision,
    ) -> CivicaResult<Candidate> {
        let mut ledger = self.ledger.write();

        let election = ledger
            .elections
            .get_mut(election_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, election_id))?;

        if election.admin_key != *approver {
            return Err(CivicaError::Unauthorized(format!(
                "only the admin of election {} can review candidates",
                election_id
            )));
        }

        let candidate = election.candidates.get_mut(candidate_id).ok_or_else(|| {
            CivicaError::not_found(EntityKind::Candidate, format!("{}/{}", election_id, candidate_id))
        })?;

        self.set_review_status(
            &mut candidate.status,
            decision,
            EntityKind::Candidate,
            candidate_id,
        )?;

        info!(
            "Candidate {} in election {} is now {}",
            candidate_id, election_id, candidate.status
        );
        Ok(candidate.clone())
    }

    fn set_review_status(
        &self,
        status: &mut RegistrationStatus,
        decision: ReviewDecision,
        kind: EntityKind,
        id: &str,
    ) -> CivicaResult<()> {
        if !status.is_pending() && !self.config.allow_re_review {
            return Err(CivicaError::AlreadyReviewed {
                kind,
                id: id.to_string(),
                status: status.to_string(),
            });
        }
        *status = decision.into();
        Ok(())
    }

    // ============ Voting ============

    /// Record a vote
    ///
    /// The voter is identified by public key. The candidate count, the
    /// election tally and the has-voted mark are updated under one write lock.
    pub fn cast_vote(&self, vote: &Vote) -> CivicaResult<Candidate> {
        let now = self.clock.now();
        let mut guard = self.ledger.write();
        let ledger = &mut *guard;

        let election = ledger
            .elections
            .get_mut(&vote.election_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, &vote.election_id))?;

        if !election.is_open_at(now) {
            return Err(if now >= election.end_time {
                CivicaError::Ended(vote.election_id.clone())
            } else {
                CivicaError::NotStarted(vote.election_id.clone())
            });
        }

        let voter = ledger
            .voters_by_key
            .get(&vote.voter_public_key)
            .and_then(|voter_id| ledger.voters.get(voter_id))
            .ok_or_else(|| CivicaError::VoterNotFound(vote.voter_public_key.to_hex()))?;

        if voter.status != RegistrationStatus::Approved {
            return Err(CivicaError::VoterIneligible(voter.id.clone()));
        }

        let candidate = election
            .candidates
            .get_mut(&vote.candidate_id)
            .ok_or_else(|| CivicaError::CandidateNotFound {
                election_id: vote.election_id.clone(),
                candidate_id: vote.candidate_id.clone(),
            })?;

        if candidate.status != RegistrationStatus::Approved {
            return Err(CivicaError::CandidateIneligible {
                election_id: vote.election_id.clone(),
                candidate_id: vote.candidate_id.clone(),
            });
        }

        let voted = ledger.has_voted.entry(vote.election_id.clone()).or_default();
        if voted.contains(&voter.id) {
            return Err(CivicaError::DuplicateVote {
                election_id: vote.election_id.clone(),
                voter_id: voter.id.clone(),
            });
        }

        debug_assert!(
            election.vote_counts.contains_key(&vote.candidate_id),
            "registered candidate {} has no tally",
            vote.candidate_id
        );

        candidate.vote_count += 1;
        *election
            .vote_counts
            .entry(vote.candidate_id.clone())
            .or_insert(0) += 1;
        voted.insert(voter.id.clone());

        debug!(
            "Vote recorded in election {} for candidate {}",
            vote.election_id, vote.candidate_id
        );
        Ok(candidate.clone())
    }

    /// Final tally of an election that has ended
    pub fn get_election_results(&self, election_id: &str) -> CivicaResult<BTreeMap<String, u64>> {
        let now = self.clock.now();
        let ledger = self.ledger.read();

        let election = ledger
            .elections
            .get(election_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, election_id))?;

        if now < election.end_time {
            return Err(CivicaError::NotEnded(election_id.to_string()));
        }

        Ok(election.vote_counts.clone())
    }

    /// Whether the voter has voted in the election
    pub fn has_voted(&self, election_id: &str, voter_id: &str) -> CivicaResult<bool> {
        let ledger = self.ledger.read();

        if !ledger.elections.contains_key(election_id) {
            return Err(CivicaError::not_found(EntityKind::Election, election_id));
        }

        Ok(ledger
            .has_voted
            .get(election_id)
            .map_or(false, |voted| voted.contains(voter_id)))
    }

    // ============ Queries ============

    pub fn get_election(&self, election_id: &str) -> CivicaResult<Election> {
        self.ledger
            .read()
            .elections
            .get(election_id)
            .cloned()
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, election_id))
    }

    pub fn get_voter(&self, voter_id: &str) -> CivicaResult<Voter> {
        self.ledger
            .read()
            .voters
            .get(voter_id)
            .cloned()
            .ok_or_else(|| CivicaError::not_found(EntityKind::Voter, voter_id))
    }

    pub fn get_candidate(&self, election_id: &str, candidate_id: &str) -> CivicaResult<Candidate> {
        let ledger = self.ledger.read();

        let election = ledger
            .elections
            .get(election_id)
            .ok_or_else(|| CivicaError::not_found(EntityKind::Election, election_id))?;

        election.candidates.get(candidate_id).cloned().ok_or_else(|| {
            CivicaError::not_found(EntityKind::Candidate, format!("{}/{}", election_id, candidate_id))
        })
    }

    /// All elections, ordered by ID
    pub fn list_elections(&self) -> Vec<Election> {
        let ledger = self.ledger.read();
        let mut elections: Vec<Election> = ledger.elections.values().cloned().collect();
        elections.sort_by(|a, b| a.id.cmp(&b.id));
        elections
    }

    /// All voters, ordered by ID
    pub fn list_voters(&self) -> Vec<Voter> {
        let ledger = self.ledger.read();
        let mut voters: Vec<Voter> = ledger.voters.values().cloned().collect();
        voters.sort_by(|a, b| a.id.cmp(&b.id));
        voters
    }

    pub fn stats(&self) -> VotingStats {
        let ledger = self.ledger.read();
        VotingStats {
            voters: ledger.voters.len(),
            elections: ledger.elections.len(),
            candidates: ledger.elections.values().map(|e| e.candidates.len()).sum(),
            votes: ledger.has_voted.values().map(|v| v.len() as u64).sum(),
        }
    }

    /// Check the cross-entity invariants of every election
    ///
    /// For each election the tally keys match the candidate keys, each
    /// candidate's count matches its tally, the tallies sum to the number of
    /// voters marked as having voted, and every such voter exists.
    pub fn audit(&self) -> CivicaResult<()> {
        let ledger = self.ledger.read();

        for (voter_id, voter) in &ledger.voters {
            match ledger.voters_by_key.get(&voter.public_key) {
                Some(owner) if owner == voter_id => {}
                Some(owner) => {
                    return Err(CivicaError::StateCorruption(format!(
                        "key of voter {} indexed to voter {}",
                        voter_id, owner
                    )))
                }
                None => {
                    return Err(CivicaError::StateCorruption(format!(
                        "key of voter {} is not indexed",
                        voter_id
                    )))
                }
            }
        }

        for (election_id, election) in &ledger.elections {
            let voted = ledger.has_voted.get(election_id).ok_or_else(|| {
                CivicaError::StateCorruption(format!(
                    "election {} has no has-voted index",
                    election_id
                ))
            })?;

            if !election.vote_counts.keys().eq(election.candidates.keys()) {
                return Err(CivicaError::StateCorruption(format!(
                    "tally keys of election {} differ from its candidates",
                    election_id
                )));
            }

            for (candidate_id, candidate) in &election.candidates {
                if election.vote_counts.get(candidate_id) != Some(&candidate.vote_count) {
                    return Err(CivicaError::StateCorruption(format!(
                        "candidate {} in election {} disagrees with the tally",
                        candidate_id, election_id
                    )));
                }
            }

            if election.total_votes() != voted.len() as u64 {
                return Err(CivicaError::StateCorruption(format!(
                    "election {} counts {} votes but {} voters voted",
                    election_id,
                    election.total_votes(),
                    voted.len()
                )));
            }

            if let Some(unknown) = voted.iter().find(|id| !ledger.voters.contains_key(*id)) {
                return Err(CivicaError::StateCorruption(format!(
                    "unknown voter {} voted in election {}",
                    unknown, election_id
                )));
            }
        }

        Ok(())
    }
}

impl Default for VotingState {
    fn default() -> Self {
        Self::new(VotingConfig::default())
    }
}

/// Shared voting state type
pub type SharedVotingState = Arc<VotingState>;
