//! Envelope signing, verification and log replay

use civica_core::{
    CivicaError, CivicaResult, Hashable, ManualClock, Nonce, Timestamp, TxId, VotingConfig,
};
use civica_crypto::keys::KeyPair;
use civica_voting::{
    Election, Payload, Receipt, Transaction, TransactionDraft, VerifiedTransaction, VotingState,
    VotingStats,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Parse a payload and wrap it in a signed envelope
pub fn sign_payload(
    payload_json: &str,
    keypair: &KeyPair,
    nonce: Option<u64>,
) -> CivicaResult<Transaction> {
    let payload: Payload = serde_json::from_str(payload_json)
        .map_err(|e| CivicaError::DeserializationError(e.to_string()))?;

    let draft = TransactionDraft::new(payload);
    let draft = match nonce {
        Some(n) => draft.with_nonce(Nonce::new(n)),
        None => draft,
    };

    draft.sign(keypair)
}

/// Parse an envelope and check its signature
pub fn verify_envelope(envelope_json: &str) -> CivicaResult<VerifiedTransaction> {
    VerifiedTransaction::new(Transaction::from_json(envelope_json)?)
}

/// What happened to one envelope of a replayed log
#[derive(Debug)]
pub struct EnvelopeOutcome {
    pub index: usize,
    pub kind: Option<&'static str>,
    pub tx_id: Option<TxId>,
    pub result: Result<String, String>,
}

/// An election as seen at the end of a replay
#[derive(Debug)]
pub struct ElectionReport {
    pub election: Election,
    /// Final tally, present once the election has ended
    pub results: Option<BTreeMap<String, u64>>,
}

#[derive(Debug)]
pub struct ReplayReport {
    pub outcomes: Vec<EnvelopeOutcome>,
    pub elections: Vec<ElectionReport>,
    pub stats: VotingStats,
    pub audit: Result<(), String>,
}

impl ReplayReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Replay a JSON array of envelopes through a fresh engine
///
/// Each envelope is applied with the clock set to its payload timestamp.
/// Afterwards the clock moves to `at`, statuses are recomputed and results
/// are collected for every election that has ended by then. A malformed or
/// rejected envelope is reported and skipped.
pub fn replay(log_json: &str, config: VotingConfig, at: Timestamp) -> CivicaResult<ReplayReport> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(log_json)
        .map_err(|e| CivicaError::DeserializationError(e.to_string()))?;

    let clock = Arc::new(ManualClock::new(at));
    let state = VotingState::with_clock(config, clock.clone());

    let outcomes = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| replay_entry(&state, &clock, index, entry))
        .collect();

    clock.set(at);
    state.update_election_statuses();

    let mut elections = Vec::new();
    for election in state.list_elections() {
        let results = match state.get_election_results(&election.id) {
            Ok(results) => Some(results),
            Err(CivicaError::NotEnded(_)) => None,
            Err(e) => return Err(e),
        };
        elections.push(ElectionReport { election, results });
    }

    Ok(ReplayReport {
        outcomes,
        elections,
        stats: state.stats(),
        audit: state.audit().map_err(|e| e.to_string()),
    })
}

fn replay_entry(
    state: &VotingState,
    clock: &ManualClock,
    index: usize,
    entry: serde_json::Value,
) -> EnvelopeOutcome {
    let tx: Transaction = match serde_json::from_value(entry) {
        Ok(tx) => tx,
        Err(e) => {
            return EnvelopeOutcome {
                index,
                kind: None,
                tx_id: None,
                result: Err(format!("malformed envelope: {}", e)),
            }
        }
    };

    let kind = tx.payload().kind();
    let tx_id = tx.hash();

    let result = VerifiedTransaction::new(tx)
        .and_then(|verified| {
            clock.set(verified.payload().timestamp());
            state.apply(&verified)
        })
        .map(|receipt| describe(&receipt))
        .map_err(|e| e.to_string());

    debug!("Replayed envelope {} ({}): ok={}", index, kind, result.is_ok());

    EnvelopeOutcome {
        index,
        kind: Some(kind),
        tx_id: Some(tx_id),
        result,
    }
}

/// One-line summary of a receipt
pub fn describe(receipt: &Receipt) -> String {
    match receipt {
        Receipt::VoterRegistered(v) => format!("voter {} registered", v.id),
        Receipt::CandidateRegistered(c) => {
            format!("candidate {} registered in election {}", c.id, c.election_id)
        }
        Receipt::ElectionCreated(e) => format!("election {} created ({})", e.id, e.status),
        Receipt::VoteCast(c) => format!(
            "vote counted for {} in election {} (now {})",
            c.id, c.election_id, c.vote_count
        ),
        Receipt::VoterReviewed(v) => format!("voter {} {}", v.id, v.status),
        Receipt::CandidateReviewed(c) => {
            format!("candidate {} in election {} {}", c.id, c.election_id, c.status)
        }
    }
}
