//! Signed transaction envelopes for voting payloads
//!
//! An envelope is built in two steps. A [`TransactionDraft`] holds the payload
//! and nonce and may be edited freely. [`TransactionDraft::finalize`] freezes
//! the content and computes its hash, producing a [`Transaction`] whose
//! content can no longer change. Only a finalized transaction can be signed
//! or verified.

use civica_core::{
    CivicaError, CivicaResult, Hash, Hashable, Nonce, PublicKey, Signable, Signature, Timestamp,
    TxId,
};
use civica_crypto::hashing::hash_multiple;
use civica_crypto::keys::KeyPair;
use civica_crypto::signing::{sign, verify};
use serde::{Deserialize, Serialize};

const TX_DOMAIN: &[u8] = b"CIVICA_TX:";

/// Register a voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub voter_id: String,
    pub document_hash: String,
    pub voter_public_key: PublicKey,
    pub timestamp: Timestamp,
}

/// Register a candidate for an election
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegistration {
    pub candidate_id: String,
    pub election_id: String,
    pub profile_hash: String,
    pub candidate_public_key: PublicKey,
    pub timestamp: Timestamp,
}

/// Create an election with voting window `[start_time, end_time)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCreation {
    pub election_id: String,
    pub title: String,
    pub description: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub admin_public_key: PublicKey,
    pub timestamp: Timestamp,
}

/// Cast a vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: String,
    pub candidate_id: String,
    pub voter_public_key: PublicKey,
    pub timestamp: Timestamp,
}

/// Outcome of a registration review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Approve or reject a voter. The envelope signer is the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterReview {
    pub voter_id: String,
    pub decision: ReviewDecision,
    pub timestamp: Timestamp,
}

/// Approve or reject a candidate. The envelope signer must be the election admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateReview {
    pub election_id: String,
    pub candidate_id: String,
    pub decision: ReviewDecision,
    pub timestamp: Timestamp,
}

/// Every transaction kind understood by the voting state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    VoterRegistration(VoterRegistration),
    CandidateRegistration(CandidateRegistration),
    ElectionCreation(ElectionCreation),
    Vote(Vote),
    VoterReview(VoterReview),
    CandidateReview(CandidateReview),
}

impl Payload {
    /// Short name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::VoterRegistration(_) => "voter_registration",
            Payload::CandidateRegistration(_) => "candidate_registration",
            Payload::ElectionCreation(_) => "election_creation",
            Payload::Vote(_) => "vote",
            Payload::VoterReview(_) => "voter_review",
            Payload::CandidateReview(_) => "candidate_review",
        }
    }

    /// Key the payload acts on behalf of, which must also sign it
    ///
    /// Reviews carry no key of their own; their signer is checked by the
    /// state as the reviewer.
    pub fn originator(&self) -> Option<&PublicKey> {
        match self {
            Payload::VoterRegistration(p) => Some(&p.voter_public_key),
            Payload::CandidateRegistration(p) => Some(&p.candidate_public_key),
            Payload::ElectionCreation(p) => Some(&p.admin_public_key),
            Payload::Vote(p) => Some(&p.voter_public_key),
            Payload::VoterReview(_) | Payload::CandidateReview(_) => None,
        }
    }

    /// Client-side creation time carried by the payload
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Payload::VoterRegistration(p) => p.timestamp,
            Payload::CandidateRegistration(p) => p.timestamp,
            Payload::ElectionCreation(p) => p.timestamp,
            Payload::Vote(p) => p.timestamp,
            Payload::VoterReview(p) => p.timestamp,
            Payload::CandidateReview(p) => p.timestamp,
        }
    }
}

/// Unfinalized envelope contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub payload: Payload,
    pub nonce: Nonce,
}

impl TransactionDraft {
    /// Start a draft with a random nonce
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            nonce: Nonce::new(rand::random()),
        }
    }

    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = nonce;
        self
    }

    /// Freeze the contents and compute the transaction hash
    pub fn finalize(self) -> CivicaResult<Transaction> {
        let hash = content_hash(&self.payload, self.nonce)?;
        Ok(Transaction {
            payload: self.payload,
            nonce: self.nonce,
            signer: None,
            signature: None,
            hash,
        })
    }

    /// Finalize and sign in one step
    pub fn sign(self, keypair: &KeyPair) -> CivicaResult<Transaction> {
        let mut tx = self.finalize()?;
        tx.sign(keypair);
        Ok(tx)
    }
}

/// Digest over the immutable envelope content. Signer and signature are excluded.
fn content_hash(payload: &Payload, nonce: Nonce) -> CivicaResult<Hash> {
    let payload_bytes = bincode::serialize(payload)?;
    Ok(hash_multiple(&[TX_DOMAIN, &payload_bytes, &nonce.0.to_le_bytes()]))
}

/// Serialized form of an envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub payload: Payload,
    pub nonce: Nonce,
    #[serde(default)]
    pub signer: Option<PublicKey>,
    #[serde(default)]
    pub signature: Option<Signature>,
}

/// Finalized transaction envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeRecord", into = "EnvelopeRecord")]
pub struct Transaction {
    payload: Payload,
    nonce: Nonce,
    signer: Option<PublicKey>,
    signature: Option<Signature>,
    hash: Hash,
}

impl Transaction {
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    pub fn signer(&self) -> Option<&PublicKey> {
        self.signer.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Sign the transaction hash and record the signer
    ///
    /// Signing again replaces the previous signer and signature.
    pub fn sign(&mut self, keypair: &KeyPair) {
        let signature = sign(keypair, &self.signing_bytes());
        self.signer = Some(keypair.public_key());
        self.signature = Some(signature);
    }

    /// Verify the signature against the recorded signer
    ///
    /// A payload that names its own key (a registration, an election's admin
    /// or a vote) must be signed by that key, otherwise `Unauthorized`.
    pub fn verify(&self) -> CivicaResult<()> {
        let (signer, signature) = match (&self.signer, &self.signature) {
            (Some(signer), Some(signature)) => (signer, signature),
            _ => return Err(CivicaError::InvalidSignature),
        };

        if content_hash(&self.payload, self.nonce)? != self.hash {
            return Err(CivicaError::InvalidSignature);
        }

        verify(signer, &self.signing_bytes(), signature)?;

        match self.payload.originator() {
            Some(originator) if originator != signer => Err(CivicaError::Unauthorized(format!(
                "{} payload for key {} signed by {}",
                self.payload.kind(),
                originator,
                signer
            ))),
            _ => Ok(()),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> CivicaResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> CivicaResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| CivicaError::DeserializationError(e.to_string()))
    }

    pub fn to_json(&self) -> CivicaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> CivicaResult<Self> {
        serde_json::from_str(json).map_err(|e| CivicaError::DeserializationError(e.to_string()))
    }
}

impl Hashable for Transaction {
    fn hash(&self) -> Hash {
        self.hash
    }
}

impl Signable for Transaction {
    fn signing_bytes(&self) -> Vec<u8> {
        self.hash.as_bytes().to_vec()
    }
}

impl TryFrom<EnvelopeRecord> for Transaction {
    type Error = CivicaError;

    fn try_from(record: EnvelopeRecord) -> Result<Self, Self::Error> {
        let hash = content_hash(&record.payload, record.nonce)?;
        Ok(Self {
            payload: record.payload,
            nonce: record.nonce,
            signer: record.signer,
            signature: record.signature,
            hash,
        })
    }
}

impl From<Transaction> for EnvelopeRecord {
    fn from(tx: Transaction) -> Self {
        Self {
            payload: tx.payload,
            nonce: tx.nonce,
            signer: tx.signer,
            signature: tx.signature,
        }
    }
}

/// Transaction whose signature has been checked
#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    tx: Transaction,
    signer: PublicKey,
}

impl VerifiedTransaction {
    /// Verify a transaction
    pub fn new(tx: Transaction) -> CivicaResult<Self> {
        tx.verify()?;
        let signer = tx.signer.ok_or(CivicaError::InvalidSignature)?;
        Ok(Self { tx, signer })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn payload(&self) -> &Payload {
        &self.tx.payload
    }

    /// Key that signed the transaction
    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    pub fn id(&self) -> TxId {
        self.tx.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(keypair: &KeyPair) -> Payload {
        Payload::VoterRegistration(VoterRegistration {
            voter_id: "voter-1".into(),
            document_hash: "QmDocument".into(),
            voter_public_key: keypair.public_key(),
            timestamp: Timestamp::from_secs(1_700_000_000),
        })
    }

    #[test]
    fn test_hash_is_stable() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp))
            .with_nonce(Nonce::new(7))
            .finalize()
            .unwrap();

        assert_eq!(tx.hash(), tx.hash());
        assert_ne!(tx.hash(), Hash::ZERO);

        let same = TransactionDraft::new(registration(&kp))
            .with_nonce(Nonce::new(7))
            .finalize()
            .unwrap();
        assert_eq!(tx.hash(), same.hash());
    }

    #[test]
    fn test_nonce_changes_hash() {
        let kp = KeyPair::generate();
        let a = TransactionDraft::new(registration(&kp)).with_nonce(Nonce::new(1)).finalize().unwrap();
        let b = TransactionDraft::new(registration(&kp)).with_nonce(Nonce::new(2)).finalize().unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_signing_does_not_change_hash() {
        let kp = KeyPair::generate();
        let mut tx = TransactionDraft::new(registration(&kp)).finalize().unwrap();
        let before = tx.hash();

        tx.sign(&kp);

        assert_eq!(tx.hash(), before);
        assert_eq!(tx.signer(), Some(&kp.public_key()));
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).sign(&kp).unwrap();

        assert!(tx.is_signed());
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn test_unsigned_fails_verification() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).finalize().unwrap();

        assert!(matches!(tx.verify(), Err(CivicaError::InvalidSignature)));
        assert!(matches!(
            VerifiedTransaction::new(tx),
            Err(CivicaError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_fields_fail_verification() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).sign(&kp).unwrap();

        // Altered nonce
        let mut tampered = tx.clone();
        tampered.nonce = Nonce::new(tx.nonce().0.wrapping_add(1));
        assert!(matches!(tampered.verify(), Err(CivicaError::InvalidSignature)));

        // Altered payload
        let mut tampered = tx.clone();
        if let Payload::VoterRegistration(p) = &mut tampered.payload {
            p.voter_id = "voter-2".into();
        }
        assert!(matches!(tampered.verify(), Err(CivicaError::InvalidSignature)));

        // Replaced signer
        let mut tampered = tx.clone();
        tampered.signer = Some(KeyPair::generate().public_key());
        assert!(matches!(tampered.verify(), Err(CivicaError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_wire_envelope_fails_verification() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).sign(&kp).unwrap();

        let mut record = EnvelopeRecord::from(tx.clone());
        if let Payload::VoterRegistration(p) = &mut record.payload {
            p.document_hash = "QmForged".into();
        }
        let forged = Transaction::try_from(record).unwrap();

        assert_ne!(forged.hash(), tx.hash());
        assert!(matches!(forged.verify(), Err(CivicaError::InvalidSignature)));
    }

    #[test]
    fn test_json_roundtrip_keeps_identity() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).sign(&kp).unwrap();

        let json = tx.to_json().unwrap();
        assert!(json.contains("voter_registration"));

        let back = Transaction::from_json(&json).unwrap();
        assert_eq!(back.hash(), tx.hash());
        assert!(back.verify().is_ok());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&kp)).sign(&kp).unwrap();

        let back = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(back.hash(), tx.hash());
        assert!(back.verify().is_ok());

        assert!(matches!(
            Transaction::from_bytes(&[0xff, 0x01]),
            Err(CivicaError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_verified_transaction_exposes_signer() {
        let voter = KeyPair::generate();
        let tx = TransactionDraft::new(registration(&voter)).sign(&voter).unwrap();
        let verified = VerifiedTransaction::new(tx).unwrap();

        assert_eq!(verified.signer(), &voter.public_key());
        assert_eq!(verified.payload().kind(), "voter_registration");
        assert_eq!(verified.id(), verified.tx().hash());
    }

    #[test]
    fn test_payload_key_must_sign() {
        let voter = KeyPair::generate();
        let other = KeyPair::generate();

        // A valid signature by someone other than the registering key
        let tx = TransactionDraft::new(registration(&voter)).sign(&other).unwrap();
        assert!(matches!(tx.verify(), Err(CivicaError::Unauthorized(_))));
        assert!(matches!(
            VerifiedTransaction::new(tx),
            Err(CivicaError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_reviews_have_no_originator() {
        let review = Payload::VoterReview(VoterReview {
            voter_id: "voter-1".into(),
            decision: ReviewDecision::Approve,
            timestamp: Timestamp::from_secs(1_700_000_000),
        });
        assert_eq!(review.originator(), None);

        let registrar = KeyPair::generate();
        let tx = TransactionDraft::new(review).sign(&registrar).unwrap();
        assert!(VerifiedTransaction::new(tx).is_ok());

        let kp = KeyPair::generate();
        assert_eq!(registration(&kp).originator(), Some(&kp.public_key()));
    }

    #[test]
    fn test_shared_across_threads_after_finalize() {
        let kp = KeyPair::generate();
        let tx = std::sync::Arc::new(TransactionDraft::new(registration(&kp)).sign(&kp).unwrap());
        let expected = tx.hash();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    assert!(tx.verify().is_ok());
                    tx.hash()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
