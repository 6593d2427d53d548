//! CIVICA Voting Module
//! 
//! Implements the election domain on top of signed transactions:
//! - Transaction envelopes with frozen content hashes
//! - Voter and candidate registration with review gating
//! - Time-windowed elections
//! - Double-vote prevention and tallying

pub mod transaction;
pub mod model;
pub mod engine;

pub use transaction::*;
pub use model::*;
pub use engine::*;
