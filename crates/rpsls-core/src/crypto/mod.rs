//! Commitment scheme for the creator's hidden move.
//!
//! `Commitment` and `Salt` live in rpsls-ledger so the ledger can verify
//! reveals with the exact same hash.

mod scheme;

pub use rpsls_ledger::{Commitment, Salt};
pub use scheme::{generate_salt, generate_unique_salt, make_commitment, verify_reveal};
