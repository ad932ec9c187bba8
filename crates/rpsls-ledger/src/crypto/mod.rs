//! Cryptographic primitives shared by the client and the ledger.

mod commitment;

pub use commitment::{Commitment, Salt};
