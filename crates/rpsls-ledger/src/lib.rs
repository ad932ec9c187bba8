//! RPSLS Ledger Library
//!
//! Shared primitives at the boundary between game clients and the ledger:
//! - Addresses, transaction references and amounts
//! - Commitment and Salt for the commit-reveal scheme
//! - LedgerClient trait, MockLedger and the clock abstraction

pub mod clock;
pub mod crypto;
pub mod ledger;
pub mod types;

pub use clock::{Clock, SimClock, SystemClock};
pub use crypto::{Commitment, Salt};
pub use ledger::{
    Deployment, GameSnapshot, LedgerClient, LedgerError, MockLedger, MockLedgerClient,
    LEDGER_TIMEOUT_SECS,
};
pub use types::{Address, MoveCode, ParseHexError, TxRef, Wei, NO_MOVE};
