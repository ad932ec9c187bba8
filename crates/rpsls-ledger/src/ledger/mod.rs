//! Ledger client abstraction.

mod mock;
mod traits;

pub use mock::{MockLedger, MockLedgerClient, LEDGER_TIMEOUT_SECS};
pub use traits::{Deployment, GameSnapshot, LedgerClient, LedgerError};
