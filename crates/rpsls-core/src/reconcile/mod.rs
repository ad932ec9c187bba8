//! Keeps tracked games consistent with the ledger.

mod engine;
mod poller;

pub use engine::{apply_snapshot, plan, CycleReport, ReconciliationEngine};
pub use poller::Poller;
