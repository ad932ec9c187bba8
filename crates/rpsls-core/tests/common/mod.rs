//! Shared setup for integration tests.

#![allow(dead_code)]

use chrono::Utc;
use rpsls_core::{ClientConfig, GameManager, GameStore};
use rpsls_ledger::{Address, MockLedger, MockLedgerClient, SimClock};
use std::sync::Arc;

pub const STAKE: u128 = 1_000;
pub const FUNDING: u128 = 10_000;

pub type Player = GameManager<MockLedgerClient>;

/// Ledger with its clock pinned to now
pub fn ledger() -> MockLedger {
    MockLedger::with_clock(SimClock::at(Utc::now()))
}

pub fn player(ledger: &MockLedger) -> Player {
    player_with(ledger, Address::random(), GameStore::in_memory(), ClientConfig::default())
}

pub fn player_with(
    ledger: &MockLedger,
    account: Address,
    store: GameStore,
    config: ClientConfig,
) -> Player {
    ledger.fund(account, FUNDING);
    GameManager::new(ledger.connect(account), store, Arc::new(ledger.clock()), config)
}
