//! RPSLS Core Library
//!
//! This crate provides the client side of the commit-reveal
//! Rock-Paper-Scissors-Lizard-Spock wagering protocol: move resolution, the
//! per-game state machine, the local game store, and the reconciliation
//! engine that keeps it in step with the ledger.

pub mod config;
pub mod crypto;
pub mod error;
pub mod games;
pub mod manager;
pub mod protocol;
pub mod reconcile;
pub mod state;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use crypto::{generate_salt, make_commitment, verify_reveal, Commitment, Salt};
pub use error::{GameError, ProtocolViolation, Result};
pub use games::{beats, determine_winner, GameResult, Move};
pub use manager::GameManager;
pub use protocol::{Game, GameEvent, GameId, GameState, MoveSecret, Outcome, Role, StateMachine};
pub use reconcile::{CycleReport, Poller, ReconciliationEngine};
pub use state::{ChangeCause, GamesChanged};
pub use store::{FileStorage, GameStore, MemoryStorage, Storage, StoreError};
