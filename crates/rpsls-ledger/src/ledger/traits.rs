//! Ledger client trait definition.

use crate::crypto::{Commitment, Salt};
use crate::types::{Address, MoveCode, TxRef, Wei, NO_MOVE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Game not found: {0}")]
    GameNotFound(Address),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Wei, available: Wei },

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,
}

/// Result of deploying a new game contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Address assigned to the game
    pub game: Address,
    /// Deploy transaction
    pub tx: TxRef,
}

/// Authoritative view of one game as read from the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub creator: Address,
    pub opponent: Address,
    /// Per-player stake still held; zero once the game has paid out
    pub stake_remaining: Wei,
    /// Opponent's plaintext move, `NO_MOVE` until they join
    pub opponent_move: MoveCode,
    pub commitment: Commitment,
    /// Unix seconds of the last state-changing call
    pub last_action: u64,
}

impl GameSnapshot {
    pub fn opponent_joined(&self) -> bool {
        self.opponent_move != NO_MOVE
    }

    pub fn is_settled(&self) -> bool {
        self.stake_remaining == 0
    }
}

/// Trait for ledger operations on two-player commit-reveal games
///
/// Every submission is made on behalf of the client's own account.
/// Implementations can be:
/// - `MockLedgerClient` for testing and demos
/// - A real chain client for production
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account this client signs for
    fn account(&self) -> Address;

    /// Deploy a game holding `commitment` against `opponent`, staking `stake`
    async fn deploy(
        &self,
        commitment: &Commitment,
        opponent: Address,
        stake: Wei,
    ) -> Result<Deployment, LedgerError>;

    /// Join a game with a plaintext move, matching its stake
    async fn join(&self, game: Address, move_code: MoveCode, stake: Wei)
        -> Result<TxRef, LedgerError>;

    /// Reveal the committed move; the ledger verifies it and pays out
    async fn reveal(&self, game: Address, move_code: MoveCode, salt: &Salt)
        -> Result<TxRef, LedgerError>;

    /// Claim the pot because the creator did not reveal in time
    async fn claim_creator_timeout(&self, game: Address) -> Result<TxRef, LedgerError>;

    /// Reclaim the stake because the opponent did not join in time
    async fn claim_opponent_timeout(&self, game: Address) -> Result<TxRef, LedgerError>;

    /// Read the current on-ledger state of a game
    async fn read_state(&self, game: Address) -> Result<GameSnapshot, LedgerError>;
}
