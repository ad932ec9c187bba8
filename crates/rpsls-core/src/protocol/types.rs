//! Protocol types.

use crate::games::{GameResult, Move};
use rpsls_ledger::{Address, Salt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Games are identified by their ledger address
pub type GameId = Address;

/// Which side of a game the local participant plays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Player 1: commits a hidden move and reveals it later
    Creator,
    /// Player 2: joins with a plaintext move
    Opponent,
}

impl Role {
    /// Get the other side
    pub fn counterparty(&self) -> Role {
        match self {
            Role::Creator => Role::Opponent,
            Role::Opponent => Role::Creator,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Creator => write!(f, "creator"),
            Role::Opponent => write!(f, "opponent"),
        }
    }
}

/// Lifecycle of a game. States only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Commitment formed locally, not yet accepted by the ledger
    Created,
    /// Stake and commitment on the ledger, opponent has not joined
    WaitingForOpponent,
    /// Opponent joined; creator has not revealed
    WaitingForReveal,
    /// Creator revealed; payout not yet observed
    Revealed,
    /// Ledger shows the stake paid out
    Completed,
    /// A side forfeited by missing its deadline
    TimedOut,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::Completed | GameState::TimedOut)
    }

    /// Submitted to the ledger and still in play
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            GameState::WaitingForOpponent | GameState::WaitingForReveal | GameState::Revealed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Created => "created",
            GameState::WaitingForOpponent => "waiting for opponent",
            GameState::WaitingForReveal => "waiting for reveal",
            GameState::Revealed => "revealed",
            GameState::Completed => "completed",
            GameState::TimedOut => "timed out",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a game ended, or is expected to end once paid out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Moves compared; first = creator, second = opponent
    Resolved(GameResult),
    /// The given side collected after the other missed its deadline
    TimeoutWin(Role),
    /// Finished, but the creator's move is hidden from this side
    Undisclosed,
}

impl Outcome {
    /// Winning side, `None` for ties and undisclosed results
    pub fn winner(&self) -> Option<Role> {
        match self {
            Outcome::Resolved(GameResult::FirstWins) => Some(Role::Creator),
            Outcome::Resolved(GameResult::SecondWins) => Some(Role::Opponent),
            Outcome::Resolved(GameResult::Tie) | Outcome::Undisclosed => None,
            Outcome::TimeoutWin(role) => Some(*role),
        }
    }
}

/// The creator's hidden move and its salt. Never leaves the client before reveal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSecret {
    #[serde(rename = "move")]
    pub mv: Move,
    pub salt: Salt,
}

impl MoveSecret {
    pub fn new(mv: Move, salt: Salt) -> Self {
        Self { mv, salt }
    }
}

impl fmt::Debug for MoveSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MoveSecret(..)")
    }
}
