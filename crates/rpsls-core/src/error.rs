//! Error taxonomy for game actions.

use crate::protocol::{GameId, GameState, Role};
use rpsls_ledger::{Address, LedgerError, Wei};
use thiserror::Error;

/// A local action or observed event that the state machine refuses.
/// Always raised before anything is submitted to the ledger.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: GameState,
    },

    #[error("game is already finished ({0})")]
    Terminal(GameState),

    #[error("only the {required} can {action}")]
    WrongRole {
        action: &'static str,
        required: Role,
    },

    #[error("stake mismatch: game holds {expected}, got {actual}")]
    StakeMismatch { expected: Wei, actual: Wei },

    #[error("timeout not reached: {remaining_secs}s remaining")]
    DeadlineNotReached { remaining_secs: u64 },

    #[error("stake must be greater than zero")]
    ZeroStake,

    #[error("invalid opponent address {0}")]
    InvalidOpponent(Address),

    #[error("invalid move index {0}")]
    InvalidMoveIndex(usize),

    #[error("invalid move code {0}")]
    InvalidMoveCode(u8),

    #[error("move and salt are not available for this game")]
    MissingSecret,

    #[error("{account} is not the designated opponent of game {game}")]
    NotDesignatedOpponent { game: GameId, account: Address },

    #[error("game {0} is not open for joining")]
    NotJoinable(GameId),

    #[error("game {0} is already tracked")]
    AlreadyTracked(GameId),
}

/// Errors from game commands
#[derive(Debug, Error)]
pub enum GameError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Stored move/salt no longer reproduce the commitment. Retrying cannot help.
    #[error("stored move and salt do not match the commitment of game {0}")]
    CommitmentMismatch(GameId),

    /// The ledger refused the submission; passed through untouched
    #[error("ledger rejected the request: {0}")]
    External(#[from] LedgerError),

    #[error("game not found: {0}")]
    NotFound(GameId),
}

impl GameError {
    /// Whether the same call may succeed later without local changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GameError::External(LedgerError::NetworkError(_) | LedgerError::Timeout)
        )
    }
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
