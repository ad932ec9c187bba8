//! Transition rules for a single game.
//!
//! | From               | Event           | Guard                              | To                 |
//! |--------------------|-----------------|------------------------------------|--------------------|
//! | Created            | Submitted       | ledger accepted the deployment     | WaitingForOpponent |
//! | WaitingForOpponent | OpponentJoined  | stake matches                      | WaitingForReveal   |
//! | WaitingForOpponent | ClaimTimeout    | creator claims, deadline passed    | TimedOut           |
//! | WaitingForReveal   | Reveal          | creator, secret matches commitment | Revealed           |
//! | WaitingForReveal   | ClaimTimeout    | opponent claims, deadline passed   | TimedOut           |
//! | any submitted, non-terminal | PayoutObserved | stake observed as zero    | Completed          |

use super::game::{secs_to_time, Game};
use super::types::{GameId, GameState, MoveSecret, Outcome, Role};
use crate::error::{GameError, ProtocolViolation, Result};
use crate::games::{determine_winner, Move};
use chrono::{DateTime, Duration, Utc};
use rpsls_ledger::Wei;

/// Something that happened to a game, locally confirmed or observed on the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// The ledger accepted the deployment and assigned an address
    Submitted { game: GameId },
    /// The opponent played. `last_action` is the ledger time when observed there.
    OpponentJoined {
        opponent_move: Move,
        stake: Wei,
        last_action: Option<u64>,
    },
    /// The creator revealed the committed move
    Reveal { secret: MoveSecret },
    /// Forfeiture claimed against `defaulter`, the side that missed its deadline
    ClaimTimeout { defaulter: Role },
    /// Ledger shows zero stake remaining
    PayoutObserved { opponent_move: Option<Move> },
}

impl GameEvent {
    pub fn action(&self) -> &'static str {
        match self {
            GameEvent::Submitted { .. } => "submit",
            GameEvent::OpponentJoined { .. } => "join",
            GameEvent::Reveal { .. } => "reveal",
            GameEvent::ClaimTimeout { .. } => "claim timeout",
            GameEvent::PayoutObserved { .. } => "complete",
        }
    }
}

/// A state change that was applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: GameState,
    pub to: GameState,
}

/// Validates and applies game events
#[derive(Clone, Copy, Debug)]
pub struct StateMachine {
    timeout: Duration,
}

impl StateMachine {
    pub fn new(timeout: std::time::Duration) -> Self {
        // Ledger timestamps have seconds precision.
        let secs = timeout.as_secs().min(i64::MAX as u64 / 1_000) as i64;
        Self {
            timeout: Duration::seconds(secs),
        }
    }

    /// Deadline for both "opponent must join" and "creator must reveal"
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// State the game would move to, or why it cannot. Does not mutate.
    pub fn check(&self, game: &Game, event: &GameEvent, now: DateTime<Utc>) -> Result<GameState> {
        use GameState::*;

        if game.state.is_terminal() {
            return Err(ProtocolViolation::Terminal(game.state).into());
        }

        match (game.state, event) {
            (Created, GameEvent::Submitted { .. }) => Ok(WaitingForOpponent),

            (WaitingForOpponent, GameEvent::OpponentJoined { stake, .. }) => {
                if *stake != game.stake {
                    return Err(ProtocolViolation::StakeMismatch {
                        expected: game.stake,
                        actual: *stake,
                    }
                    .into());
                }
                Ok(WaitingForReveal)
            }

            (WaitingForReveal, GameEvent::Reveal { secret }) => {
                if game.role != Role::Creator {
                    return Err(ProtocolViolation::WrongRole {
                        action: "reveal",
                        required: Role::Creator,
                    }
                    .into());
                }
                let commitment = game.commitment.ok_or(ProtocolViolation::MissingSecret)?;
                if !commitment.verify(secret.mv.code(), &secret.salt) {
                    return Err(GameError::CommitmentMismatch(game.id));
                }
                Ok(Revealed)
            }

            (state, GameEvent::ClaimTimeout { defaulter }) => {
                let deadline_state = match defaulter {
                    Role::Opponent => WaitingForOpponent,
                    Role::Creator => WaitingForReveal,
                };
                if state != deadline_state {
                    return Err(ProtocolViolation::InvalidState {
                        action: event.action(),
                        state,
                    }
                    .into());
                }
                if game.role != defaulter.counterparty() {
                    return Err(ProtocolViolation::WrongRole {
                        action: "claim this timeout",
                        required: defaulter.counterparty(),
                    }
                    .into());
                }
                let remaining = game
                    .time_remaining(now, self.timeout)
                    .unwrap_or(self.timeout);
                if remaining > Duration::zero() {
                    return Err(ProtocolViolation::DeadlineNotReached {
                        remaining_secs: remaining.num_seconds().max(1) as u64,
                    }
                    .into());
                }
                Ok(TimedOut)
            }

            (WaitingForOpponent | WaitingForReveal | Revealed, GameEvent::PayoutObserved { .. }) => {
                Ok(Completed)
            }

            (state, event) => Err(ProtocolViolation::InvalidState {
                action: event.action(),
                state,
            }
            .into()),
        }
    }

    /// Apply an event. On error the game is left untouched.
    pub fn apply(&self, game: &mut Game, event: GameEvent, now: DateTime<Utc>) -> Result<Transition> {
        let to = self.check(game, &event, now)?;
        let from = game.state;

        match event {
            GameEvent::Submitted { game: id } => {
                game.id = id;
            }
            GameEvent::OpponentJoined {
                opponent_move,
                last_action,
                ..
            } => {
                game.opponent_move = Some(opponent_move);
                game.joined_at = Some(last_action.map(secs_to_time).unwrap_or(now));
                game.last_action = last_action;
            }
            GameEvent::Reveal { secret } => {
                game.revealed_at = Some(now);
                if let Some(opponent_move) = game.opponent_move {
                    game.outcome = Some(Outcome::Resolved(determine_winner(
                        secret.mv,
                        opponent_move,
                    )));
                }
            }
            GameEvent::ClaimTimeout { defaulter } => {
                game.outcome = Some(Outcome::TimeoutWin(defaulter.counterparty()));
                game.completed_at = Some(now);
            }
            GameEvent::PayoutObserved { opponent_move } => {
                if game.opponent_move.is_none() {
                    game.opponent_move = opponent_move;
                }
                game.outcome = Some(settled_outcome(game, from));
                game.completed_at = Some(now);
            }
        }

        game.state = to;
        Ok(Transition { from, to })
    }
}

/// Outcome once the ledger shows the pot paid out.
///
/// The opponent never learns the creator's move, so it only sees "completed".
/// A creator that never revealed can only have been paid out by a timeout.
fn settled_outcome(game: &Game, from: GameState) -> Outcome {
    match game.role {
        Role::Opponent => Outcome::Undisclosed,
        Role::Creator => match (from, game.secret.as_ref(), game.opponent_move) {
            (GameState::Revealed, Some(secret), Some(opponent_move)) => {
                Outcome::Resolved(determine_winner(secret.mv, opponent_move))
            }
            (GameState::Revealed, _, _) => Outcome::Undisclosed,
            (_, _, Some(_)) => Outcome::TimeoutWin(Role::Opponent),
            (_, _, None) => Outcome::TimeoutWin(Role::Creator),
        },
    }
}
