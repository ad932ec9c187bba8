//! The locally tracked game record.

use super::types::{GameId, GameState, MoveSecret, Outcome, Role};
use crate::crypto::make_commitment;
use crate::games::{GameResult, Move};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rpsls_ledger::{Address, Commitment, GameSnapshot, TxRef, Wei};
use serde::{Deserialize, Serialize};

/// One game this client created or joined.
///
/// Every field past the identity block is optional with a serde default, so
/// records written by older versions keep loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Ledger address; zero while `Created`
    pub id: GameId,
    pub role: Role,
    pub creator: Address,
    pub opponent: Address,
    /// Per-player stake
    pub stake: Wei,
    pub state: GameState,

    #[serde(default)]
    pub commitment: Option<Commitment>,
    /// Creator only
    #[serde(default)]
    pub secret: Option<MoveSecret>,
    #[serde(default)]
    pub opponent_move: Option<Move>,
    #[serde(default)]
    pub outcome: Option<Outcome>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revealed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Ledger timestamp (unix seconds) of the last state-changing call
    #[serde(default)]
    pub last_action: Option<u64>,

    #[serde(default)]
    pub deploy_tx: Option<TxRef>,
    #[serde(default)]
    pub join_tx: Option<TxRef>,
    #[serde(default)]
    pub reveal_tx: Option<TxRef>,
    #[serde(default)]
    pub timeout_tx: Option<TxRef>,
}

impl Game {
    /// A new game on the creator's side, before submission
    pub fn draft(
        creator: Address,
        opponent: Address,
        stake: Wei,
        secret: MoveSecret,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Address::ZERO,
            role: Role::Creator,
            creator,
            opponent,
            stake,
            state: GameState::Created,
            commitment: Some(make_commitment(secret.mv, &secret.salt)),
            secret: Some(secret),
            opponent_move: None,
            outcome: None,
            created_at: Some(now),
            joined_at: None,
            revealed_at: None,
            completed_at: None,
            last_action: None,
            deploy_tx: None,
            join_tx: None,
            reveal_tx: None,
            timeout_tx: None,
        }
    }

    /// An open game seen from the opponent's side, before joining
    pub fn from_snapshot(id: GameId, snapshot: &GameSnapshot) -> Self {
        Self {
            id,
            role: Role::Opponent,
            creator: snapshot.creator,
            opponent: snapshot.opponent,
            stake: snapshot.stake_remaining,
            state: GameState::WaitingForOpponent,
            commitment: Some(snapshot.commitment),
            secret: None,
            opponent_move: None,
            outcome: None,
            created_at: Some(secs_to_time(snapshot.last_action)),
            joined_at: None,
            revealed_at: None,
            completed_at: None,
            last_action: Some(snapshot.last_action),
            deploy_tx: None,
            join_tx: None,
            reveal_tx: None,
            timeout_tx: None,
        }
    }

    /// This client's own account in the game
    pub fn me(&self) -> Address {
        match self.role {
            Role::Creator => self.creator,
            Role::Opponent => self.opponent,
        }
    }

    /// The other participant
    pub fn counterparty(&self) -> Address {
        match self.role {
            Role::Creator => self.opponent,
            Role::Opponent => self.creator,
        }
    }

    /// This client's move, when it knows it
    pub fn my_move(&self) -> Option<Move> {
        match self.role {
            Role::Creator => self.secret.as_ref().map(|s| s.mv),
            Role::Opponent => self.opponent_move,
        }
    }

    /// When the current deadline started running
    pub fn deadline_reference(&self) -> Option<DateTime<Utc>> {
        let entered = match self.state {
            GameState::WaitingForOpponent => self.created_at,
            GameState::WaitingForReveal => self.joined_at,
            _ => return None,
        };
        self.last_action.map(secs_to_time).or(entered)
    }

    /// When the counterparty's deadline expires in the current state
    pub fn deadline(&self, timeout: Duration) -> Option<DateTime<Utc>> {
        self.deadline_reference().map(|start| start + timeout)
    }

    /// Time left before a timeout can be claimed; zero once claimable
    pub fn time_remaining(&self, now: DateTime<Utc>, timeout: Duration) -> Option<Duration> {
        self.deadline(timeout)
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    /// Record a newer ledger timestamp; returns whether anything changed
    pub fn observe_last_action(&mut self, secs: u64) -> bool {
        match self.last_action {
            Some(current) if current >= secs => false,
            _ => {
                self.last_action = Some(secs);
                true
            }
        }
    }

    /// Winning side, if decided and visible to this client
    pub fn winner(&self) -> Option<Role> {
        self.outcome.and_then(|o| o.winner())
    }

    /// Advisory amount this client receives at payout
    pub fn payout(&self) -> Option<Wei> {
        let outcome = self.outcome?;
        // Only one stake is in the pot if the opponent never joined.
        let pot = if self.opponent_move.is_some() {
            self.stake.saturating_mul(2)
        } else {
            self.stake
        };
        Some(match outcome {
            Outcome::Resolved(GameResult::Tie) => self.stake,
            Outcome::Undisclosed => return None,
            _ if outcome.winner() == Some(self.role) => pot,
            _ => 0,
        })
    }

    /// Human-readable status from this client's point of view
    pub fn label(&self) -> String {
        if !self.state.is_terminal() && self.state != GameState::Revealed {
            return capitalize(self.state.as_str());
        }
        match self.outcome {
            Some(Outcome::Resolved(GameResult::Tie)) => "Tie! Funds split equally".to_string(),
            Some(Outcome::Resolved(_)) if self.winner() == Some(self.role) => {
                "You won!".to_string()
            }
            Some(Outcome::Resolved(_)) => "You lost".to_string(),
            Some(Outcome::TimeoutWin(role)) if role == self.role => {
                "Timeout - You won!".to_string()
            }
            Some(Outcome::TimeoutWin(_)) => "Timeout - You lost".to_string(),
            Some(Outcome::Undisclosed) | None => "Game completed".to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn secs_to_time(secs: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs.min(i64::MAX as u64) as i64, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
