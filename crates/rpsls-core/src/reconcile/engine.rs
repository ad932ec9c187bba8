//! Mapping ledger snapshots onto state-machine transitions.

use crate::error::Result;
use crate::games::Move;
use crate::protocol::{Game, GameEvent, GameId, GameState, StateMachine};
use crate::state::{ChangeCause, ClientState};
use chrono::{DateTime, Utc};
use rpsls_ledger::{GameSnapshot, LedgerClient, LedgerError};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// The single transition a snapshot implies for a game, if any.
///
/// Zero stake is the only completion signal and wins over everything else.
/// Snapshots that are behind the local state imply nothing.
pub fn plan(game: &Game, snapshot: &GameSnapshot) -> Option<GameEvent> {
    if game.state.is_terminal() || game.state == GameState::Created {
        return None;
    }

    if snapshot.is_settled() {
        return Some(GameEvent::PayoutObserved {
            opponent_move: Move::from_code(snapshot.opponent_move),
        });
    }

    match game.state {
        GameState::WaitingForOpponent if snapshot.opponent_joined() => {
            Move::from_code(snapshot.opponent_move).map(|opponent_move| {
                GameEvent::OpponentJoined {
                    opponent_move,
                    stake: snapshot.stake_remaining,
                    last_action: Some(snapshot.last_action),
                }
            })
        }
        _ => None,
    }
}

/// Fold one snapshot into a game. Returns whether any field changed.
///
/// Applying the same snapshot again is a no-op.
pub fn apply_snapshot(
    machine: &StateMachine,
    game: &mut Game,
    snapshot: &GameSnapshot,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut changed = false;

    if let Some(event) = plan(game, snapshot) {
        let transition = machine.apply(game, event, now)?;
        info!(
            game = %game.id,
            from = %transition.from,
            to = %transition.to,
            "applied observed transition"
        );
        changed = true;
    }

    if !game.state.is_terminal() {
        changed |= game.observe_last_action(snapshot.last_action);
    }

    Ok(changed)
}

/// Result of one reconciliation cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Games whose record changed
    pub changed: Vec<GameId>,
    /// Games whose read or apply failed; retried next cycle
    pub skipped: Vec<GameId>,
}

/// Polls the ledger for every tracked, non-terminal game
pub struct ReconciliationEngine<L> {
    state: Arc<ClientState<L>>,
}

impl<L> Clone for ReconciliationEngine<L> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<L: LedgerClient + 'static> ReconciliationEngine<L> {
    pub fn new(state: Arc<ClientState<L>>) -> Self {
        Self { state }
    }

    /// Run one cycle over every game that can still change.
    ///
    /// Reads run concurrently without holding game locks. Each result is then
    /// applied under that game's lock against its current record, so a stale
    /// read cannot undo a transition confirmed in the meantime.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> CycleReport {
        let tracked: Vec<GameId> = self
            .state
            .store
            .filter(|g| g.state.is_active())
            .into_iter()
            .map(|g| g.id)
            .collect();

        let mut report = CycleReport::default();
        if tracked.is_empty() {
            debug!("no active games to reconcile");
            return report;
        }

        let read_timeout = self.state.config.read_timeout;
        let mut reads = JoinSet::new();
        for id in tracked {
            let state = self.state.clone();
            reads.spawn(async move {
                let snapshot = tokio::time::timeout(read_timeout, state.ledger.read_state(id))
                    .await
                    .unwrap_or(Err(LedgerError::Timeout));
                (id, snapshot)
            });
        }

        while let Some(joined) = reads.join_next().await {
            let (id, snapshot) = match joined {
                Ok(read) => read,
                Err(e) => {
                    warn!(error = %e, "ledger read task failed");
                    continue;
                }
            };

            match snapshot {
                Ok(snapshot) => match self.reconcile(id, &snapshot).await {
                    Ok(true) => report.changed.push(id),
                    Ok(false) => debug!(game = %id, "snapshot matches local state"),
                    Err(e) => {
                        warn!(game = %id, error = %e, "could not apply snapshot, skipping");
                        report.skipped.push(id);
                    }
                },
                Err(e) => {
                    warn!(game = %id, error = %e, "ledger read failed, skipping");
                    report.skipped.push(id);
                }
            }
        }

        self.state
            .notify(report.changed.clone(), ChangeCause::Reconciled);
        report
    }

    /// Apply one snapshot under the game's lock
    async fn reconcile(&self, id: GameId, snapshot: &GameSnapshot) -> Result<bool> {
        let _guard = self.state.locks.lock(id).await;
        let now = self.state.clock.now();
        let machine = self.state.machine;

        self.state
            .store
            .update(&id, |game| {
                // Work on a copy so a refused event leaves the record untouched.
                let mut next = game.clone();
                let changed = apply_snapshot(&machine, &mut next, snapshot, now)?;
                if changed {
                    *game = next;
                }
                Ok(changed)
            })
            .unwrap_or(Ok(false))
    }
}
