//! Command and query surface for one participant's games.

use crate::config::ClientConfig;
use crate::crypto::generate_unique_salt;
use crate::error::{GameError, ProtocolViolation, Result};
use crate::games::Move;
use crate::protocol::{Game, GameEvent, GameId, MoveSecret, Role};
use crate::reconcile::{CycleReport, Poller, ReconciliationEngine};
use crate::state::{ChangeCause, ClientState, GamesChanged};
use crate::store::GameStore;
use rpsls_ledger::{Address, Clock, LedgerClient, Salt, Wei};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Creates, joins and settles games for the ledger account `L` signs for.
///
/// Every command validates locally first, then submits, then records the
/// confirmed result, all while holding that game's lock. A rejected
/// submission leaves local state untouched.
pub struct GameManager<L> {
    state: Arc<ClientState<L>>,
    poller: Mutex<Option<Poller>>,
}

impl<L: LedgerClient + 'static> GameManager<L> {
    pub fn new(ledger: L, store: GameStore, clock: Arc<dyn Clock>, config: ClientConfig) -> Self {
        Self {
            state: Arc::new(ClientState::new(ledger, store, clock, config)),
            poller: Mutex::new(None),
        }
    }

    /// Account this client plays as
    pub fn account(&self) -> Address {
        self.state.ledger.account()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.state.config
    }

    pub fn ledger(&self) -> &L {
        &self.state.ledger
    }

    // === Commands ===

    /// Commit to the move at `ui_index` and deploy a game against `opponent`
    pub async fn create_game(&self, opponent: Address, stake: Wei, ui_index: usize) -> Result<Game> {
        let mv = Move::from_ui_index(ui_index).ok_or(ProtocolViolation::InvalidMoveIndex(ui_index))?;
        if stake == 0 {
            return Err(ProtocolViolation::ZeroStake.into());
        }
        if opponent.is_zero() || opponent == self.account() {
            return Err(ProtocolViolation::InvalidOpponent(opponent).into());
        }

        let used: Vec<Salt> = self
            .state
            .store
            .all()
            .into_iter()
            .filter_map(|g| g.secret.map(|s| s.salt))
            .collect();
        let secret = MoveSecret::new(mv, generate_unique_salt(used.iter()));

        let now = self.state.clock.now();
        let mut game = Game::draft(self.account(), opponent, stake, secret, now);
        let commitment = game.commitment.ok_or(ProtocolViolation::MissingSecret)?;
        self.state.machine.check(
            &game,
            &GameEvent::Submitted {
                game: Address::ZERO,
            },
            now,
        )?;

        let deployment = self.state.ledger.deploy(&commitment, opponent, stake).await?;

        let _guard = self.state.locks.lock(deployment.game).await;
        self.state.machine.apply(
            &mut game,
            GameEvent::Submitted {
                game: deployment.game,
            },
            now,
        )?;
        game.deploy_tx = Some(deployment.tx);
        self.state.store.insert(game.clone());

        info!(game = %game.id, opponent = %opponent, stake, "created game");
        self.state.notify(vec![game.id], ChangeCause::LocalAction);
        Ok(game)
    }

    /// Join an open game as its designated opponent, playing the move at `ui_index`
    pub async fn join_game(&self, id: GameId, ui_index: usize) -> Result<Game> {
        let mv = Move::from_ui_index(ui_index).ok_or(ProtocolViolation::InvalidMoveIndex(ui_index))?;

        let _guard = self.state.locks.lock(id).await;
        if self.state.store.contains(&id) {
            return Err(ProtocolViolation::AlreadyTracked(id).into());
        }

        let snapshot = self.state.ledger.read_state(id).await?;
        if snapshot.opponent != self.account() {
            return Err(ProtocolViolation::NotDesignatedOpponent {
                game: id,
                account: self.account(),
            }
            .into());
        }
        if snapshot.opponent_joined() || snapshot.is_settled() {
            return Err(ProtocolViolation::NotJoinable(id).into());
        }

        let now = self.state.clock.now();
        let mut game = Game::from_snapshot(id, &snapshot);
        let event = GameEvent::OpponentJoined {
            opponent_move: mv,
            stake: snapshot.stake_remaining,
            last_action: None,
        };
        self.state.machine.check(&game, &event, now)?;

        let tx = self.state.ledger.join(id, mv.code(), game.stake).await?;

        self.state.machine.apply(&mut game, event, now)?;
        game.join_tx = Some(tx);
        self.state.store.insert(game.clone());

        info!(game = %id, stake = game.stake, "joined game");
        self.state.notify(vec![id], ChangeCause::LocalAction);
        Ok(game)
    }

    /// Reveal the committed move of game `id`
    pub async fn reveal_move(&self, id: GameId) -> Result<Game> {
        let _guard = self.state.locks.lock(id).await;
        let game = self.state.store.get(&id).ok_or(GameError::NotFound(id))?;

        let secret = match (game.role, game.secret.clone()) {
            (Role::Opponent, _) => {
                return Err(ProtocolViolation::WrongRole {
                    action: "reveal",
                    required: Role::Creator,
                }
                .into())
            }
            (Role::Creator, Some(secret)) => secret,
            (Role::Creator, None) => return Err(ProtocolViolation::MissingSecret.into()),
        };

        let now = self.state.clock.now();
        let event = GameEvent::Reveal {
            secret: secret.clone(),
        };
        // Also re-verifies move and salt against the stored commitment.
        self.state.machine.check(&game, &event, now)?;

        let tx = self
            .state
            .ledger
            .reveal(id, secret.mv.code(), &secret.salt)
            .await?;

        let game = self.record(id, event, now, |g| g.reveal_tx = Some(tx))?;
        info!(game = %id, "revealed move");
        Ok(game)
    }

    /// Claim forfeiture because `side` missed its deadline.
    ///
    /// The creator claims against an opponent that never joined; the opponent
    /// claims against a creator that never revealed.
    pub async fn claim_timeout(&self, id: GameId, side: Role) -> Result<Game> {
        let _guard = self.state.locks.lock(id).await;
        let game = self.state.store.get(&id).ok_or(GameError::NotFound(id))?;

        let now = self.state.clock.now();
        let event = GameEvent::ClaimTimeout { defaulter: side };
        self.state.machine.check(&game, &event, now)?;

        let tx = match side {
            Role::Creator => self.state.ledger.claim_creator_timeout(id).await?,
            Role::Opponent => self.state.ledger.claim_opponent_timeout(id).await?,
        };

        let game = self.record(id, event, now, |g| g.timeout_tx = Some(tx))?;
        info!(game = %id, defaulter = %side, "claimed timeout");
        Ok(game)
    }

    /// Apply a ledger-confirmed event to the stored record. Caller holds the lock.
    fn record(
        &self,
        id: GameId,
        event: GameEvent,
        now: chrono::DateTime<chrono::Utc>,
        annotate: impl FnOnce(&mut Game),
    ) -> Result<Game> {
        let machine = self.state.machine;
        let game = self
            .state
            .store
            .update(&id, |game| -> Result<Game> {
                machine.apply(game, event, now)?;
                annotate(game);
                Ok(game.clone())
            })
            .ok_or(GameError::NotFound(id))??;

        self.state.notify(vec![id], ChangeCause::LocalAction);
        Ok(game)
    }

    // === Queries ===

    pub fn game(&self, id: &GameId) -> Option<Game> {
        self.state.store.get(id)
    }

    pub fn games(&self) -> Vec<Game> {
        self.state.store.all()
    }

    pub fn games_by_role(&self, role: Role) -> Vec<Game> {
        self.state.store.filter(|g| g.role == role)
    }

    pub fn active_games(&self) -> Vec<Game> {
        self.state.store.filter(|g| !g.state.is_terminal())
    }

    pub fn completed_games(&self) -> Vec<Game> {
        self.state.store.filter(|g| g.state.is_terminal())
    }

    /// Win/loss label from this client's side
    pub fn label(&self, id: &GameId) -> Option<String> {
        self.game(id).map(|g| g.label())
    }

    /// Time left on the counterparty's current deadline; zero once claimable
    pub fn time_remaining(&self, id: &GameId) -> Option<Duration> {
        let game = self.game(id)?;
        game.time_remaining(self.state.clock.now(), self.state.machine.timeout())
            .and_then(|remaining| remaining.to_std().ok())
    }

    // === Notifications and reconciliation ===

    /// Receive "games changed" events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<GamesChanged> {
        self.state.subscribe()
    }

    pub fn engine(&self) -> ReconciliationEngine<L> {
        ReconciliationEngine::new(self.state.clone())
    }

    /// Run one reconciliation cycle now
    pub async fn refresh(&self) -> CycleReport {
        self.engine().poll_once().await
    }

    /// Start background polling at the configured interval. No-op if running.
    pub fn start_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if poller.as_ref().is_some_and(|p| !p.is_stopped()) {
            return;
        }
        *poller = Some(Poller::spawn(self.engine(), self.state.config.poll_interval));
    }

    /// Stop background polling without waiting for an in-flight cycle
    pub fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().unwrap_or_else(|e| e.into_inner()).take() {
            poller.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|p| !p.is_stopped() && !p.is_finished())
    }

    /// Forget every tracked game, including the persisted copy
    pub fn clear_games(&self) {
        let ids: Vec<GameId> = self.state.store.all().into_iter().map(|g| g.id).collect();
        self.state.store.clear();
        self.state.locks.prune();
        info!(count = ids.len(), "cleared tracked games");
        self.state.notify(ids, ChangeCause::Cleared);
    }
}
