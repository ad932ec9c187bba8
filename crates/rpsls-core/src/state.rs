//! State shared by the command surface and the reconciliation engine.

use crate::config::ClientConfig;
use crate::protocol::{GameId, StateMachine};
use crate::store::GameStore;
use rpsls_ledger::{Clock, LedgerClient};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, OwnedMutexGuard};

/// Capacity of the change notification channel. Slow subscribers see `Lagged`.
const NOTIFY_CAPACITY: usize = 64;

/// What committed a batch of game changes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    /// A local command was confirmed by the ledger
    LocalAction,
    /// The poller applied transitions observed on the ledger
    Reconciled,
    /// Every tracked game was dropped
    Cleared,
}

/// "Games changed" notification, fired after a committed mutation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GamesChanged {
    pub ids: Vec<GameId>,
    pub cause: ChangeCause,
}

/// Per-game async locks. One mutation in flight per game id.
#[derive(Default)]
pub struct GameLocks {
    table: Mutex<HashMap<GameId, Arc<tokio::sync::Mutex<()>>>>,
}

impl GameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one game
    pub async fn lock(&self, id: GameId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table.entry(id).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Forget every lock not currently held
    pub fn prune(&self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

/// Everything a game client needs, shared behind an `Arc`
pub struct ClientState<L> {
    pub ledger: L,
    pub store: GameStore,
    pub locks: GameLocks,
    pub machine: StateMachine,
    pub clock: Arc<dyn Clock>,
    pub config: ClientConfig,
    notifier: broadcast::Sender<GamesChanged>,
}

impl<L: LedgerClient> ClientState<L> {
    pub fn new(ledger: L, store: GameStore, clock: Arc<dyn Clock>, config: ClientConfig) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            ledger,
            store,
            locks: GameLocks::new(),
            machine: StateMachine::new(config.timeout),
            clock,
            config,
            notifier,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GamesChanged> {
        self.notifier.subscribe()
    }

    /// Publish a change. No-op when `ids` is empty or nobody listens.
    pub fn notify(&self, ids: Vec<GameId>, cause: ChangeCause) {
        if ids.is_empty() {
            return;
        }
        let _ = self.notifier.send(GamesChanged { ids, cause });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpsls_ledger::{Address, MockLedger, SystemClock};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_serializes_same_game() {
        let locks = Arc::new(GameLocks::new());
        let id = Address::random();

        let guard = locks.lock(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_locks_are_per_game() {
        let locks = GameLocks::new();
        let _a = locks.lock(Address::random()).await;
        let _b = locks.lock(Address::random()).await;

        locks.prune();
        assert_eq!(locks.table.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_prune_drops_idle_locks() {
        let locks = GameLocks::new();
        drop(locks.lock(Address::random()).await);

        locks.prune();
        assert!(locks.table.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_skips_empty_batches() {
        let ledger = MockLedger::new().connect(Address::random());
        let state = ClientState::new(
            ledger,
            GameStore::in_memory(),
            Arc::new(SystemClock),
            ClientConfig::default(),
        );
        let mut rx = state.subscribe();

        state.notify(Vec::new(), ChangeCause::Reconciled);
        let id = Address::random();
        state.notify(vec![id], ChangeCause::LocalAction);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.ids, vec![id]);
        assert_eq!(event.cause, ChangeCause::LocalAction);
        assert!(rx.try_recv().is_err());
    }
}
