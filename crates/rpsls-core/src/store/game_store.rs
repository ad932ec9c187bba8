//! In-memory game table with write-through persistence.

use super::storage::{MemoryStorage, Storage};
use super::StoreError;
use crate::protocol::{Game, GameId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, warn};

/// On-disk layout: `{"games": [...]}`
#[derive(Deserialize)]
struct PersistedGames {
    #[serde(default)]
    games: Vec<Game>,
}

/// Key that receives stored data that could not be parsed
fn unreadable_key(key: &str) -> String {
    format!("{key}.unreadable")
}

/// Game records keyed by id, persisted under one storage key.
///
/// Every mutation is written through to storage. A failed write is logged and
/// counted but never rolls back the in-memory change.
///
/// If the stored copy could not be read at open, nothing is written over it.
/// Each later write first retries the read and merges whatever it finds.
pub struct GameStore {
    storage: Box<dyn Storage>,
    key: String,
    games: RwLock<Vec<Game>>,
    /// The stored copy has been read (or preserved) and may be overwritten
    loaded: AtomicBool,
    persistence_failures: AtomicU64,
}

impl GameStore {
    /// Load games stored under `key`.
    ///
    /// Corrupt data is moved aside to [`unreadable_key`] and the store starts
    /// empty. A failed read also starts empty but holds back writes.
    pub fn open(storage: impl Storage + 'static, key: impl Into<String>) -> Self {
        let key = key.into();
        let (games, loaded) = match Self::load(&storage, &key) {
            Ok(games) => (games, true),
            Err(e) => {
                warn!(key = %key, error = %e, "could not read game data, holding writes until it can be read");
                (Vec::new(), false)
            }
        };

        Self {
            storage: Box::new(storage),
            key,
            games: RwLock::new(games),
            loaded: AtomicBool::new(loaded),
            persistence_failures: AtomicU64::new(0),
        }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new(), crate::config::DEFAULT_STORAGE_KEY)
    }

    /// Errors only when the stored value could be neither read nor preserved.
    fn load(storage: &dyn Storage, key: &str) -> Result<Vec<Game>, StoreError> {
        let Some(raw) = storage.read(key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<PersistedGames>(&raw) {
            Ok(persisted) => Ok(persisted.games),
            Err(e) => {
                let backup = unreadable_key(key);
                storage.write(&backup, &raw)?;
                warn!(key, backup = %backup, error = %e, "stored game data is corrupt, moved aside");
                Ok(Vec::new())
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Game>> {
        self.games.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Game>> {
        self.games.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a game, replacing any record with the same id. Returns true if new.
    pub fn insert(&self, game: Game) -> bool {
        let mut games = self.write();
        let inserted = match games.iter_mut().find(|g| g.id == game.id) {
            Some(existing) => {
                *existing = game;
                false
            }
            None => {
                games.push(game);
                true
            }
        };
        self.persist(&mut games);
        inserted
    }

    pub fn get(&self, id: &GameId) -> Option<Game> {
        self.read().iter().find(|g| g.id == *id).cloned()
    }

    pub fn contains(&self, id: &GameId) -> bool {
        self.read().iter().any(|g| g.id == *id)
    }

    /// Atomic read-modify-write of one game. Persists only if the record changed.
    pub fn update<R>(&self, id: &GameId, mutator: impl FnOnce(&mut Game) -> R) -> Option<R> {
        let mut games = self.write();
        let game = games.iter_mut().find(|g| g.id == *id)?;
        let before = game.clone();
        let result = mutator(game);
        if *game != before {
            self.persist(&mut games);
        }
        Some(result)
    }

    /// Snapshot of the games matching `predicate`, in insertion order
    pub fn filter(&self, predicate: impl Fn(&Game) -> bool) -> Vec<Game> {
        self.read().iter().filter(|g| predicate(g)).cloned().collect()
    }

    pub fn all(&self) -> Vec<Game> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every game and the persisted copy
    pub fn clear(&self) {
        let mut games = self.write();
        games.clear();
        match self.storage.remove(&self.key) {
            Ok(()) => self.loaded.store(true, Ordering::Release),
            Err(e) => self.record_failure(&e),
        }
    }

    /// Write the current contents to storage, reporting any failure
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut games = self.write();
        self.sync(&mut games)
    }

    /// Number of writes that failed since the store was opened
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    /// Merge a stored copy not yet read, then write everything out.
    /// Local records win over stored ones with the same id.
    fn sync(&self, games: &mut Vec<Game>) -> Result<(), StoreError> {
        if !self.loaded.load(Ordering::Acquire) {
            let stored = blocking(|| Self::load(&*self.storage, &self.key))?;
            let before = games.len();
            for game in stored {
                if !games.iter().any(|g| g.id == game.id) {
                    games.push(game);
                }
            }
            self.loaded.store(true, Ordering::Release);
            info!(key = %self.key, recovered = games.len() - before, "stored game data readable again, merged");
        }

        let raw = serde_json::to_string(&PersistedGamesRef {
            games: games.as_slice(),
        })?;
        blocking(|| self.storage.write(&self.key, &raw))
    }

    // Called with the write lock held so writes land in mutation order.
    fn persist(&self, games: &mut Vec<Game>) {
        if let Err(e) = self.sync(games) {
            self.record_failure(&e);
        }
    }

    fn record_failure(&self, error: &StoreError) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
        warn!(key = %self.key, error = %error, "failed to persist game data");
    }
}

/// Run storage I/O off the async worker when on a multi-threaded runtime.
fn blocking<R>(io: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(io)
        }
        _ => io(),
    }
}

/// Borrowing twin of `PersistedGames` for writes
#[derive(Serialize)]
struct PersistedGamesRef<'a> {
    games: &'a [Game],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::Move;
    use crate::protocol::{GameState, MoveSecret};
    use crate::store::FileStorage;
    use chrono::Utc;
    use rpsls_ledger::{Address, Salt};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn game() -> Game {
        let mut game = Game::draft(
            Address::random(),
            Address::random(),
            500,
            MoveSecret::new(Move::Spock, Salt::random()),
            Utc::now(),
        );
        game.id = Address::random();
        game.state = GameState::WaitingForOpponent;
        game
    }

    /// Storage whose writes always fail
    struct FullDisk;

    impl Storage for FullDisk {
        fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded").into())
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Shared storage whose next `failing_reads` reads fail
    struct FlakyReads {
        inner: Arc<MemoryStorage>,
        failing_reads: AtomicUsize,
    }

    impl FlakyReads {
        fn new(inner: Arc<MemoryStorage>, failing_reads: usize) -> Self {
            Self {
                inner,
                failing_reads: AtomicUsize::new(failing_reads),
            }
        }
    }

    impl Storage for FlakyReads {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            let failing = self
                .failing_reads
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "device busy").into());
            }
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_insert_get_update() {
        let store = GameStore::in_memory();
        let g = game();

        assert!(store.insert(g.clone()));
        assert_eq!(store.get(&g.id), Some(g.clone()));

        let state = store.update(&g.id, |game| {
            game.state = GameState::WaitingForReveal;
            game.state
        });
        assert_eq!(state, Some(GameState::WaitingForReveal));
        assert_eq!(store.get(&g.id).unwrap().state, GameState::WaitingForReveal);

        assert_eq!(store.update(&Address::random(), |_| ()), None);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let store = GameStore::in_memory();
        let mut g = game();
        store.insert(g.clone());
        g.stake = 900;

        assert!(!store.insert(g.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&g.id).unwrap().stake, 900);
    }

    #[test]
    fn test_filter_is_a_snapshot() {
        let store = GameStore::in_memory();
        let a = game();
        let b = game();
        store.insert(a.clone());
        store.insert(b.clone());

        let waiting = store.filter(|g| g.state == GameState::WaitingForOpponent);
        store.update(&a.id, |g| g.state = GameState::Completed);

        assert_eq!(waiting.len(), 2);
        assert_eq!(waiting[0].id, a.id);
        assert_eq!(waiting[0].state, GameState::WaitingForOpponent);
    }

    #[test]
    fn test_persists_and_reloads() {
        let storage = Arc::new(MemoryStorage::new());
        let g = game();
        {
            let store = GameStore::open(storage.clone(), "k");
            store.insert(g.clone());
        }

        let reopened = GameStore::open(storage.clone(), "k");
        assert_eq!(reopened.all(), vec![g]);
        assert!(storage.read("k").unwrap().unwrap().starts_with("{\"games\":["));
    }

    #[test]
    fn test_clear_removes_persisted_copy() {
        let storage = Arc::new(MemoryStorage::new());
        let store = GameStore::open(storage.clone(), "k");
        store.insert(game());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(storage.read("k").unwrap(), None);
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let store = GameStore::open(FullDisk, "k");
        let g = game();

        store.insert(g.clone());
        store.update(&g.id, |game| game.state = GameState::WaitingForReveal);

        assert_eq!(store.persistence_failures(), 2);
        assert_eq!(store.get(&g.id).unwrap().state, GameState::WaitingForReveal);
        assert!(matches!(store.flush(), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_unchanged_update_does_not_write() {
        let store = GameStore::open(FullDisk, "k");
        let g = game();
        store.insert(g.clone());

        store.update(&g.id, |_| ());
        assert_eq!(store.persistence_failures(), 1);
    }

    #[test]
    fn test_corrupt_data_is_moved_aside() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("k", "not json").unwrap();

        let store = GameStore::open(storage.clone(), "k");
        assert!(store.is_empty());
        assert_eq!(storage.read("k.unreadable").unwrap().as_deref(), Some("not json"));

        let g = game();
        store.insert(g.clone());
        assert_eq!(GameStore::open(storage.clone(), "k").all(), vec![g]);
        assert_eq!(storage.read("k.unreadable").unwrap().as_deref(), Some("not json"));
    }

    #[test]
    fn test_failed_read_at_open_keeps_saved_games() {
        let storage = Arc::new(MemoryStorage::new());
        let mut saved = game();
        saved.state = GameState::WaitingForReveal;
        GameStore::open(storage.clone(), "k").insert(saved.clone());

        let store = GameStore::open(FlakyReads::new(storage.clone(), 1), "k");
        assert!(store.is_empty());
        let added = game();
        store.insert(added.clone());

        assert_eq!(store.persistence_failures(), 0);
        assert_eq!(store.get(&saved.id), Some(saved.clone()));

        let reopened = GameStore::open(storage.clone(), "k");
        assert_eq!(reopened.get(&saved.id), Some(saved));
        assert_eq!(reopened.get(&added.id), Some(added));
    }

    #[test]
    fn test_unreadable_storage_is_never_overwritten() {
        let storage = Arc::new(MemoryStorage::new());
        let saved = game();
        GameStore::open(storage.clone(), "k").insert(saved.clone());
        let before = storage.read("k").unwrap();

        let store = GameStore::open(FlakyReads::new(storage.clone(), usize::MAX), "k");
        store.insert(game());

        assert_eq!(store.persistence_failures(), 1);
        assert!(matches!(store.flush(), Err(StoreError::Io(_))));
        assert_eq!(storage.read("k").unwrap(), before);
        assert_eq!(GameStore::open(storage, "k").all(), vec![saved]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_writes_from_async_context() {
        let dir = tempfile::tempdir().unwrap();
        let g = game();
        {
            let store = GameStore::open(FileStorage::new(dir.path()).unwrap(), "k");
            store.insert(g.clone());
            store.update(&g.id, |game| game.state = GameState::WaitingForReveal);
            assert_eq!(store.persistence_failures(), 0);
        }

        let reopened = GameStore::open(FileStorage::new(dir.path()).unwrap(), "k");
        assert_eq!(reopened.get(&g.id).unwrap().state, GameState::WaitingForReveal);
    }
}
