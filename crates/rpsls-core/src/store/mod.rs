//! Durable local record of the games this client takes part in.

mod game_store;
mod storage;

pub use game_store::GameStore;
pub use storage::{FileStorage, MemoryStorage, Storage};

use thiserror::Error;

/// Local persistence failures. The in-memory store stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("game data serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
