//! Game records and the state machine that drives them.

mod game;
mod state_machine;
mod types;

pub use game::Game;
pub use state_machine::{GameEvent, StateMachine, Transition};
pub use types::{GameId, GameState, MoveSecret, Outcome, Role};
