//! Move definitions and winner resolution.

mod rpsls;

pub use rpsls::{beats, determine_winner, parity_beats, GameResult, Move};
