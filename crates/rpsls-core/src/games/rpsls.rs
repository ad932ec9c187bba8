//! Rock-Paper-Scissors-Lizard-Spock moves and winner resolution.

use rpsls_ledger::MoveCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five moves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
    Lizard,
    Spock,
}

/// Bidirectional mapping between local UI order and the ledger's encoding.
///
/// UI order follows the move picker; ledger codes follow the contract's enum
/// (`Null, Rock, Paper, Scissors, Spock, Lizard`). Lizard and Spock swap.
const MOVE_TABLE: [(Move, usize, MoveCode); 5] = [
    (Move::Rock, 0, 1),
    (Move::Paper, 1, 2),
    (Move::Scissors, 2, 3),
    (Move::Lizard, 3, 5),
    (Move::Spock, 4, 4),
];

impl Move {
    /// All moves in UI order
    pub const ALL: [Move; 5] = [
        Move::Rock,
        Move::Paper,
        Move::Scissors,
        Move::Lizard,
        Move::Spock,
    ];

    /// Move at a UI picker position
    pub fn from_ui_index(index: usize) -> Option<Move> {
        MOVE_TABLE
            .iter()
            .find(|(_, ui, _)| *ui == index)
            .map(|(mv, _, _)| *mv)
    }

    /// Move for a ledger code; `None` for 0 ("not played") or out of range
    pub fn from_code(code: MoveCode) -> Option<Move> {
        MOVE_TABLE
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(mv, _, _)| *mv)
    }

    pub fn ui_index(self) -> usize {
        self.entry().1
    }

    /// Ledger encoding, the value that goes into commitments
    pub fn code(self) -> MoveCode {
        self.entry().2
    }

    fn entry(self) -> (Move, usize, MoveCode) {
        // Rows are in variant order.
        MOVE_TABLE[self as usize]
    }

    /// Check if this move defeats the other
    pub fn beats(self, other: Move) -> bool {
        use Move::*;
        matches!(
            (self, other),
            (Rock, Scissors)
                | (Rock, Lizard)
                | (Paper, Rock)
                | (Paper, Spock)
                | (Scissors, Paper)
                | (Scissors, Lizard)
                | (Lizard, Paper)
                | (Lizard, Spock)
                | (Spock, Rock)
                | (Spock, Scissors)
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
            Move::Lizard => "Lizard",
            Move::Spock => "Spock",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Game result, from the first player's point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    FirstWins,
    SecondWins,
    Tie,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::FirstWins => "First wins",
            GameResult::SecondWins => "Second wins",
            GameResult::Tie => "Tie",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `a` defeats `b` under the beats graph
pub fn beats(a: Move, b: Move) -> bool {
    a.beats(b)
}

/// The ledger's arithmetic form of `beats` on move codes: equal is a tie,
/// same parity means the lower code wins, different parity the higher.
pub fn parity_beats(a: MoveCode, b: MoveCode) -> bool {
    if a == b {
        false
    } else if a % 2 == b % 2 {
        a < b
    } else {
        a > b
    }
}

/// Resolve a game between two moves
pub fn determine_winner(first: Move, second: Move) -> GameResult {
    if first.beats(second) {
        GameResult::FirstWins
    } else if second.beats(first) {
        GameResult::SecondWins
    } else {
        GameResult::Tie
    }
}
