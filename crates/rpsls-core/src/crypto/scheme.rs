//! Commit-reveal operations over moves.

use crate::games::Move;
use rpsls_ledger::{Commitment, MoveCode, Salt};

/// Commit to a move under a salt
pub fn make_commitment(mv: Move, salt: &Salt) -> Commitment {
    Commitment::new(mv.code(), salt)
}

/// Recompute and compare; a local sanity check before submitting a reveal
pub fn verify_reveal(commitment: &Commitment, move_code: MoveCode, salt: &Salt) -> bool {
    commitment.verify(move_code, salt)
}

/// Fresh 256-bit salt from the OS CSPRNG
pub fn generate_salt() -> Salt {
    Salt::random()
}

/// Fresh salt that differs from every salt in `used`
pub fn generate_unique_salt<'a>(used: impl IntoIterator<Item = &'a Salt> + Clone) -> Salt {
    loop {
        let salt = generate_salt();
        if !used.clone().into_iter().any(|s| *s == salt) {
            return salt;
        }
    }
}
