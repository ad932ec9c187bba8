//! Commitment and Salt for the commit-reveal scheme.
//!
//! The hash layout is the ledger's own: `keccak256(move_code || salt)` with the
//! move as a single byte and the salt as 32 big-endian bytes. Any deviation makes
//! honest reveals fail on-ledger.

use crate::types::hex_bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// 256-bit secret salt, most significant byte first
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(#[serde(with = "hex_bytes")] [u8; 32]);

impl Salt {
    /// Draw a fresh salt from the OS-seeded CSPRNG
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw big-endian bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only a prefix, salts are secret until reveal.
        write!(f, "Salt({}..)", hex::encode(&self.0[..4]))
    }
}

/// Commitment = keccak256(move_code || salt)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "hex_bytes")] [u8; 32]);

impl Commitment {
    /// Commit to a ledger-encoded move under the given salt
    pub fn new(move_code: u8, salt: &Salt) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update([move_code]);
        hasher.update(salt.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check that `(move_code, salt)` reproduces this commitment
    pub fn verify(&self, move_code: u8, salt: &Salt) -> bool {
        *self == Self::new(move_code, salt)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
