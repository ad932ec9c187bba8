//! In-memory ledger executing the two-player commit-reveal contract.

use super::traits::{Deployment, GameSnapshot, LedgerClient, LedgerError};
use crate::clock::{Clock, SimClock};
use crate::crypto::{Commitment, Salt};
use crate::types::{Address, MoveCode, TxRef, Wei, NO_MOVE};
use async_trait::async_trait;
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Seconds a party has to act before the other side may claim
pub const LEDGER_TIMEOUT_SECS: u64 = 300;

/// Storage of one deployed game contract
#[derive(Clone, Debug)]
struct ContractState {
    creator: Address,
    opponent: Address,
    commitment: Commitment,
    opponent_move: MoveCode,
    stake: Wei,
    last_action: u64,
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<Address, Wei>,
    games: HashMap<Address, ContractState>,
    /// Games whose reads fail with a network error
    unreachable: HashSet<Address>,
    read_delay: Option<Duration>,
}

impl ChainState {
    fn debit(&mut self, account: Address, amount: Wei) -> Result<(), LedgerError> {
        let balance = self.balances.entry(account).or_default();
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: Wei) {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn game_mut(&mut self, game: Address) -> Result<&mut ContractState, LedgerError> {
        self.games
            .get_mut(&game)
            .ok_or(LedgerError::GameNotFound(game))
    }
}

/// The contract's own winner rule on move codes.
fn contract_win(c1: MoveCode, c2: MoveCode) -> bool {
    if c1 == c2 {
        false
    } else if c1 % 2 == c2 % 2 {
        c1 < c2
    } else {
        c1 > c2
    }
}

fn valid_move(code: MoveCode) -> bool {
    (1..=5).contains(&code)
}

fn revert(reason: &str) -> LedgerError {
    LedgerError::Reverted(reason.to_string())
}

fn new_tx() -> TxRef {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    TxRef::from_bytes(bytes)
}

/// Shared in-memory chain. Clone to share; `connect` to act as an account.
#[derive(Clone, Default)]
pub struct MockLedger {
    chain: Arc<Mutex<ChainState>>,
    clock: SimClock,
}

impl MockLedger {
    /// Create an empty ledger whose clock follows real time until advanced
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger on the given clock
    pub fn with_clock(clock: SimClock) -> Self {
        Self {
            chain: Arc::default(),
            clock,
        }
    }

    fn chain(&self) -> MutexGuard<'_, ChainState> {
        self.chain.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The ledger's clock; share it with clients so deadlines agree
    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// Advance the ledger's time by seconds
    pub fn advance_time(&self, seconds: i64) {
        self.clock.advance_secs(seconds);
    }

    /// Client acting on behalf of `account`
    pub fn connect(&self, account: Address) -> MockLedgerClient {
        MockLedgerClient {
            ledger: self.clone(),
            account,
        }
    }

    /// Add funds to an account
    pub fn fund(&self, account: Address, amount: Wei) {
        self.chain().credit(account, amount);
    }

    /// Current balance of an account
    pub fn balance(&self, account: Address) -> Wei {
        self.chain().balances.get(&account).copied().unwrap_or(0)
    }

    /// Make reads of a game fail (or succeed again)
    pub fn set_unreachable(&self, game: Address, unreachable: bool) {
        let mut chain = self.chain();
        if unreachable {
            chain.unreachable.insert(game);
        } else {
            chain.unreachable.remove(&game);
        }
    }

    /// Delay every `read_state` call
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.chain().read_delay = delay;
    }

    /// Number of deployed games
    pub fn game_count(&self) -> usize {
        self.chain().games.len()
    }

    fn deploy(
        &self,
        sender: Address,
        commitment: &Commitment,
        opponent: Address,
        value: Wei,
    ) -> Result<Deployment, LedgerError> {
        let now = self.clock.unix_secs();
        if value.checked_mul(2).is_none() {
            return Err(revert("stake too large"));
        }
        let mut chain = self.chain();
        chain.debit(sender, value)?;

        let game = Address::random();
        chain.games.insert(
            game,
            ContractState {
                creator: sender,
                opponent,
                commitment: *commitment,
                opponent_move: NO_MOVE,
                stake: value,
                last_action: now,
            },
        );
        debug!(%game, creator = %sender, stake = value, "mock ledger: deployed game");

        Ok(Deployment { game, tx: new_tx() })
    }

    fn play(
        &self,
        sender: Address,
        game: Address,
        move_code: MoveCode,
        value: Wei,
    ) -> Result<TxRef, LedgerError> {
        let now = self.clock.unix_secs();
        let mut chain = self.chain();
        let state = chain.game_mut(game)?.clone();

        if state.opponent_move != NO_MOVE {
            return Err(revert("opponent already played"));
        }
        if state.stake == 0 {
            return Err(revert("game already settled"));
        }
        if !valid_move(move_code) {
            return Err(revert("invalid move"));
        }
        if value != state.stake {
            return Err(revert("value must equal stake"));
        }
        if sender != state.opponent {
            return Err(revert("only the designated opponent can play"));
        }

        chain.debit(sender, value)?;
        let contract = chain.game_mut(game)?;
        contract.opponent_move = move_code;
        contract.last_action = now;
        Ok(new_tx())
    }

    fn solve(
        &self,
        sender: Address,
        game: Address,
        move_code: MoveCode,
        salt: &Salt,
    ) -> Result<TxRef, LedgerError> {
        let mut chain = self.chain();
        let state = chain.game_mut(game)?.clone();

        if state.opponent_move == NO_MOVE {
            return Err(revert("opponent has not played"));
        }
        if state.stake == 0 {
            return Err(revert("game already settled"));
        }
        if sender != state.creator {
            return Err(revert("only the creator can reveal"));
        }
        if !valid_move(move_code) || !state.commitment.verify(move_code, salt) {
            return Err(revert("reveal does not match commitment"));
        }

        if contract_win(move_code, state.opponent_move) {
            chain.credit(state.creator, state.stake.saturating_mul(2));
        } else if contract_win(state.opponent_move, move_code) {
            chain.credit(state.opponent, state.stake.saturating_mul(2));
        } else {
            chain.credit(state.creator, state.stake);
            chain.credit(state.opponent, state.stake);
        }
        chain.game_mut(game)?.stake = 0;
        Ok(new_tx())
    }

    fn creator_timeout(&self, game: Address) -> Result<TxRef, LedgerError> {
        let now = self.clock.unix_secs();
        let mut chain = self.chain();
        let state = chain.game_mut(game)?.clone();

        if state.opponent_move == NO_MOVE {
            return Err(revert("opponent has not played"));
        }
        if state.stake == 0 {
            return Err(revert("game already settled"));
        }
        if now < state.last_action + LEDGER_TIMEOUT_SECS {
            return Err(revert("timeout not reached"));
        }

        chain.credit(state.opponent, state.stake.saturating_mul(2));
        chain.game_mut(game)?.stake = 0;
        Ok(new_tx())
    }

    fn opponent_timeout(&self, game: Address) -> Result<TxRef, LedgerError> {
        let now = self.clock.unix_secs();
        let mut chain = self.chain();
        let state = chain.game_mut(game)?.clone();

        if state.opponent_move != NO_MOVE {
            return Err(revert("opponent already played"));
        }
        if state.stake == 0 {
            return Err(revert("game already settled"));
        }
        if now < state.last_action + LEDGER_TIMEOUT_SECS {
            return Err(revert("timeout not reached"));
        }

        chain.credit(state.creator, state.stake);
        chain.game_mut(game)?.stake = 0;
        Ok(new_tx())
    }

    async fn snapshot(&self, game: Address) -> Result<GameSnapshot, LedgerError> {
        let delay = self.chain().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let chain = self.chain();
        if chain.unreachable.contains(&game) {
            return Err(LedgerError::NetworkError(format!("{game} unreachable")));
        }
        let state = chain
            .games
            .get(&game)
            .ok_or(LedgerError::GameNotFound(game))?;

        Ok(GameSnapshot {
            creator: state.creator,
            opponent: state.opponent,
            stake_remaining: state.stake,
            opponent_move: state.opponent_move,
            commitment: state.commitment,
            last_action: state.last_action,
        })
    }
}

/// Mock ledger client bound to one account
#[derive(Clone)]
pub struct MockLedgerClient {
    ledger: MockLedger,
    account: Address,
}

impl MockLedgerClient {
    /// The shared ledger behind this client
    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }

    /// Balance of this client's account
    pub fn balance(&self) -> Wei {
        self.ledger.balance(self.account)
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    fn account(&self) -> Address {
        self.account
    }

    async fn deploy(
        &self,
        commitment: &Commitment,
        opponent: Address,
        stake: Wei,
    ) -> Result<Deployment, LedgerError> {
        self.ledger.deploy(self.account, commitment, opponent, stake)
    }

    async fn join(
        &self,
        game: Address,
        move_code: MoveCode,
        stake: Wei,
    ) -> Result<TxRef, LedgerError> {
        self.ledger.play(self.account, game, move_code, stake)
    }

    async fn reveal(
        &self,
        game: Address,
        move_code: MoveCode,
        salt: &Salt,
    ) -> Result<TxRef, LedgerError> {
        self.ledger.solve(self.account, game, move_code, salt)
    }

    async fn claim_creator_timeout(&self, game: Address) -> Result<TxRef, LedgerError> {
        self.ledger.creator_timeout(game)
    }

    async fn claim_opponent_timeout(&self, game: Address) -> Result<TxRef, LedgerError> {
        self.ledger.opponent_timeout(game)
    }

    async fn read_state(&self, game: Address) -> Result<GameSnapshot, LedgerError> {
        self.ledger.snapshot(game).await
    }
}
