//! Integration tests for complete games between two clients.

mod common;

use common::{ledger, player, FUNDING, STAKE};
use rpsls_core::{
    make_commitment, verify_reveal, GameResult, GameState, Move, Outcome, ProtocolViolation, Role,
};
use rpsls_ledger::LEDGER_TIMEOUT_SECS;

/// Creator commits Rock, opponent plays Scissors, creator reveals and wins
#[tokio::test]
async fn test_rock_beats_scissors() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    // Rock is UI index 0, ledger encoding 1
    let game = alice.create_game(bob.account(), STAKE, 0).await.unwrap();
    let secret = game.secret.clone().unwrap();
    assert_eq!(secret.mv, Move::Rock);
    assert_eq!(game.commitment, Some(make_commitment(Move::Rock, &secret.salt)));
    assert_eq!(ledger.balance(alice.account()), FUNDING - STAKE);

    // Scissors is UI index 2, ledger encoding 3
    let joined = bob.join_game(game.id, 2).await.unwrap();
    assert_eq!(joined.state, GameState::WaitingForReveal);
    assert_eq!(joined.my_move(), Some(Move::Scissors));

    let report = alice.refresh().await;
    assert_eq!(report.changed, vec![game.id]);
    let waiting = alice.game(&game.id).unwrap();
    assert_eq!(waiting.state, GameState::WaitingForReveal);
    assert_eq!(waiting.opponent_move, Some(Move::Scissors));

    assert!(verify_reveal(&game.commitment.unwrap(), 1, &secret.salt));
    let revealed = alice.reveal_move(game.id).await.unwrap();
    assert_eq!(revealed.state, GameState::Revealed);
    assert_eq!(revealed.outcome, Some(Outcome::Resolved(GameResult::FirstWins)));
    assert_eq!(revealed.winner(), Some(Role::Creator));

    alice.refresh().await;
    bob.refresh().await;

    let settled = alice.game(&game.id).unwrap();
    assert_eq!(settled.state, GameState::Completed);
    assert_eq!(settled.label(), "You won!");
    assert_eq!(settled.payout(), Some(2 * STAKE));
    assert_eq!(ledger.balance(alice.account()), FUNDING + STAKE);
    assert_eq!(ledger.balance(bob.account()), FUNDING - STAKE);

    // The opponent never sees the creator's move
    let theirs = bob.game(&game.id).unwrap();
    assert_eq!(theirs.state, GameState::Completed);
    assert_eq!(theirs.outcome, Some(Outcome::Undisclosed));
    assert_eq!(bob.label(&game.id).unwrap(), "Game completed");
}

#[tokio::test]
async fn test_tie_splits_pot() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let game = alice.create_game(bob.account(), STAKE, 4).await.unwrap();
    bob.join_game(game.id, 4).await.unwrap();
    alice.refresh().await;
    alice.reveal_move(game.id).await.unwrap();
    alice.refresh().await;

    assert_eq!(alice.label(&game.id).unwrap(), "Tie! Funds split equally");
    assert_eq!(ledger.balance(alice.account()), FUNDING);
    assert_eq!(ledger.balance(bob.account()), FUNDING);
}

#[tokio::test]
async fn test_lizard_beats_spock() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let game = alice.create_game(bob.account(), STAKE, 4).await.unwrap();
    bob.join_game(game.id, 3).await.unwrap();
    alice.refresh().await;
    alice.reveal_move(game.id).await.unwrap();
    alice.refresh().await;

    assert_eq!(alice.label(&game.id).unwrap(), "You lost");
    assert_eq!(ledger.balance(bob.account()), FUNDING + STAKE);
}

/// Creator never reveals; opponent claims after the deadline
#[tokio::test]
async fn test_creator_silent_opponent_claims() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let game = alice.create_game(bob.account(), STAKE, 0).await.unwrap();
    bob.join_game(game.id, 1).await.unwrap();

    let err = bob.claim_timeout(game.id, Role::Creator).await.unwrap_err();
    assert!(matches!(
        err,
        rpsls_core::GameError::Protocol(ProtocolViolation::DeadlineNotReached { .. })
    ));

    ledger.advance_time(LEDGER_TIMEOUT_SECS as i64 + 1);
    let claimed = bob.claim_timeout(game.id, Role::Creator).await.unwrap();
    assert_eq!(claimed.state, GameState::TimedOut);
    assert_eq!(claimed.winner(), Some(Role::Opponent));
    assert_eq!(claimed.label(), "Timeout - You won!");
    assert!(claimed.timeout_tx.is_some());
    assert_eq!(ledger.balance(bob.account()), FUNDING + STAKE);

    alice.refresh().await;
    let lost = alice.game(&game.id).unwrap();
    assert_eq!(lost.state, GameState::Completed);
    assert_eq!(lost.outcome, Some(Outcome::TimeoutWin(Role::Opponent)));
    assert_eq!(lost.label(), "Timeout - You lost");

    // Terminal games accept nothing further
    let err = alice.reveal_move(game.id).await.unwrap_err();
    assert!(matches!(
        err,
        rpsls_core::GameError::Protocol(ProtocolViolation::Terminal(GameState::Completed))
    ));
}

/// Opponent never joins; creator reclaims the stake
#[tokio::test]
async fn test_opponent_silent_creator_reclaims() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let game = alice.create_game(bob.account(), STAKE, 2).await.unwrap();
    ledger.advance_time(LEDGER_TIMEOUT_SECS as i64 + 1);

    let claimed = alice.claim_timeout(game.id, Role::Opponent).await.unwrap();
    assert_eq!(claimed.state, GameState::TimedOut);
    assert_eq!(claimed.winner(), Some(Role::Creator));
    assert_eq!(claimed.payout(), Some(STAKE));
    assert_eq!(ledger.balance(alice.account()), FUNDING);

    // Too late to join now
    let err = bob.join_game(game.id, 0).await.unwrap_err();
    assert!(matches!(
        err,
        rpsls_core::GameError::Protocol(ProtocolViolation::NotJoinable(_))
    ));
}

#[tokio::test]
async fn test_only_counterparty_may_claim() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let game = alice.create_game(bob.account(), STAKE, 0).await.unwrap();
    bob.join_game(game.id, 1).await.unwrap();
    alice.refresh().await;
    ledger.advance_time(LEDGER_TIMEOUT_SECS as i64 + 1);

    let err = alice.claim_timeout(game.id, Role::Creator).await.unwrap_err();
    assert!(matches!(
        err,
        rpsls_core::GameError::Protocol(ProtocolViolation::WrongRole { .. })
    ));
}

#[tokio::test]
async fn test_queries_by_role_and_state() {
    let ledger = ledger();
    let alice = player(&ledger);
    let bob = player(&ledger);

    let first = alice.create_game(bob.account(), STAKE, 0).await.unwrap();
    let second = bob.create_game(alice.account(), STAKE, 1).await.unwrap();
    alice.join_game(second.id, 0).await.unwrap();

    assert_eq!(alice.games().len(), 2);
    assert_eq!(alice.games_by_role(Role::Creator)[0].id, first.id);
    assert_eq!(alice.games_by_role(Role::Opponent)[0].id, second.id);

    bob.refresh().await;
    bob.reveal_move(second.id).await.unwrap();
    alice.refresh().await;

    assert_eq!(alice.active_games().len(), 1);
    assert_eq!(alice.completed_games()[0].id, second.id);
}
