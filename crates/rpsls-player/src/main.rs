//! RPSLS Player Service
//!
//! HTTP JSON API driving two players' game clients against one shared
//! in-memory ledger. Each player keeps its own game store and poller.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rpsls_core::{
    ClientConfig, CycleReport, FileStorage, Game, GameError, GameId, GameManager, GameState,
    GameStore, MemoryStorage, Move, Role,
};
use rpsls_ledger::{Address, LedgerError, MockLedger, MockLedgerClient, Wei};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Starting balance of each demo account
const INITIAL_BALANCE: Wei = 1_000_000;

type Player = GameManager<MockLedgerClient>;

/// Application error type
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.1 }));
        (self.0, body).into_response()
    }
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        AppError(status_for(&err), err.to_string())
    }
}

fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::Protocol(_) | GameError::CommitmentMismatch(_) => StatusCode::BAD_REQUEST,
        GameError::NotFound(_) | GameError::External(LedgerError::GameNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        GameError::External(_) => StatusCode::BAD_GATEWAY,
    }
}

/// The two seats at the table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum Seat {
    A,
    B,
}

struct AppState {
    ledger: MockLedger,
    player_a: Player,
    player_b: Player,
}

impl AppState {
    fn player(&self, seat: Seat) -> &Player {
        match seat {
            Seat::A => &self.player_a,
            Seat::B => &self.player_b,
        }
    }
}

// === Request/Response types ===

#[derive(Serialize)]
struct PlayerInfo {
    seat: Seat,
    account: Address,
    balance: Wei,
    polling: bool,
}

#[derive(Serialize)]
struct PlayersResponse {
    players: Vec<PlayerInfo>,
}

/// A game as shown to its local player. Never includes the salt.
#[derive(Serialize)]
struct GameView {
    id: GameId,
    role: Role,
    creator: Address,
    opponent: Address,
    stake: Wei,
    state: GameState,
    label: String,
    my_move: Option<Move>,
    opponent_move: Option<Move>,
    payout: Option<Wei>,
    time_remaining_secs: Option<u64>,
}

impl GameView {
    fn new(player: &Player, game: Game) -> Self {
        let time_remaining_secs = player.time_remaining(&game.id).map(|d| d.as_secs());
        Self {
            id: game.id,
            role: game.role,
            creator: game.creator,
            opponent: game.opponent,
            stake: game.stake,
            state: game.state,
            label: game.label(),
            my_move: game.my_move(),
            opponent_move: game.opponent_move,
            payout: game.payout(),
            time_remaining_secs,
        }
    }
}

#[derive(Serialize)]
struct GamesResponse {
    games: Vec<GameView>,
}

#[derive(Deserialize)]
struct CreateGameRequest {
    opponent: Address,
    stake: Wei,
    move_index: usize,
}

#[derive(Deserialize)]
struct JoinGameRequest {
    move_index: usize,
}

#[derive(Deserialize)]
struct TimeoutRequest {
    /// The side that missed its deadline
    side: Role,
}

#[derive(Deserialize)]
struct AdvanceTimeRequest {
    seconds: i64,
}

#[derive(Serialize)]
struct RefreshResponse {
    changed: Vec<GameId>,
    skipped: Vec<GameId>,
}

impl From<CycleReport> for RefreshResponse {
    fn from(report: CycleReport) -> Self {
        Self {
            changed: report.changed,
            skipped: report.skipped,
        }
    }
}

// === Route handlers ===

async fn get_players(State(state): State<Arc<AppState>>) -> Json<PlayersResponse> {
    let players = [Seat::A, Seat::B]
        .into_iter()
        .map(|seat| {
            let player = state.player(seat);
            PlayerInfo {
                seat,
                account: player.account(),
                balance: state.ledger.balance(player.account()),
                polling: player.is_polling(),
            }
        })
        .collect();
    Json(PlayersResponse { players })
}

async fn list_games(
    State(state): State<Arc<AppState>>,
    Path(seat): Path<Seat>,
) -> Json<GamesResponse> {
    let player = state.player(seat);
    let games = player
        .games()
        .into_iter()
        .map(|g| GameView::new(player, g))
        .collect();
    Json(GamesResponse { games })
}

async fn get_game(
    State(state): State<Arc<AppState>>,
    Path((seat, id)): Path<(Seat, GameId)>,
) -> Result<Json<GameView>, AppError> {
    let player = state.player(seat);
    let game = player.game(&id).ok_or(GameError::NotFound(id))?;
    Ok(Json(GameView::new(player, game)))
}

async fn create_game(
    State(state): State<Arc<AppState>>,
    Path(seat): Path<Seat>,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<GameView>, AppError> {
    let player = state.player(seat);
    let game = player
        .create_game(req.opponent, req.stake, req.move_index)
        .await?;
    Ok(Json(GameView::new(player, game)))
}

async fn join_game(
    State(state): State<Arc<AppState>>,
    Path((seat, id)): Path<(Seat, GameId)>,
    Json(req): Json<JoinGameRequest>,
) -> Result<Json<GameView>, AppError> {
    let player = state.player(seat);
    let game = player.join_game(id, req.move_index).await?;
    Ok(Json(GameView::new(player, game)))
}

async fn reveal_move(
    State(state): State<Arc<AppState>>,
    Path((seat, id)): Path<(Seat, GameId)>,
) -> Result<Json<GameView>, AppError> {
    let player = state.player(seat);
    let game = player.reveal_move(id).await?;
    Ok(Json(GameView::new(player, game)))
}

async fn claim_timeout(
    State(state): State<Arc<AppState>>,
    Path((seat, id)): Path<(Seat, GameId)>,
    Json(req): Json<TimeoutRequest>,
) -> Result<Json<GameView>, AppError> {
    let player = state.player(seat);
    let game = player.claim_timeout(id, req.side).await?;
    Ok(Json(GameView::new(player, game)))
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(seat): Path<Seat>,
) -> Json<RefreshResponse> {
    Json(state.player(seat).refresh().await.into())
}

async fn clear_games(State(state): State<Arc<AppState>>, Path(seat): Path<Seat>) -> StatusCode {
    state.player(seat).clear_games();
    StatusCode::NO_CONTENT
}

async fn advance_time(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdvanceTimeRequest>,
) -> StatusCode {
    state.ledger.advance_time(req.seconds);
    info!(seconds = req.seconds, "advanced ledger clock");
    StatusCode::NO_CONTENT
}

fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/players", get(get_players))
        .route("/api/ledger/advance", post(advance_time))
        .route("/api/:seat/games", get(list_games).post(create_game))
        .route("/api/:seat/games/clear", post(clear_games))
        .route("/api/:seat/games/:game_id", get(get_game))
        .route("/api/:seat/games/:game_id/join", post(join_game))
        .route("/api/:seat/games/:game_id/reveal", post(reveal_move))
        .route("/api/:seat/games/:game_id/timeout", post(claim_timeout))
        .route("/api/:seat/refresh", post(refresh))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn open_store(
    data_dir: Option<&PathBuf>,
    seat: &str,
    key: &str,
) -> Result<GameStore, rpsls_core::StoreError> {
    Ok(match data_dir {
        Some(dir) => GameStore::open(FileStorage::new(dir.join(seat))?, key),
        None => GameStore::open(MemoryStorage::new(), key),
    })
}

fn spawn_player(
    ledger: &MockLedger,
    store: GameStore,
    config: ClientConfig,
    seat: Seat,
) -> Player {
    let account = Address::random();
    ledger.fund(account, INITIAL_BALANCE);
    let player = GameManager::new(
        ledger.connect(account),
        store,
        Arc::new(ledger.clock()),
        config,
    );

    let mut changes = player.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(event) => info!(?seat, cause = ?event.cause, games = event.ids.len(), "games changed"),
                Err(RecvError::Lagged(missed)) => warn!(?seat, missed, "change notifications lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!(?seat, %account, balance = INITIAL_BALANCE, "player ready");
    player
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let data_dir = std::env::var("RPSLS_DATA_DIR").ok().map(PathBuf::from);

    let ledger = MockLedger::new();
    let player_a = spawn_player(
        &ledger,
        open_store(data_dir.as_ref(), "a", &config.storage_key)?,
        config.clone(),
        Seat::A,
    );
    let player_b = spawn_player(
        &ledger,
        open_store(data_dir.as_ref(), "b", &config.storage_key)?,
        config.clone(),
        Seat::B,
    );
    player_a.start_polling();
    player_b.start_polling();

    let state = Arc::new(AppState {
        ledger,
        player_a,
        player_b,
    });
    let app = create_router(state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Player service listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpsls_core::ProtocolViolation;

    #[test]
    fn test_error_status_codes() {
        let id = Address::random();
        let cases = [
            (GameError::from(ProtocolViolation::ZeroStake), StatusCode::BAD_REQUEST),
            (GameError::CommitmentMismatch(id), StatusCode::BAD_REQUEST),
            (GameError::NotFound(id), StatusCode::NOT_FOUND),
            (
                GameError::External(LedgerError::GameNotFound(id)),
                StatusCode::NOT_FOUND,
            ),
            (
                GameError::External(LedgerError::Reverted("timeout not reached".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[test]
    fn test_seat_from_path_segment() {
        let seat: Seat = serde_json::from_str("\"b\"").unwrap();
        assert_eq!(seat, Seat::B);
    }

    #[tokio::test]
    async fn test_game_view_hides_salt() {
        let ledger = MockLedger::new();
        let store = open_store(None, "a", "k").unwrap();
        let player = spawn_player(&ledger, store, ClientConfig::default(), Seat::A);

        let game = player
            .create_game(Address::random(), 100, 0)
            .await
            .unwrap();
        let json = serde_json::to_value(GameView::new(&player, game)).unwrap();

        assert_eq!(json["label"], "Waiting for opponent");
        assert!(json.get("secret").is_none());
        assert!(json.get("salt").is_none());
    }
}
