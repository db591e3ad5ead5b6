//! HTTP surface for starting a game and watching it.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use strictly_tictactoe::GameStatus;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{DuelError, DuelErrorKind};
use crate::game_service::{GameService, GameView};

/// Body of `POST /game/new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCreated {
    id: Uuid,
    status: GameStatus,
    last_played_player_id: Option<Uuid>,
}

struct ApiError(DuelError);

impl From<DuelError> for ApiError {
    fn from(err: DuelError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            DuelErrorKind::GameAlreadyExists(_) => StatusCode::CONFLICT,
            DuelErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(status = %status, error = %self.0.kind(), "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.kind().to_string() })),
        )
            .into_response()
    }
}

/// Builds the `/game` routes.
pub fn router(games: GameService) -> Router {
    Router::new()
        .route("/game/new", post(start_new_game))
        .route("/game", get(current_game))
        .with_state(games)
}

#[instrument(skip_all)]
async fn start_new_game(State(games): State<GameService>) -> Result<Json<GameCreated>, ApiError> {
    let game = games.create_new_game().await?;
    Ok(Json(GameCreated {
        id: *game.id(),
        status: *game.status(),
        last_played_player_id: *game.last_played(),
    }))
}

#[instrument(skip_all)]
async fn current_game(State(games): State<GameService>) -> Result<Json<GameView>, ApiError> {
    Ok(Json(games.current_game_view()?))
}

/// Serves the routes on `bind` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound or serving fails.
#[instrument(skip(games, shutdown))]
pub async fn serve(
    bind: &str,
    games: GameService,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "HTTP surface listening");
    axum::serve(listener, router(games))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
