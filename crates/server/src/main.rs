use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use game::{BroadcastHub, GameError, Observer, SessionManager, StatsStore};
use serde::Deserialize;
use shared::{
    domain::Username,
    error::ApiError,
    protocol::{DrawCardResponse, LeaderboardEntry, StartGameResponse},
};
use storage::{KeyValueStore, Storage};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod observer;

use config::{load_settings, prepare_database_url};
use observer::WebSocketObserver;

struct AppState {
    game: SessionManager,
    store: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Deserialize)]
struct PlayerRequest {
    username: String,
}

const MAX_REQUEST_BYTES: usize = 16 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let store: Arc<dyn KeyValueStore> = Arc::new(storage);

    let hub = Arc::new(BroadcastHub::new(
        StatsStore::new(Arc::clone(&store)),
        settings.hub_config(),
    ));
    let game = SessionManager::new(Arc::clone(&store), hub);
    let allowed_origin = HeaderValue::from_str(&settings.allowed_origin)
        .with_context(|| format!("invalid allowed origin '{}'", settings.allowed_origin))?;

    let app = build_router(Arc::new(AppState { game, store }), allowed_origin);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/start-game", post(start_game))
        .route("/draw-card", post(draw_card))
        .route("/leaderboard", get(leaderboard))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.store.health_check().await.map_err(|error| {
        error!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn start_game(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<StartGameResponse>, HttpError> {
    let username = parse_username(req.username)?;
    let response = state.game.start_game(&username).await.map_err(game_error)?;
    Ok(Json(response))
}

async fn draw_card(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> Result<Json<DrawCardResponse>, HttpError> {
    let username = parse_username(req.username)?;
    let response = state.game.draw_card(&username).await.map_err(game_error)?;
    Ok(Json(response))
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardEntry>>, HttpError> {
    let entries = state.game.leaderboard().await.map_err(game_error)?;
    Ok(Json(entries))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    use axum::extract::ws::Message;

    let (sender, mut receiver) = socket.split();
    let observer = Arc::new(WebSocketObserver::new(sender));
    let hub = Arc::clone(state.game.hub());
    let observer_id = hub.register(observer.clone()).await;

    let keepalive_task = tokio::spawn({
        let hub = Arc::clone(&hub);
        async move { hub.keepalive(observer_id).await }
    });

    // Observers only listen; inbound frames are read solely to notice the close.
    while let Some(Ok(message)) = receiver.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }

    keepalive_task.abort();
    hub.unregister(observer_id).await;
    observer.close().await;
    info!(observer_id, "leaderboard connection closed");
}

fn parse_username(raw: String) -> Result<Username, HttpError> {
    Username::parse(raw).map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::from(e))))
}

fn game_error(error: GameError) -> HttpError {
    let status = match &error {
        GameError::NoSession { .. } => StatusCode::NOT_FOUND,
        GameError::Storage(_) | GameError::EmptyDeck => {
            error!(%error, "game request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiError::from(error)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
