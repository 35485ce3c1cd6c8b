//! Session, deck and leaderboard logic for the single-player kitten game.
//!
//! Everything here talks to persistence through [`storage::KeyValueStore`];
//! the HTTP and WebSocket plumbing lives in the `server` crate.

use shared::{
    domain::Username,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

pub mod deck;
pub mod hub;
pub mod resolver;
pub mod session;
pub mod stats;

pub use deck::DeckStore;
pub use hub::{BroadcastHub, HubConfig, HubFrame, Observer, ObserverId};
pub use session::SessionManager;
pub use stats::StatsStore;

#[derive(Debug, Error)]
pub enum GameError {
    /// The store was unreachable or rejected the request. The operation did
    /// not complete and may be retried by the client.
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error("no game session for '{username}'; start a game first")]
    NoSession { username: Username },
    #[error("deck is empty")]
    EmptyDeck,
}

impl From<GameError> for ApiError {
    fn from(value: GameError) -> Self {
        match value {
            GameError::Storage(_) => ApiError::new(
                ErrorCode::Internal,
                "storage unavailable, the request was not applied",
            ),
            GameError::NoSession { .. } => ApiError::new(ErrorCode::NotFound, value.to_string()),
            GameError::EmptyDeck => ApiError::new(ErrorCode::Internal, value.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
