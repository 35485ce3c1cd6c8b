use std::sync::Arc;

use shared::{
    domain::Username,
    protocol::{DrawCardResponse, LeaderboardEntry, StartGameResponse},
};
use storage::KeyValueStore;
use tracing::{info, warn};

use crate::{
    deck::DeckStore,
    hub::BroadcastHub,
    resolver::{self, SideEffect},
    stats::StatsStore,
    GameError,
};

/// Entry point for the two player actions: starting (or resuming) a game
/// and drawing a card.
pub struct SessionManager {
    decks: DeckStore,
    stats: StatsStore,
    hub: Arc<BroadcastHub>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, hub: Arc<BroadcastHub>) -> Self {
        Self::from_parts(DeckStore::new(Arc::clone(&store)), StatsStore::new(store), hub)
    }

    pub fn from_parts(decks: DeckStore, stats: StatsStore, hub: Arc<BroadcastHub>) -> Self {
        Self { decks, stats, hub }
    }

    pub fn decks(&self) -> &DeckStore {
        &self.decks
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub async fn start_game(&self, username: &Username) -> Result<StartGameResponse, GameError> {
        if self.decks.has_deck(username).await? {
            return self.resume_game(username).await;
        }

        // Stats first: once the session exists the next call takes the resume
        // path and would never create them. Initialization is idempotent, so
        // racing first calls may both run it.
        self.stats.ensure_initialized(username).await?;
        let Some(deck) = self.decks.create_deck(username).await? else {
            return self.resume_game(username).await;
        };
        info!(%username, "game started");

        self.hub.publish().await;

        Ok(StartGameResponse {
            message: "Game started".to_string(),
            username: username.clone(),
            resumed: false,
            deck,
        })
    }

    async fn resume_game(&self, username: &Username) -> Result<StartGameResponse, GameError> {
        let deck = self.decks.read_deck(username).await?;
        info!(%username, cards = deck.len(), "resuming game");
        Ok(StartGameResponse {
            message: "Resuming game".to_string(),
            username: username.clone(),
            resumed: true,
            deck,
        })
    }

    pub async fn draw_card(&self, username: &Username) -> Result<DrawCardResponse, GameError> {
        if !self.decks.has_deck(username).await? {
            return Err(GameError::NoSession {
                username: username.clone(),
            });
        }

        let drawn = match self.decks.draw_random(username).await {
            Ok(card) => Some(card),
            Err(GameError::EmptyDeck) => {
                warn!(%username, "draw requested on an empty deck");
                None
            }
            Err(error) => return Err(error),
        };

        let mut charges = self.stats.defuse_charges(username).await?;
        let resolution = resolver::resolve(drawn, charges);

        for effect in resolution.effects {
            match effect {
                SideEffect::GainDefuse => {
                    charges = self.stats.add_defuse_charge(username).await?;
                }
                SideEffect::SpendDefuse => {
                    charges = self.stats.consume_defuse_charge(username).await?;
                }
                SideEffect::RecordLoss => {
                    self.stats.record_loss(username).await?;
                }
                SideEffect::ResetSession => {
                    self.reset_session(username).await?;
                    charges = 0;
                }
            }
        }
        info!(%username, outcome = ?resolution.outcome, defuse_charges = charges, "draw resolved");

        if resolution.outcome.touches_stats() {
            self.hub.publish().await;
        }

        Ok(DrawCardResponse {
            outcome: resolution.outcome,
            card: resolution.card,
            emoji: resolution.card.map(|card| card.glyph().to_string()),
            message: resolver::message(resolution.outcome).to_string(),
            defuse_charges: charges,
        })
    }

    /// Deals a fresh canonical deck and zeroes the defuse charges. Stats are
    /// left alone.
    pub async fn reset_session(&self, username: &Username) -> Result<(), GameError> {
        self.decks.reshuffle(username).await?;
        self.stats.set_defuse_charges(username, 0).await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, GameError> {
        self.stats.snapshot_all().await
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
