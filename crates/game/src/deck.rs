use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shared::domain::{CardKind, Username, CANONICAL_DECK};
use storage::KeyValueStore;
use tracing::{debug, warn};

use crate::GameError;

/// Records which usernames have a session, independently of whether their
/// deck list currently holds any cards.
const SESSIONS_NAMESPACE: &str = "sessions";

fn deck_key(username: &Username) -> String {
    format!("deck:{username}")
}

fn card_names(cards: &[CardKind]) -> Vec<String> {
    cards.iter().map(|card| card.name().to_string()).collect()
}

/// Per-user deck lifecycle on top of a [`KeyValueStore`] list.
pub struct DeckStore {
    store: Arc<dyn KeyValueStore>,
    rng: Mutex<StdRng>,
}

impl DeckStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    pub fn with_seed(store: Arc<dyn KeyValueStore>, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<dyn KeyValueStore>, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn shuffled_deck(&self) -> Vec<CardKind> {
        let mut deck = CANONICAL_DECK.to_vec();
        deck.shuffle(&mut *self.rng());
        deck
    }

    pub async fn has_deck(&self, username: &Username) -> Result<bool, GameError> {
        Ok(self
            .store
            .hash_get(SESSIONS_NAMESPACE, username.as_str())
            .await?
            .is_some())
    }

    /// Deals a freshly shuffled canonical deck unless the user already has a
    /// session. Only the caller that creates the session gets the dealt deck
    /// back; everyone else gets `None` and should resume.
    pub async fn create_deck(
        &self,
        username: &Username,
    ) -> Result<Option<Vec<CardKind>>, GameError> {
        let deck = self.shuffled_deck();
        let created = self
            .store
            .list_claim(
                &deck_key(username),
                &card_names(&deck),
                SESSIONS_NAMESPACE,
                username.as_str(),
            )
            .await?;
        Ok(created.then_some(deck))
    }

    pub async fn read_deck(&self, username: &Username) -> Result<Vec<CardKind>, GameError> {
        let raw = self.store.list_range(&deck_key(username)).await?;
        Ok(raw
            .into_iter()
            .filter_map(|entry| match entry.parse::<CardKind>() {
                Ok(kind) => Some(kind),
                Err(error) => {
                    warn!(%username, %error, "skipping unreadable deck entry");
                    None
                }
            })
            .collect())
    }

    /// Draws one card at a uniformly random position. Cards of one kind are
    /// interchangeable, so the stored list loses its first occurrence of the
    /// drawn kind. If a concurrent draw removed that card first, the deck is
    /// read again and the draw retried.
    pub async fn draw_random(&self, username: &Username) -> Result<CardKind, GameError> {
        loop {
            let deck = self.read_deck(username).await?;
            if deck.is_empty() {
                return Err(GameError::EmptyDeck);
            }
            let drawn = {
                let index = self.rng().gen_range(0..deck.len());
                deck[index]
            };
            let removed = self
                .store
                .list_remove(&deck_key(username), 1, drawn.name())
                .await?;
            if removed == 1 {
                debug!(%username, card = %drawn, remaining = deck.len() - 1, "card drawn");
                return Ok(drawn);
            }
            debug!(%username, card = %drawn, "card already taken, drawing again");
        }
    }

    /// Replaces whatever deck the user holds with a new shuffled canonical one.
    pub async fn reshuffle(&self, username: &Username) -> Result<(), GameError> {
        let deck = self.shuffled_deck();
        self.replace_deck(username, &deck).await
    }

    pub async fn replace_deck(
        &self,
        username: &Username,
        cards: &[CardKind],
    ) -> Result<(), GameError> {
        self.store
            .list_replace(&deck_key(username), &card_names(cards))
            .await?;
        self.store
            .hash_set(SESSIONS_NAMESPACE, username.as_str(), "1")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/deck_tests.rs"]
mod tests;
