use std::{collections::BTreeMap, sync::Arc};

use shared::{
    domain::{PlayerStats, Username},
    protocol::LeaderboardEntry,
};
use storage::KeyValueStore;
use tracing::info;

use crate::GameError;

const WIN_NAMESPACE: &str = "win";
const LOSE_NAMESPACE: &str = "lose";
const DEFUSE_FIELD: &str = "defuse";

fn player_namespace(username: &Username) -> String {
    format!("user:{username}")
}

/// Lenient counter read: anything other than plain digits counts as zero.
fn parse_counter(raw: &str) -> u64 {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    raw.parse().unwrap_or(0)
}

fn as_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Win/loss counters and banked defuse charges, one set per username.
#[derive(Clone)]
pub struct StatsStore {
    store: Arc<dyn KeyValueStore>,
}

impl StatsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Zeroes wins, losses and defuse charges that do not exist yet. Safe to
    /// call any number of times.
    pub async fn ensure_initialized(&self, username: &Username) -> Result<(), GameError> {
        let created_win = self
            .store
            .hash_set_if_absent(WIN_NAMESPACE, username.as_str(), "0")
            .await?;
        let created_lose = self
            .store
            .hash_set_if_absent(LOSE_NAMESPACE, username.as_str(), "0")
            .await?;
        let created_defuse = self
            .store
            .hash_set_if_absent(&player_namespace(username), DEFUSE_FIELD, "0")
            .await?;
        if created_win || created_lose || created_defuse {
            info!(%username, "stats initialized");
        }
        Ok(())
    }

    pub async fn record_win(&self, username: &Username) -> Result<u64, GameError> {
        let wins = self
            .store
            .hash_increment(WIN_NAMESPACE, username.as_str(), 1)
            .await?;
        info!(%username, wins, "win recorded");
        Ok(as_count(wins))
    }

    pub async fn record_loss(&self, username: &Username) -> Result<u64, GameError> {
        let losses = self
            .store
            .hash_increment(LOSE_NAMESPACE, username.as_str(), 1)
            .await?;
        info!(%username, losses, "loss recorded");
        Ok(as_count(losses))
    }

    pub async fn stats(&self, username: &Username) -> Result<PlayerStats, GameError> {
        let wins = self.store.hash_get(WIN_NAMESPACE, username.as_str()).await?;
        let losses = self.store.hash_get(LOSE_NAMESPACE, username.as_str()).await?;
        Ok(PlayerStats {
            wins: wins.as_deref().map(parse_counter).unwrap_or(0),
            losses: losses.as_deref().map(parse_counter).unwrap_or(0),
        })
    }

    pub async fn defuse_charges(&self, username: &Username) -> Result<u32, GameError> {
        let raw = self
            .store
            .hash_get(&player_namespace(username), DEFUSE_FIELD)
            .await?;
        Ok(raw
            .as_deref()
            .map(parse_counter)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or(0))
    }

    pub async fn set_defuse_charges(
        &self,
        username: &Username,
        charges: u32,
    ) -> Result<(), GameError> {
        self.store
            .hash_set(&player_namespace(username), DEFUSE_FIELD, &charges.to_string())
            .await?;
        Ok(())
    }

    pub async fn add_defuse_charge(&self, username: &Username) -> Result<u32, GameError> {
        self.adjust_defuse_charges(username, 1).await
    }

    /// Spends one charge; a user with none stays at zero.
    pub async fn consume_defuse_charge(&self, username: &Username) -> Result<u32, GameError> {
        self.adjust_defuse_charges(username, -1).await
    }

    async fn adjust_defuse_charges(
        &self,
        username: &Username,
        delta: i64,
    ) -> Result<u32, GameError> {
        let charges = self
            .store
            .hash_increment(&player_namespace(username), DEFUSE_FIELD, delta)
            .await?;
        Ok(u32::try_from(charges).unwrap_or(0))
    }

    /// Full leaderboard, ordered by username. A player known to only one of
    /// the two counters reports zero for the other.
    pub async fn snapshot_all(&self) -> Result<Vec<LeaderboardEntry>, GameError> {
        let wins = self.store.hash_get_all(WIN_NAMESPACE).await?;
        let losses = self.store.hash_get_all(LOSE_NAMESPACE).await?;

        let mut board: BTreeMap<String, PlayerStats> = BTreeMap::new();
        for (username, raw) in wins {
            board.entry(username).or_default().wins = parse_counter(&raw);
        }
        for (username, raw) in losses {
            board.entry(username).or_default().losses = parse_counter(&raw);
        }

        Ok(board
            .into_iter()
            .map(|(username, stats)| LeaderboardEntry {
                username,
                wins: stats.wins,
                losses: stats.losses,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/stats_tests.rs"]
mod tests;
