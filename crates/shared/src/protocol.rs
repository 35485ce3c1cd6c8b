use serde::{Deserialize, Serialize};

use crate::domain::{CardKind, Username};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGameResponse {
    pub message: String,
    pub username: Username,
    pub resumed: bool,
    pub deck: Vec<CardKind>,
}

/// Classification of a single draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOutcome {
    CatDrawn,
    DefuseAcquired,
    DeckReshuffled,
    Defused,
    PlayerLost,
    DeckExhausted,
}

impl DrawOutcome {
    /// Outcomes that bump a win/loss counter and therefore change the leaderboard.
    pub fn touches_stats(self) -> bool {
        matches!(self, DrawOutcome::PlayerLost | DrawOutcome::DeckExhausted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawCardResponse {
    pub outcome: DrawOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub message: String,
    pub defuse_charges: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wins: u64,
    pub losses: u64,
}
