use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ApiException, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    Cat,
    Defuse,
    Shuffle,
    #[serde(rename = "Exploding Kitten")]
    ExplodingKitten,
}

/// Composition every fresh deck starts from, before shuffling.
pub const CANONICAL_DECK: [CardKind; 5] = [
    CardKind::Cat,
    CardKind::Cat,
    CardKind::Defuse,
    CardKind::Shuffle,
    CardKind::ExplodingKitten,
];

impl CardKind {
    pub const ALL: [CardKind; 4] = [
        CardKind::Cat,
        CardKind::Defuse,
        CardKind::Shuffle,
        CardKind::ExplodingKitten,
    ];

    /// Name used both on the wire and as the stored list entry.
    pub fn name(self) -> &'static str {
        match self {
            CardKind::Cat => "Cat",
            CardKind::Defuse => "Defuse",
            CardKind::Shuffle => "Shuffle",
            CardKind::ExplodingKitten => "Exploding Kitten",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            CardKind::Cat => "\u{1F63C}",
            CardKind::Defuse => "\u{1F645}\u{200D}\u{2642}\u{FE0F}",
            CardKind::Shuffle => "\u{1F500}",
            CardKind::ExplodingKitten => "\u{1F4A3}",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown card kind '{0}'")]
pub struct UnknownCardKind(pub String);

impl FromStr for CardKind {
    type Err = UnknownCardKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownCardKind(s.to_string()))
    }
}

/// Opaque player identity. The only rule is that it is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ApiException> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ApiException::new(
                ErrorCode::Validation,
                "username must not be empty",
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ApiException;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    pub wins: u64,
    pub losses: u64,
}
