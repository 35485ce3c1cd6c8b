//! Pure mapping from a drawn card and the player's banked defuse charges to
//! the outcome of that draw and the state changes it requires.

use shared::{domain::CardKind, protocol::DrawOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    GainDefuse,
    SpendDefuse,
    RecordLoss,
    /// Fresh shuffled deck and no banked defuse charges.
    ResetSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: DrawOutcome,
    pub card: Option<CardKind>,
    pub effects: &'static [SideEffect],
}

const NO_EFFECTS: &[SideEffect] = &[];
const GAIN_DEFUSE: &[SideEffect] = &[SideEffect::GainDefuse];
const SPEND_DEFUSE: &[SideEffect] = &[SideEffect::SpendDefuse];
const RESET: &[SideEffect] = &[SideEffect::ResetSession];
const LOSS: &[SideEffect] = &[SideEffect::RecordLoss];
const LOSS_THEN_RESET: &[SideEffect] = &[SideEffect::RecordLoss, SideEffect::ResetSession];

/// `drawn` is `None` when the deck was already empty before the draw.
pub fn resolve(drawn: Option<CardKind>, defuse_charges: u32) -> Resolution {
    let (outcome, effects) = match drawn {
        None => (DrawOutcome::DeckExhausted, LOSS),
        Some(CardKind::Cat) => (DrawOutcome::CatDrawn, NO_EFFECTS),
        Some(CardKind::Defuse) => (DrawOutcome::DefuseAcquired, GAIN_DEFUSE),
        Some(CardKind::Shuffle) => (DrawOutcome::DeckReshuffled, RESET),
        Some(CardKind::ExplodingKitten) if defuse_charges > 0 => {
            (DrawOutcome::Defused, SPEND_DEFUSE)
        }
        Some(CardKind::ExplodingKitten) => (DrawOutcome::PlayerLost, LOSS_THEN_RESET),
    };
    Resolution {
        outcome,
        card: drawn,
        effects,
    }
}

pub fn message(outcome: DrawOutcome) -> &'static str {
    match outcome {
        DrawOutcome::CatDrawn => "You drew a Cat card!",
        DrawOutcome::DefuseAcquired => {
            "You drew a Defuse card! Keep this to defuse an Exploding Kitten."
        }
        DrawOutcome::DeckReshuffled => "You drew a Shuffle card! The deck is reshuffled.",
        DrawOutcome::Defused => "You defused the Exploding Kitten using your Defuse card!",
        DrawOutcome::PlayerLost => "You drew an Exploding Kitten! You lose!",
        DrawOutcome::DeckExhausted => "No cards left in the deck",
    }
}
