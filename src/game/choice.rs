//! The choice gate.
//!
//! While a multi-card choice is outstanding, the engine refuses every action
//! except the owed answer. There is no cancellation; only answering clears
//! the gate.

use serde::{Deserialize, Serialize};

use crate::core::{CardId, PlayerId};

/// What the engine does with the answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoicePurpose {
    /// Opening-hand replacement: picked cards are shuffled back and redrawn.
    Mulligan,
    /// End-of-turn hand-size enforcement: picked cards go to the crypt.
    Discard,
    /// Retrieval: the picked crypt unit returns to the board.
    Search,
}

/// An outstanding card choice posed to one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub player: PlayerId,
    pub candidates: Vec<CardId>,
    pub min: usize,
    pub max: usize,
    pub purpose: ChoicePurpose,
    pub message: String,
}

impl PendingChoice {
    /// Is `picks` a well-formed answer? Count in range, every pick among the
    /// candidates, no duplicates.
    #[must_use]
    pub fn accepts(&self, picks: &[CardId]) -> bool {
        if picks.len() < self.min || picks.len() > self.max {
            return false;
        }
        picks.iter().enumerate().all(|(i, pick)| {
            self.candidates.contains(pick) && !picks[..i].contains(pick)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(min: usize, max: usize) -> PendingChoice {
        PendingChoice {
            player: PlayerId::ONE,
            candidates: vec![CardId::new(1), CardId::new(2), CardId::new(3)],
            min,
            max,
            purpose: ChoicePurpose::Discard,
            message: String::from("discard down to the hand limit"),
        }
    }

    #[test]
    fn test_count_bounds() {
        let c = choice(1, 2);
        assert!(!c.accepts(&[]));
        assert!(c.accepts(&[CardId::new(1)]));
        assert!(c.accepts(&[CardId::new(1), CardId::new(3)]));
        assert!(!c.accepts(&[CardId::new(1), CardId::new(2), CardId::new(3)]));
    }

    #[test]
    fn test_rejects_strangers_and_duplicates() {
        let c = choice(0, 3);
        assert!(!c.accepts(&[CardId::new(9)]));
        assert!(!c.accepts(&[CardId::new(1), CardId::new(1)]));
        assert!(c.accepts(&[]));
    }
}
