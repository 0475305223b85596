//! Action rejection reasons.
//!
//! `IllegalAction` covers everything a caller can legitimately trigger by
//! submitting a move that the rules refuse: wrong phase, unpaid cost, bad
//! target. Detection happens before any mutation, so a rejected action leaves
//! the game untouched and the caller free to try something else.
//!
//! Internal consistency failures (an unknown id inside the engine, a missing
//! blocker mapping during distribution) are not part of this type: those are
//! bugs and panic immediately rather than surfacing as a rejection.

use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use crate::game::Phase;

/// Why an action was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IllegalAction {
    /// The acting player does not hold priority right now.
    NotYourTurn { player: PlayerId },
    /// The action is not legal in the current phase.
    WrongPhase { phase: Phase },
    /// A card choice is outstanding; only `AnswerChoice` is accepted.
    ChoicePending,
    /// The referenced card id is not known to the game.
    UnknownCard,
    /// The card is not in a zone where this action applies.
    WrongZone,
    /// The player cannot pay the card's cost.
    CostNotMet,
    /// A targeter rejected the chosen targets.
    InvalidTarget,
    /// The unit is not allowed to attack (not ready, exhausted, or disabled).
    CannotAttack,
    /// The unit is not allowed to block, or the attacker is unblockable by it.
    CannotBlock,
    /// An answer to a pending choice did not match the posed candidates.
    InvalidAnswer,
    /// A damage-distribution order named the wrong attacker or blockers.
    InvalidOrder,
    /// The game has already ended.
    GameOver,
}

impl std::fmt::Display for IllegalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotYourTurn { player } => write!(f, "{player} does not have priority"),
            Self::WrongPhase { phase } => write!(f, "action is not legal during {phase:?}"),
            Self::ChoicePending => write!(f, "a card choice is pending"),
            Self::UnknownCard => write!(f, "unknown card id"),
            Self::WrongZone => write!(f, "card is not in a legal zone for this action"),
            Self::CostNotMet => write!(f, "cost cannot be paid"),
            Self::InvalidTarget => write!(f, "chosen targets are not valid"),
            Self::CannotAttack => write!(f, "unit cannot attack"),
            Self::CannotBlock => write!(f, "unit cannot block"),
            Self::InvalidAnswer => write!(f, "answer does not match the pending choice"),
            Self::InvalidOrder => write!(f, "damage distribution order is not valid"),
            Self::GameOver => write!(f, "the game is over"),
        }
    }
}

impl std::error::Error for IllegalAction {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = IllegalAction::NotYourTurn {
            player: PlayerId::ONE,
        };
        assert_eq!(format!("{err}"), "Player 0 does not have priority");
        assert_eq!(format!("{}", IllegalAction::CostNotMet), "cost cannot be paid");
    }

    #[test]
    fn test_serialization() {
        let err = IllegalAction::WrongPhase { phase: Phase::Block };
        let json = serde_json::to_string(&err).unwrap();
        let back: IllegalAction = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
