//! Turn phases and priority.

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// The phases of one turn, in order. `End` is processed, not sat in: the
/// engine runs end-of-turn work and hands the next turn over, pausing only
/// for a discard choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// First main phase; the active player plays cards and declares attackers.
    Play1,
    /// The defending player declares blockers.
    Block,
    /// The attacking player may reorder blockers before damage applies.
    DamageDistribution,
    /// Second main phase.
    Play2,
    /// End-of-turn processing.
    End,
    /// Reserved for future stack-style interaction; never entered by the
    /// base rules.
    Response,
}

impl Phase {
    /// Phases where cards, resources, and enchantment changes are legal.
    #[must_use]
    pub fn is_main(self) -> bool {
        matches!(self, Self::Play1 | Self::Play2)
    }

    /// Who may act: the active player, except during `Block` where the
    /// defender holds priority.
    #[must_use]
    pub fn priority(self, active: PlayerId) -> PlayerId {
        match self {
            Self::Block => active.opponent(),
            _ => active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_inverts_during_block() {
        assert_eq!(Phase::Play1.priority(PlayerId::ONE), PlayerId::ONE);
        assert_eq!(Phase::Block.priority(PlayerId::ONE), PlayerId::TWO);
        assert_eq!(Phase::DamageDistribution.priority(PlayerId::ONE), PlayerId::ONE);
    }

    #[test]
    fn test_main_phases() {
        assert!(Phase::Play1.is_main());
        assert!(Phase::Play2.is_main());
        assert!(!Phase::Block.is_main());
        assert!(!Phase::End.is_main());
    }
}
