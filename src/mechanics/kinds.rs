//! The closed set of effect behaviors a mechanic can carry.
//!
//! Kinds are data; the game interprets them when a trigger fires or when the
//! carrying card resolves. Adding a behavior means adding a variant here and
//! a match arm in the game's resolver.

use serde::{Deserialize, Serialize};

use super::mechanic::MechanicTemplate;

/// What a mechanic does when it applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MechanicKind {
    /// Static attack/life adjustment while attached.
    StatBonus { attack: i64, life: i64 },
    /// Absorbs incoming damage until its charge runs out.
    PreventDamage { amount: i64 },
    /// Stacks on the carrier; deals `per_turn` per stack at its owner's
    /// turn end.
    Poison { per_turn: i64 },
    /// One-shot damage to the chosen targets.
    DealDamage { amount: i64 },
    /// One-shot healing to the chosen targets.
    HealTargets { amount: i64 },
    /// Owner draws cards.
    DrawCards { count: i64 },
    /// Item behavior: clone the boxed template onto the host unit.
    GrantOnHost { template: Box<MechanicTemplate> },
    /// Host cannot be declared as an attacker while this is attached.
    DisableAttack,
    /// Host cannot be declared as a blocker while this is attached.
    DisableBlock,
    /// Return the best unit from the owner's crypt to the board.
    RaiseFromCrypt,
    /// Destroy the chosen targets without firing their death triggers.
    Annihilate,
}

impl MechanicKind {
    /// Kinds that act on chosen targets need a targeter on their mechanic.
    #[must_use]
    pub fn wants_targets(&self) -> bool {
        matches!(
            self,
            Self::DealDamage { .. } | Self::HealTargets { .. } | Self::Annihilate
        )
    }

    /// Kinds whose effect modifies the carrier passively rather than firing.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            Self::StatBonus { .. }
                | Self::PreventDamage { .. }
                | Self::DisableAttack
                | Self::DisableBlock
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_targets() {
        assert!(MechanicKind::DealDamage { amount: 2 }.wants_targets());
        assert!(MechanicKind::Annihilate.wants_targets());
        assert!(!MechanicKind::DrawCards { count: 1 }.wants_targets());
        assert!(!MechanicKind::RaiseFromCrypt.wants_targets());
    }

    #[test]
    fn test_is_static() {
        assert!(MechanicKind::StatBonus { attack: 1, life: 1 }.is_static());
        assert!(MechanicKind::DisableBlock.is_static());
        assert!(!MechanicKind::Poison { per_turn: 1 }.is_static());
    }
}
