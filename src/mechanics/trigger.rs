//! When a mechanic fires.
//!
//! A trigger kind maps to the bus subscriptions the mechanic needs while its
//! carrier is in play, plus a match predicate the dispatcher applies before
//! resolving the effect.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{CardId, PlayerId};
use crate::events::{EventKind, EventParams, EventScope};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Fires once when the carrier is played.
    OnPlay,
    /// Fires when the carrier dies.
    OnDeath,
    /// Fires at the start of the carrier's owner's turn.
    OnTurnStart,
    /// Fires at the end of the carrier's owner's turn.
    OnTurnEnd,
    /// Fires when the carrier takes damage.
    OnDamageTaken,
    /// Fires when the carrier is declared as an attacker.
    OnAttack,
    /// Fires when the carrier exchanges damage as a blocker.
    OnBlock,
}

impl TriggerKind {
    /// The subscriptions this trigger needs while the carrier is in play.
    #[must_use]
    pub fn subscriptions(&self, parent: CardId) -> SmallVec<[(EventScope, EventKind); 2]> {
        let mut subs = SmallVec::new();
        match self {
            Self::OnPlay => subs.push((EventScope::Entity(parent), EventKind::CardPlayed)),
            Self::OnDeath => subs.push((EventScope::Entity(parent), EventKind::UnitDied)),
            Self::OnTurnStart => subs.push((EventScope::Global, EventKind::TurnStart)),
            Self::OnTurnEnd => subs.push((EventScope::Global, EventKind::TurnEnd)),
            Self::OnDamageTaken => {
                subs.push((EventScope::Entity(parent), EventKind::DamageTaken));
            }
            Self::OnAttack => {
                subs.push((EventScope::Entity(parent), EventKind::AttackDeclared));
            }
            Self::OnBlock => {
                subs.push((EventScope::Entity(parent), EventKind::BlockResolved));
            }
        }
        subs
    }

    /// Does this published event actually concern the carrier? Entity-scoped
    /// subscriptions are already filtered by the scope; the global turn
    /// triggers still check whose turn it is, and the exchange trigger
    /// checks which side of the exchange the carrier is on.
    #[must_use]
    pub fn matches(&self, params: &EventParams, parent: CardId, owner: PlayerId) -> bool {
        match self {
            Self::OnTurnStart | Self::OnTurnEnd => params.player == Some(owner),
            Self::OnBlock => params.source == Some(parent),
            _ => true,
        }
    }

    /// Rough chance the trigger ever fires, used to discount the value of
    /// the attached effect during evaluation.
    #[must_use]
    pub fn likelihood(&self) -> f64 {
        match self {
            Self::OnPlay => 1.0,
            Self::OnTurnStart | Self::OnTurnEnd => 0.9,
            Self::OnDeath => 0.6,
            Self::OnDamageTaken => 0.5,
            Self::OnAttack => 0.5,
            Self::OnBlock => 0.4,
        }
    }
}
