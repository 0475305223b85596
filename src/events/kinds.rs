//! Event kinds and payloads.
//!
//! Events are how state changes reach attached mechanics. A publish hands one
//! mutable `EventParams` value down the handler chain; each handler may
//! rewrite it before the next sees it. That chain rewrite is the damage
//! pipeline: a shield mechanic drops `amount` to 0 and every later handler
//! (and the engine itself) observes the reduced value.

use serde::{Deserialize, Serialize};

use crate::core::{CardId, PlayerId};

/// The kinds of events the engine publishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A new turn began for `player`.
    TurnStart,
    /// The current turn is ending (fires before the discard check).
    TurnEnd,
    /// A card left its owner's hand and its effects resolved.
    CardPlayed,
    /// A card moved from deck to hand.
    CardDrawn,
    /// A permanent entered the board.
    EntersPlay,
    /// A permanent is leaving the board (any path: death, annihilate, bounce).
    LeavesPlay,
    /// A unit died (fires after `LeavesPlay`, only on the death path).
    UnitDied,
    /// A unit is about to take damage. `amount` is rewritable in flight.
    DamageTaken,
    /// A unit dealt damage (fires after the amount is final).
    DamageDealt,
    /// A unit was declared as an attacker.
    AttackDeclared,
    /// A unit was declared as a blocker.
    BlockDeclared,
    /// An attacker is striking one blocker (or, with `player` set, the
    /// defending player) during combat application. `amount` is the damage
    /// being assigned.
    AttackResolved,
    /// A blocker is exchanging damage with its attacker during combat
    /// application.
    BlockResolved,
    /// Permission check: may `target` be blocked at all? Handlers may clear
    /// `approved`.
    CheckBlockable,
    /// Permission check: may `source` block `target`? Handlers may clear
    /// `approved`.
    CheckCanBlock,
    /// An enchantment's power changed.
    EnchantmentModified,
    /// The game ended.
    GameEnded,
}

/// Mutable event payload passed through the handler chain.
///
/// One struct for all kinds; unused fields stay at their defaults. Handlers
/// receive `&mut EventParams` and edits are visible to every later handler in
/// the same publish.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParams {
    /// What happened.
    pub kind: EventKind,
    /// The card that caused the event, if any.
    pub source: Option<CardId>,
    /// The card the event is about, if any.
    pub target: Option<CardId>,
    /// The player the event is about, if any.
    pub player: Option<PlayerId>,
    /// Magnitude (damage amount, power delta). Rewritable by handlers.
    pub amount: i64,
    /// Permission flag for `Check*` events. Starts true; any handler may
    /// clear it, and the engine treats a cleared flag as a veto.
    pub approved: bool,
}

impl EventParams {
    /// Create params with just a kind.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            source: None,
            target: None,
            player: None,
            amount: 0,
            approved: true,
        }
    }

    /// Set the source card (builder pattern).
    #[must_use]
    pub fn with_source(mut self, source: CardId) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the target card (builder pattern).
    #[must_use]
    pub fn with_target(mut self, target: CardId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the associated player (builder pattern).
    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.player = Some(player);
        self
    }

    /// Set the amount (builder pattern).
    #[must_use]
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Create a damage event payload.
    #[must_use]
    pub fn damage(source: Option<CardId>, target: CardId, amount: i64) -> Self {
        Self {
            kind: EventKind::DamageTaken,
            source,
            target: Some(target),
            player: None,
            amount,
            approved: true,
        }
    }

    /// Create a player-centric payload (turn start, turn end).
    #[must_use]
    pub fn for_player(kind: EventKind, player: PlayerId) -> Self {
        Self::new(kind).with_player(player)
    }

    /// Create a permission-check payload (`CheckBlockable`, `CheckCanBlock`).
    #[must_use]
    pub fn check(kind: EventKind, source: Option<CardId>, target: CardId) -> Self {
        Self {
            kind,
            source,
            target: Some(target),
            player: None,
            amount: 0,
            approved: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let params = EventParams::new(EventKind::CardPlayed)
            .with_source(CardId::new(10))
            .with_player(PlayerId::ONE)
            .with_amount(3);

        assert_eq!(params.kind, EventKind::CardPlayed);
        assert_eq!(params.source, Some(CardId::new(10)));
        assert_eq!(params.player, Some(PlayerId::ONE));
        assert_eq!(params.amount, 3);
        assert!(params.approved);
    }

    #[test]
    fn test_damage_payload() {
        let params = EventParams::damage(Some(CardId::new(1)), CardId::new(2), 5);
        assert_eq!(params.kind, EventKind::DamageTaken);
        assert_eq!(params.target, Some(CardId::new(2)));
        assert_eq!(params.amount, 5);
    }

    #[test]
    fn test_check_payload_starts_approved() {
        let params = EventParams::check(EventKind::CheckCanBlock, Some(CardId::new(1)), CardId::new(2));
        assert!(params.approved);
    }

    #[test]
    fn test_serialization() {
        let params = EventParams::damage(None, CardId::new(9), 2);
        let json = serde_json::to_string(&params).unwrap();
        let back: EventParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
