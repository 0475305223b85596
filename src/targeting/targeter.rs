//! Target selection for cards and mechanics.
//!
//! A targeter describes who may be chosen and how many; the chosen list is
//! filled in by the acting player (or auto-filled when no choice exists) and
//! re-validated at resolution time, since the board may have changed.

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::core::CardId;
use crate::game::Game;

/// The eligible pool, relative to the source card's owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetWho {
    /// Every unit in play; no choice is made.
    AllUnits,
    /// Units controlled by the source's owner.
    AlliedUnits,
    /// Units controlled by the opponent.
    EnemyUnits,
    /// Any unit in play.
    AnyUnit,
    /// A friendly unit to host an item.
    HostUnit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeter {
    pub who: TargetWho,
    /// Upper bound on picks.
    pub count: usize,
    /// When set, picking fewer than `count` (including none) is legal.
    pub optional: bool,
    /// The selection in play order.
    pub chosen: Vec<CardId>,
}

impl Targeter {
    #[must_use]
    pub fn new(who: TargetWho, count: usize) -> Self {
        Self {
            who,
            count,
            optional: false,
            chosen: Vec::new(),
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether the acting player is asked to pick at all.
    #[must_use]
    pub fn needs_input(&self) -> bool {
        !matches!(self.who, TargetWho::AllUnits) && self.count > 0
    }

    fn allows(&self, source: &Card, candidate: &Card) -> bool {
        if !candidate.is_unit() {
            return false;
        }
        if candidate.id == source.id {
            return false;
        }
        match self.who {
            TargetWho::AllUnits | TargetWho::AnyUnit => true,
            TargetWho::AlliedUnits | TargetWho::HostUnit => candidate.owner == source.owner,
            TargetWho::EnemyUnits => candidate.owner != source.owner,
        }
    }

    /// Everything currently eligible.
    #[must_use]
    pub fn valid_targets(&self, source: &Card, game: &Game) -> Vec<CardId> {
        game.units_in_play()
            .filter(|candidate| self.allows(source, candidate))
            .map(|candidate| candidate.id)
            .collect()
    }

    /// Can this targeter be satisfied at all right now? A mandatory targeter
    /// with nothing eligible cannot, and gates playability.
    #[must_use]
    pub fn satisfiable(&self, source: &Card, game: &Game) -> bool {
        !self.needs_input()
            || self.optional
            || !self.valid_targets(source, game).is_empty()
    }

    /// Would `chosen` be a legal selection right now? Duplicates, strangers,
    /// and wrong counts all fail. When fewer eligible targets exist than
    /// `count`, a mandatory targeter must take all of them.
    #[must_use]
    pub fn accepts(&self, chosen: &[CardId], source: &Card, game: &Game) -> bool {
        if !self.needs_input() {
            return true;
        }
        let valid = self.valid_targets(source, game);
        if chosen.len() > self.count {
            return false;
        }
        let required = if self.optional {
            0
        } else {
            if valid.is_empty() {
                return false;
            }
            self.count.min(valid.len())
        };
        if chosen.len() < required {
            return false;
        }
        for (i, id) in chosen.iter().enumerate() {
            if !valid.contains(id) || chosen[..i].contains(id) {
                return false;
            }
        }
        true
    }

    /// Is the stored selection still legal against the current board?
    #[must_use]
    pub fn still_valid(&self, source: &Card, game: &Game) -> bool {
        self.accepts(&self.chosen, source, game)
    }

    /// The ids the effect should act on: the stored choice, or the whole
    /// eligible pool when no choice is made.
    #[must_use]
    pub fn resolve(&self, source: &Card, game: &Game) -> Vec<CardId> {
        match self.who {
            TargetWho::AllUnits => self.valid_targets(source, game),
            _ => self.chosen.clone(),
        }
    }
}
