//! The evaluation contract.
//!
//! Evaluation answers "how much is this card worth right now" for a given
//! purpose. It is side-effect free; callers thread an `EvalMemo` through a
//! pass so repeated lookups are cheap and recursive references terminate.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::core::CardId;

/// What the caller will do with the number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalContext {
    /// Choosing what to kill; value as a threat to remove permanently.
    LethalRemoval,
    /// Choosing what to wound or weaken without killing.
    NonlethalRemoval,
    /// Choosing what to play; value as an addition to the board.
    Play,
}

/// One mechanic's contribution to a card's value.
///
/// Contributions combine as `(base + sum of addends) * product of
/// multipliers`, so order of combination never matters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalScore {
    pub addend: f64,
    pub multiplier: f64,
}

impl EvalScore {
    #[must_use]
    pub fn zero() -> Self {
        Self {
            addend: 0.0,
            multiplier: 1.0,
        }
    }

    #[must_use]
    pub fn addend(addend: f64) -> Self {
        Self {
            addend,
            multiplier: 1.0,
        }
    }

    #[must_use]
    pub fn multiplier(multiplier: f64) -> Self {
        Self {
            addend: 0.0,
            multiplier,
        }
    }

    /// Discount by a probability: the addend scales, the multiplier is
    /// pulled toward the identity.
    #[must_use]
    pub fn discounted(self, likelihood: f64) -> Self {
        Self {
            addend: self.addend * likelihood,
            multiplier: 1.0 + (self.multiplier - 1.0) * likelihood,
        }
    }

    /// Fold a base value and a set of contributions into a final number.
    #[must_use]
    pub fn resolve(base: f64, scores: impl IntoIterator<Item = EvalScore>) -> f64 {
        let mut addend = base;
        let mut multiplier = 1.0;
        for score in scores {
            addend += score.addend;
            multiplier *= score.multiplier;
        }
        addend * multiplier
    }
}

/// Per-pass cache plus the recursion breaker.
///
/// A card whose evaluation is already on the stack reports only its raw
/// stats when looked up again, so mutually referential mechanics cannot
/// loop.
#[derive(Debug, Default)]
pub struct EvalMemo {
    cache: FxHashMap<(CardId, EvalContext), f64>,
    in_progress: FxHashSet<CardId>,
}

impl EvalMemo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, card: CardId, ctx: EvalContext) -> Option<f64> {
        self.cache.get(&(card, ctx)).copied()
    }

    /// Mark a card as mid-evaluation. Returns false when it already is, in
    /// which case the caller must fall back to the raw-stat value.
    pub fn begin(&mut self, card: CardId) -> bool {
        self.in_progress.insert(card)
    }

    /// Record a finished evaluation and clear the in-progress mark.
    pub fn finish(&mut self, card: CardId, ctx: EvalContext, value: f64) {
        self.in_progress.remove(&card);
        self.cache.insert((card, ctx), value);
    }
}
