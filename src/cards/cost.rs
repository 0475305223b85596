//! Costs and per-player resource pools.
//!
//! A cost is a numeric amount plus a vector of typed requirements. The engine
//! only consumes costs through `ResourcePool::meets` and `spend`; nothing
//! else inspects them.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A typed resource requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Order,
    Chaos,
    Growth,
    Decay,
}

impl ResourceKind {
    pub(crate) const COUNT: usize = 4;

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Order => 0,
            Self::Chaos => 1,
            Self::Growth => 2,
            Self::Decay => 3,
        }
    }
}

/// What it takes to play a card.
///
/// `amount` is spent from the pool; `kinds` must each be covered by resources
/// of that kind the player has committed (they gate, they are not spent
/// separately).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// Generic amount, spent from the pool.
    pub amount: i64,
    /// Typed requirements; duplicates demand multiples of that kind.
    pub kinds: SmallVec<[ResourceKind; 2]>,
}

impl Cost {
    /// A free cost.
    #[must_use]
    pub fn free() -> Self {
        Self::default()
    }

    /// A purely generic cost.
    #[must_use]
    pub fn generic(amount: i64) -> Self {
        Self {
            amount,
            kinds: SmallVec::new(),
        }
    }

    /// Add a typed requirement (builder pattern).
    #[must_use]
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// How many resources of `kind` this cost demands.
    #[must_use]
    pub fn demanded(&self, kind: ResourceKind) -> i64 {
        self.kinds.iter().filter(|&&k| k == kind).count() as i64
    }
}

/// A player's resources.
///
/// `max` grows by one per resource played; `current` refills to `max` at the
/// start of the owner's turn and is spent by cost amounts within the turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    current: i64,
    max: i64,
    kinds: [i64; ResourceKind::COUNT],
}

impl ResourcePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spendable amount right now.
    #[must_use]
    pub fn current(&self) -> i64 {
        self.current
    }

    /// Pool ceiling.
    #[must_use]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Committed resources of one kind.
    #[must_use]
    pub fn kind_count(&self, kind: ResourceKind) -> i64 {
        self.kinds[kind.index()]
    }

    /// Commit one more resource of `kind`: raises the ceiling and grants the
    /// new point immediately.
    pub fn grow(&mut self, kind: ResourceKind) {
        self.max += 1;
        self.current += 1;
        self.kinds[kind.index()] += 1;
    }

    /// Refill to the ceiling (start of the owner's turn).
    pub fn refill(&mut self) {
        self.current = self.max;
    }

    /// Can this pool pay `cost`?
    #[must_use]
    pub fn meets(&self, cost: &Cost) -> bool {
        if self.current < cost.amount {
            return false;
        }
        [
            ResourceKind::Order,
            ResourceKind::Chaos,
            ResourceKind::Growth,
            ResourceKind::Decay,
        ]
        .iter()
        .all(|&k| self.kind_count(k) >= cost.demanded(k))
    }

    /// Pay `cost`. Panics if it cannot be met; callers gate on `meets` first.
    pub fn spend(&mut self, cost: &Cost) {
        assert!(self.meets(cost), "spend called with unmet cost");
        self.current -= cost.amount;
    }
}
