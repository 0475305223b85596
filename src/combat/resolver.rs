//! Combat math: which blockers to kill, in what order, with what damage.
//!
//! Everything here is a pure function over plain data. The game extracts a
//! `Blocker` row per attacker, asks for the default order, optionally lets
//! the attacking player reorder, and only then applies the resulting hits to
//! real units.

use serde::{Deserialize, Serialize};

use crate::core::CardId;

/// One blocker as combat sees it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub id: CardId,
    pub life: i64,
    /// Worth of removing this unit permanently, from the attacker's side.
    pub value: f64,
}

/// Damage assigned to one blocker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerHit {
    pub blocker: CardId,
    pub damage: i64,
}

/// The most valuable subset of blockers the attacker's damage can fully
/// kill. 0/1 knapsack over blocker life, maximizing summed removal value;
/// returns indices into `blockers` in declaration order. The budget axis is
/// capped at the blockers' combined life, so a huge attack stays cheap.
#[must_use]
pub fn kill_subset(damage: i64, blockers: &[Blocker]) -> Vec<usize> {
    if damage <= 0 || blockers.is_empty() {
        return Vec::new();
    }
    let total: i64 = blockers.iter().map(|b| b.life.max(0)).sum();
    let cap = damage.min(total) as usize;
    if cap == 0 {
        return Vec::new();
    }
    // dp[i][b]: best value using the first i blockers within budget b. The
    // full table stays so the chosen set can be walked back out.
    let mut dp = vec![vec![0.0_f64; cap + 1]; blockers.len() + 1];
    for (i, blocker) in blockers.iter().enumerate() {
        let usable = blocker.life > 0 && blocker.life as usize <= cap && blocker.value > 0.0;
        for budget in 0..=cap {
            let mut best = dp[i][budget];
            if usable {
                let weight = blocker.life as usize;
                if budget >= weight {
                    let candidate = dp[i][budget - weight] + blocker.value;
                    if candidate > best {
                        best = candidate;
                    }
                }
            }
            dp[i + 1][budget] = best;
        }
    }

    let mut chosen = Vec::new();
    let mut budget = cap;
    for i in (0..blockers.len()).rev() {
        if dp[i + 1][budget] > dp[i][budget] {
            chosen.push(i);
            budget -= blockers[i].life as usize;
        }
    }
    chosen.reverse();
    chosen
}

/// Default blocker order: the kill subset first, survivors after, each part
/// in declaration order.
#[must_use]
pub fn default_order(damage: i64, blockers: &[Blocker]) -> Vec<CardId> {
    let chosen = kill_subset(damage, blockers);
    let mut order: Vec<CardId> = chosen.iter().map(|&i| blockers[i].id).collect();
    order.extend(
        blockers
            .iter()
            .enumerate()
            .filter(|(i, _)| !chosen.contains(i))
            .map(|(_, b)| b.id),
    );
    order
}

/// Reordering only matters when the order can change who dies: more than
/// one blocker, and not enough damage to kill them all.
#[must_use]
pub fn is_reorderable(damage: i64, blockers: &[Blocker]) -> bool {
    blockers.len() > 1 && blockers.iter().map(|b| b.life).sum::<i64>() > damage
}

/// Walk `order` spending the attacker's damage: each blocker absorbs up to
/// its life, the remainder flows on. Blockers that absorb nothing still get
/// a zero-damage hit so callers see the full order.
#[must_use]
pub fn distribute(damage: i64, order: &[Blocker]) -> Vec<BlockerHit> {
    let mut remaining = damage.max(0);
    order
        .iter()
        .map(|blocker| {
            let dealt = remaining.min(blocker.life.max(0));
            remaining -= dealt;
            BlockerHit {
                blocker: blocker.id,
                damage: dealt,
            }
        })
        .collect()
}

/// Is `order` a permutation of the declared blockers?
#[must_use]
pub fn is_valid_order(order: &[CardId], blockers: &[Blocker]) -> bool {
    if order.len() != blockers.len() {
        return false;
    }
    order.iter().all(|id| blockers.iter().any(|b| b.id == *id))
        && (1..order.len()).all(|i| !order[..i].contains(&order[i]))
}
