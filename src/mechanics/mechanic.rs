//! Mechanic templates and live instances.
//!
//! A template is authored on a proto; instantiating it produces a `Mechanic`
//! owned by the game arena and attached to a card. Adding a second instance
//! with the same key to the same card stacks onto the existing instance
//! instead, so a card never carries duplicate subscriptions for one key.

use serde::{Deserialize, Serialize};

use crate::core::{CardId, MechanicId};
use crate::targeting::Targeter;

use super::evaluate::{EvalContext, EvalScore};
use super::kinds::MechanicKind;
use super::trigger::TriggerKind;

/// Stable identity used for stacking and immunity. Every authored mechanic
/// picks one; two mechanics with the same key on the same card merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MechanicKey(pub u32);

impl MechanicKey {
    pub const POISON: Self = Self(1);
    pub const SHIELD: Self = Self(2);
    pub const PACIFY: Self = Self(3);
}

impl std::fmt::Display for MechanicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key{}", self.0)
    }
}

/// Authored description of a mechanic, attached to a proto.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MechanicTemplate {
    pub key: MechanicKey,
    pub kind: MechanicKind,
    pub trigger: Option<TriggerKind>,
    pub targeter: Option<Targeter>,
    /// Dispatch order among handlers of the same event; lower fires first.
    pub priority: i32,
}

impl MechanicTemplate {
    #[must_use]
    pub fn new(key: MechanicKey, kind: MechanicKind) -> Self {
        Self {
            key,
            kind,
            trigger: None,
            targeter: None,
            priority: 0,
        }
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn with_targeter(mut self, targeter: Targeter) -> Self {
        self.targeter = Some(targeter);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Instantiate for a parent card. Fresh state every time; instances share
    /// nothing with the template or each other.
    #[must_use]
    pub fn instantiate(&self, id: MechanicId, parent: CardId) -> Mechanic {
        let charge = match self.kind {
            MechanicKind::PreventDamage { amount } => amount,
            _ => 0,
        };
        Mechanic {
            id,
            key: self.key,
            parent,
            kind: self.kind.clone(),
            trigger: self.trigger,
            targeter: self.targeter.clone(),
            priority: self.priority,
            level: 1,
            charge,
            depleted: false,
        }
    }
}

/// A live mechanic instance attached to one card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mechanic {
    pub id: MechanicId,
    pub key: MechanicKey,
    pub parent: CardId,
    pub kind: MechanicKind,
    pub trigger: Option<TriggerKind>,
    pub targeter: Option<Targeter>,
    pub priority: i32,
    /// Stack height. Duplicate applications raise this instead of attaching
    /// a second instance.
    pub level: i64,
    /// Remaining absorption for `PreventDamage`; unused otherwise.
    pub charge: i64,
    /// Set once a one-shot trigger has fired.
    pub depleted: bool,
}

impl Mechanic {
    /// Merge another application of the same key onto this instance.
    pub fn stack(&mut self, template: &MechanicTemplate) {
        debug_assert_eq!(self.key, template.key);
        self.level += 1;
        if let MechanicKind::PreventDamage { amount } = template.kind {
            self.charge += amount;
        }
    }

    /// Absorb up to `amount` incoming damage, returning what gets through.
    pub fn absorb(&mut self, amount: i64) -> i64 {
        let absorbed = amount.min(self.charge).max(0);
        self.charge -= absorbed;
        if self.charge == 0 {
            self.depleted = true;
        }
        amount - absorbed
    }

    /// Heuristic worth of this mechanic to its carrier. Triggered effects
    /// are discounted by the trigger's likelihood; game-dependent kinds are
    /// topped up by the game's evaluator, which can see the rest of the
    /// state.
    #[must_use]
    pub fn score(&self, ctx: EvalContext) -> EvalScore {
        if self.depleted {
            return EvalScore::zero();
        }
        let base = match &self.kind {
            MechanicKind::StatBonus { attack, life } => {
                EvalScore::addend((attack + life) as f64 * self.level as f64)
            }
            MechanicKind::PreventDamage { .. } => {
                let worth = match ctx {
                    EvalContext::NonlethalRemoval => self.charge as f64 * 0.5,
                    _ => self.charge as f64,
                };
                EvalScore::addend(worth)
            }
            MechanicKind::Poison { per_turn } => {
                EvalScore::addend(-2.0 * (*per_turn * self.level) as f64)
            }
            MechanicKind::DealDamage { amount } => {
                EvalScore::addend((*amount * self.level) as f64)
            }
            MechanicKind::HealTargets { amount } => {
                let worth = match ctx {
                    EvalContext::LethalRemoval => 0.0,
                    _ => (*amount * self.level) as f64 * 0.5,
                };
                EvalScore::addend(worth)
            }
            MechanicKind::DrawCards { count } => {
                let per_card = match ctx {
                    EvalContext::Play => 2.0,
                    _ => 1.5,
                };
                EvalScore::addend((*count * self.level) as f64 * per_card)
            }
            MechanicKind::GrantOnHost { template } => {
                // Value what the host would gain, at this instance's level.
                let mut proxy = template.instantiate(self.id, self.parent);
                proxy.level = self.level;
                proxy.score(ctx)
            }
            MechanicKind::DisableAttack => EvalScore::multiplier(0.5),
            MechanicKind::DisableBlock => EvalScore::multiplier(0.8),
            MechanicKind::RaiseFromCrypt => EvalScore::addend(2.0),
            MechanicKind::Annihilate => EvalScore::addend(4.0),
        };
        match self.trigger {
            Some(trigger) => base.discounted(trigger.likelihood()),
            None => base,
        }
    }
}
