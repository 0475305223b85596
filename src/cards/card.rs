//! Card instances and their zone / combat sub-state.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::{CardId, MechanicId, PlayerId, ProtoId};
use crate::mechanics::MechanicKey;
use crate::targeting::Targeter;

use super::cost::Cost;

/// Where a card currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameZone {
    Deck,
    Hand,
    Board,
    Crypt,
}

/// Combat and survival state carried only by units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub attack: i64,
    pub life: i64,
    pub max_life: i64,
    /// Cleared the turn the unit enters; set at its owner's next turn start.
    pub ready: bool,
    /// Spent for this turn (attacked, or was consumed by an effect).
    pub exhausted: bool,
    pub attacking: bool,
    /// The attacker this unit has declared a block against.
    pub blocking: Option<CardId>,
    /// Attack-disabling effects currently applied, counted so they stack.
    pub attack_disabled: u32,
    /// Block-disabling effects currently applied.
    pub block_disabled: u32,
    /// Mechanic keys this unit cannot receive.
    pub immune: FxHashSet<MechanicKey>,
}

impl UnitState {
    #[must_use]
    pub fn new(attack: i64, life: i64) -> Self {
        Self {
            attack,
            life,
            max_life: life,
            ready: false,
            exhausted: false,
            attacking: false,
            blocking: None,
            attack_disabled: 0,
            block_disabled: 0,
            immune: FxHashSet::default(),
        }
    }

    /// Reduce life. Damage is never negative and life never goes back up
    /// through this path.
    pub fn take_damage(&mut self, amount: i64) {
        self.life -= amount.max(0);
    }

    /// Restore life, capped at the maximum.
    pub fn heal(&mut self, amount: i64) {
        self.life = (self.life + amount.max(0)).min(self.max_life);
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.life <= 0
    }

    /// Local half of attack legality; the phase and turn checks live with
    /// the action gate.
    #[must_use]
    pub fn can_attack(&self) -> bool {
        self.ready && !self.exhausted && self.attack_disabled == 0
    }

    /// Local half of block legality.
    #[must_use]
    pub fn can_block(&self) -> bool {
        !self.exhausted && self.block_disabled == 0
    }

    /// Drop all combat declarations (end of combat, or on leaving the board).
    pub fn clear_combat(&mut self) {
        self.attacking = false;
        self.blocking = None;
    }
}

/// State carried only by items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    /// The unit this item is attached to, if any.
    pub host: Option<CardId>,
    /// Mechanics this item has granted to its host, removed on detach.
    pub granted: Vec<MechanicId>,
}

/// State carried only by enchantments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnchantState {
    /// Adjustable power level; effects scale with it.
    pub power: i64,
}

/// What flavor of permanent a card is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardKind {
    Unit(UnitState),
    Item(ItemState),
    Enchantment(EnchantState),
}

/// A single card instance owned by the game arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub proto: ProtoId,
    pub name: String,
    pub owner: PlayerId,
    pub cost: Cost,
    pub zone: GameZone,
    pub kind: CardKind,
    /// Mechanics instantiated for this card, in template order.
    pub mechanics: Vec<MechanicId>,
    /// Play-time target selection, if the card asks for one.
    pub targeter: Option<Targeter>,
}

impl Card {
    #[must_use]
    pub fn is_unit(&self) -> bool {
        matches!(self.kind, CardKind::Unit(_))
    }

    #[must_use]
    pub fn as_unit(&self) -> Option<&UnitState> {
        match &self.kind {
            CardKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut UnitState> {
        match &mut self.kind {
            CardKind::Unit(unit) => Some(unit),
            _ => None,
        }
    }

    /// Unit state, panicking when the card is not a unit. Used on paths
    /// where the caller has already established the kind.
    #[must_use]
    pub fn unit(&self) -> &UnitState {
        self.as_unit().expect("card is not a unit")
    }

    pub fn unit_mut(&mut self) -> &mut UnitState {
        self.as_unit_mut().expect("card is not a unit")
    }

    #[must_use]
    pub fn as_item(&self) -> Option<&ItemState> {
        match &self.kind {
            CardKind::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut ItemState> {
        match &mut self.kind {
            CardKind::Item(item) => Some(item),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enchant(&self) -> Option<&EnchantState> {
        match &self.kind {
            CardKind::Enchantment(ench) => Some(ench),
            _ => None,
        }
    }

    pub fn as_enchant_mut(&mut self) -> Option<&mut EnchantState> {
        match &mut self.kind {
            CardKind::Enchantment(ench) => Some(ench),
            _ => None,
        }
    }
}
