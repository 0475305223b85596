//! Card prototypes and the registry games draw decks from.
//!
//! A proto is the immutable description of a card; playing it stamps out a
//! fresh `Card` instance plus fresh mechanic instances, so no state is ever
//! shared between copies.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cards::card::{Card, CardKind, EnchantState, GameZone, ItemState, UnitState};
use crate::cards::cost::Cost;
use crate::core::{CardId, PlayerId, ProtoId};
use crate::mechanics::MechanicTemplate;
use crate::targeting::Targeter;

/// Kind-specific parts of a prototype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProtoKind {
    Unit { attack: i64, life: i64 },
    Item,
    Enchantment { power: i64 },
}

/// Immutable description of a card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardProto {
    pub id: ProtoId,
    pub name: String,
    pub cost: Cost,
    pub kind: ProtoKind,
    pub mechanics: Vec<MechanicTemplate>,
    /// Play-time target request, cloned onto every instance.
    pub targeter: Option<Targeter>,
}

impl CardProto {
    #[must_use]
    pub fn new(id: ProtoId, name: impl Into<String>, cost: Cost, kind: ProtoKind) -> Self {
        Self {
            id,
            name: name.into(),
            cost,
            kind,
            mechanics: Vec::new(),
            targeter: None,
        }
    }

    #[must_use]
    pub fn with_mechanic(mut self, template: MechanicTemplate) -> Self {
        self.mechanics.push(template);
        self
    }

    #[must_use]
    pub fn with_targeter(mut self, targeter: Targeter) -> Self {
        self.targeter = Some(targeter);
        self
    }

    /// Stamp out a card instance for `owner`. Mechanics are instantiated
    /// separately by the game because they need ids from its arena.
    #[must_use]
    pub fn instantiate(&self, id: CardId, owner: PlayerId) -> Card {
        let kind = match self.kind {
            ProtoKind::Unit { attack, life } => CardKind::Unit(UnitState::new(attack, life)),
            ProtoKind::Item => CardKind::Item(ItemState::default()),
            ProtoKind::Enchantment { power } => {
                CardKind::Enchantment(EnchantState { power })
            }
        };
        Card {
            id,
            proto: self.id,
            name: self.name.clone(),
            owner,
            cost: self.cost.clone(),
            zone: GameZone::Deck,
            kind,
            mechanics: Vec::new(),
            targeter: self.targeter.clone(),
        }
    }
}

/// All prototypes known to a game.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProtoRegistry {
    protos: FxHashMap<ProtoId, CardProto>,
    next_id: u32,
}

impl ProtoRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proto built by `build` from its freshly allocated id.
    pub fn register(&mut self, build: impl FnOnce(ProtoId) -> CardProto) -> ProtoId {
        let id = ProtoId::new(self.next_id);
        self.next_id += 1;
        let proto = build(id);
        assert_eq!(proto.id, id, "proto registered under a foreign id");
        self.protos.insert(id, proto);
        id
    }

    #[must_use]
    pub fn get(&self, id: ProtoId) -> Option<&CardProto> {
        self.protos.get(&id)
    }

    /// Lookup that panics on a missing id; registries are append-only so any
    /// id handed out stays valid.
    #[must_use]
    pub fn expect(&self, id: ProtoId) -> &CardProto {
        self.protos.get(&id).expect("unknown proto id")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.protos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protos.is_empty()
    }
}
