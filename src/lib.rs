//! duelcore: the rules engine of a two-player, turn-based collectible card
//! game.
//!
//! The engine enforces action legality, sequences turn phases, propagates
//! events to attached card mechanics, owns the permanent lifecycle, and
//! resolves combat with knapsack-optimized multi-blocker damage assignment.
//! Everything is deterministic and replayable: the same shuffle seed and the
//! same ordered action log always reproduce the same state, byte for byte.
//!
//! # Example
//!
//! ```
//! use duelcore::cards::{CardProto, Cost, ProtoKind};
//! use duelcore::core::PlayerId;
//! use duelcore::game::{Action, GameBuilder};
//!
//! let mut builder = GameBuilder::new().with_seed(7).with_opening_hand(2);
//! let soldier = builder.register_proto(|id| {
//!     CardProto::new(id, "Soldier", Cost::free(), ProtoKind::Unit { attack: 2, life: 2 })
//! });
//! let mut game = builder
//!     .with_deck(PlayerId::ONE, vec![soldier; 10])
//!     .with_deck(PlayerId::TWO, vec![soldier; 10])
//!     .build();
//!
//! let hand = game.player(PlayerId::ONE).hand.clone();
//! game.submit(
//!     PlayerId::ONE,
//!     Action::PlayCard { card: hand[0], targets: vec![], host: None },
//! )
//! .unwrap();
//! assert!(game.board().contains(hand[0]));
//! ```

pub mod board;
pub mod cards;
pub mod combat;
pub mod core;
pub mod events;
pub mod game;
pub mod mechanics;
pub mod targeting;

pub use crate::board::Board;
pub use crate::cards::{Card, CardKind, CardProto, Cost, GameZone, ProtoKind, ResourceKind};
pub use crate::core::{CardId, IllegalAction, MechanicId, PlayerId, ProtoId};
pub use crate::events::{EventBus, EventKind, EventParams, EventScope};
pub use crate::game::{Action, ChoicePurpose, Game, GameBuilder, Notification, Phase};
pub use crate::mechanics::{EvalContext, EvalMemo, Mechanic, MechanicKey, MechanicKind, MechanicTemplate, TriggerKind};
pub use crate::targeting::{TargetWho, Targeter};
