//! Cards: instances, costs, and the prototype registry.

pub mod card;
pub mod cost;
pub mod proto;

pub use card::{Card, CardKind, EnchantState, GameZone, ItemState, UnitState};
pub use cost::{Cost, ResourceKind, ResourcePool};
pub use proto::{CardProto, ProtoKind, ProtoRegistry};
