//! Core types: ids, players, RNG, action rejection.

pub mod error;
pub mod ids;
pub mod player;
pub mod rng;

pub use error::IllegalAction;
pub use ids::{CardId, MechanicId, ProtoId, SubscriptionId};
pub use player::{PlayerId, PlayerMap};
pub use rng::{GameRng, GameRngState};
