//! The game: state, phases, actions, and the choice gate.

pub mod actions;
pub mod choice;
pub mod phases;
pub mod state;

pub use actions::Action;
pub use choice::{ChoicePurpose, PendingChoice};
pub use phases::Phase;
pub use state::{Game, GameBuilder, Notification, PlayerState};
