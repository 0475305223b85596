//! Mechanics: the composable unit of card behavior.

pub mod evaluate;
pub mod kinds;
pub mod mechanic;
pub mod trigger;

pub use evaluate::{EvalContext, EvalMemo, EvalScore};
pub use kinds::MechanicKind;
pub use mechanic::{Mechanic, MechanicKey, MechanicTemplate};
pub use trigger::TriggerKind;
