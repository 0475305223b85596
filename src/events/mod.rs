//! Event propagation: kinds, payloads, and the subscription bus.

pub mod bus;
pub mod kinds;

pub use bus::{EventBus, EventCursor, EventScope, SourceToken, Subscription};
pub use kinds::{EventKind, EventParams};
