//! Identifier newtypes for arena-addressed game objects.
//!
//! Cards, mechanics, and event subscriptions live in arenas owned by the
//! `Game` and reference each other exclusively through these ids. There are
//! no back-references between objects: a mechanic names its parent card by
//! `CardId` and resolves it through the arena when it runs.

use serde::{Deserialize, Serialize};

/// Unique identifier for a card instance.
///
/// Allocated once when the card is created and stable for the whole game,
/// across every zone the card moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub u32);

impl CardId {
    /// Create a new card ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Card({})", self.0)
    }
}

/// Unique identifier for a mechanic instance.
///
/// Each attachment point gets its own instance (an item granting an ability
/// to its host produces a second `MechanicId`), so per-instance state such as
/// stack levels never aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MechanicId(pub u32);

impl MechanicId {
    /// Create a new mechanic ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for MechanicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mechanic({})", self.0)
    }
}

/// Opaque handle returned by `EventBus::subscribe`.
///
/// Handles allocate monotonically, which doubles as the stable tiebreaker for
/// handlers registered at the same priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Create a new subscription ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Identifier for a card template in the proto registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtoId(pub u32);

impl ProtoId {
    /// Create a new proto ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ProtoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Proto({})", self.0)
    }
}
