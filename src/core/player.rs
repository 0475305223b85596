//! Player identification and per-player data storage.
//!
//! The game is strictly two-player: `PlayerId` is 0 or 1 and `PlayerMap` is a
//! fixed two-slot container indexed by it.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Player identifier for a two-player game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// The first player.
    pub const ONE: PlayerId = PlayerId(0);
    /// The second player.
    pub const TWO: PlayerId = PlayerId(1);

    /// Create a new player ID. Panics if the index is not 0 or 1.
    #[must_use]
    pub fn new(id: u8) -> Self {
        assert!(id < 2, "PlayerId must be 0 or 1, got {id}");
        Self(id)
    }

    /// Get the raw player index (0-based).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The other player.
    #[must_use]
    pub const fn opponent(self) -> PlayerId {
        PlayerId(1 - self.0)
    }

    /// Iterate over both player IDs.
    pub fn both() -> impl Iterator<Item = PlayerId> {
        [PlayerId::ONE, PlayerId::TWO].into_iter()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Per-player data storage with O(1) access.
///
/// Backed by a `[T; 2]`, one entry per player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMap<T> {
    data: [T; 2],
}

impl<T> PlayerMap<T> {
    /// Create a new map with values from a factory function.
    pub fn new(factory: impl Fn(PlayerId) -> T) -> Self {
        Self {
            data: [factory(PlayerId::ONE), factory(PlayerId::TWO)],
        }
    }

    /// Create a new map with both entries set to the same value.
    pub fn with_value(value: T) -> Self
    where
        T: Clone,
    {
        Self::new(|_| value.clone())
    }

    /// Create a new map with default values.
    pub fn with_default() -> Self
    where
        T: Default,
    {
        Self::new(|_| T::default())
    }

    /// Get a reference to a player's data.
    #[must_use]
    pub fn get(&self, player: PlayerId) -> &T {
        &self.data[player.index()]
    }

    /// Get a mutable reference to a player's data.
    pub fn get_mut(&mut self, player: PlayerId) -> &mut T {
        &mut self.data[player.index()]
    }

    /// Iterate over (PlayerId, &T) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        PlayerId::both().zip(self.data.iter())
    }

    /// Iterate over (PlayerId, &mut T) pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PlayerId, &mut T)> {
        PlayerId::both().zip(self.data.iter_mut())
    }
}

impl<T> Index<PlayerId> for PlayerMap<T> {
    type Output = T;

    fn index(&self, player: PlayerId) -> &Self::Output {
        self.get(player)
    }
}

impl<T> IndexMut<PlayerId> for PlayerMap<T> {
    fn index_mut(&mut self, player: PlayerId) -> &mut Self::Output {
        self.get_mut(player)
    }
}
