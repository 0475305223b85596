//! The shared board: per-player slot rows with a fixed capacity.
//!
//! The board only tracks placement. Entering and leaving play, with their
//! events and mechanic bookkeeping, are driven by the game, which calls in
//! here to move ids around.

use serde::{Deserialize, Serialize};

use crate::core::{CardId, PlayerId, PlayerMap};

pub const DEFAULT_CAPACITY: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: PlayerMap<Vec<CardId>>,
    capacity: usize,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Board {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "board capacity must be positive");
        Self {
            rows: PlayerMap::with_default(),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A full row still admits the card; the game kills the newcomer
    /// immediately afterwards so its arrival effects have fired.
    #[must_use]
    pub fn has_room(&self, player: PlayerId) -> bool {
        self.rows[player].len() < self.capacity
    }

    pub fn place(&mut self, player: PlayerId, card: CardId) {
        debug_assert!(!self.rows[player].contains(&card));
        self.rows[player].push(card);
    }

    /// Remove a card from its row. Idempotent; removing an absent id is a
    /// no-op so re-entrant death chains stay safe.
    pub fn remove(&mut self, player: PlayerId, card: CardId) -> bool {
        let row = &mut self.rows[player];
        match row.iter().position(|&id| id == card) {
            Some(index) => {
                row.remove(index);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, card: CardId) -> bool {
        PlayerId::both().any(|p| self.rows[p].contains(&card))
    }

    #[must_use]
    pub fn row(&self, player: PlayerId) -> &[CardId] {
        &self.rows[player]
    }

    /// All placed ids, player one's row first.
    pub fn all(&self) -> impl Iterator<Item = CardId> + '_ {
        PlayerId::both().flat_map(|p| self.rows[p].iter().copied())
    }
}
