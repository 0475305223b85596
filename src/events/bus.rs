//! Event subscription registry with deterministic, re-entrancy-safe delivery.
//!
//! The bus stores ordered handler lists per (scope, kind). It does not invoke
//! anything itself: the `Game` walks a [`EventCursor`] and dispatches each
//! handler, which keeps the bus free of game knowledge and lets handlers
//! mutate the bus (including removing themselves) between steps.
//!
//! ## Ordering
//!
//! Within one (scope, kind) list, handlers run in ascending priority, ties
//! broken by subscription order. Subscription ids allocate monotonically, so
//! the pair `(priority, id)` is a total order over a list and the cursor is a
//! monotone walk of that order: a handler removed mid-publish is simply never
//! reached again, a handler that removes an earlier entry shifts nothing the
//! cursor cares about, and no handler can run twice in one pass.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::{CardId, MechanicId, SubscriptionId};

use super::kinds::EventKind;

/// Where a subscription listens.
///
/// Each permanent owns an `Entity` subgroup that is torn down wholesale when
/// it leaves the board; engine-wide events live under `Global`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventScope {
    /// Game-wide events (turn boundaries, any-unit-died listeners).
    Global,
    /// Events about one specific permanent.
    Entity(CardId),
}

/// Who registered a subscription. Used for bulk removal: stripping a mechanic
/// releases every subscription it holds, across all scopes and kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceToken {
    /// A mechanic instance.
    Mechanic(MechanicId),
    /// A permanent itself (engine-installed bookkeeping hooks).
    Card(CardId),
}

/// A registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Opaque removal handle.
    pub id: SubscriptionId,
    /// Registrant, for bulk removal.
    pub source: SourceToken,
    /// The mechanic the dispatcher invokes.
    pub handler: MechanicId,
    /// Delivery priority; lower runs first.
    pub priority: i32,
}

impl Subscription {
    fn key(&self) -> (i32, SubscriptionId) {
        (self.priority, self.id)
    }
}

/// Cursor over one (scope, kind) handler list.
///
/// Tracks the key of the last delivered subscription; `EventBus::advance`
/// returns the first live subscription past it. The bus may be mutated freely
/// between `advance` calls.
#[derive(Clone, Copy, Debug)]
pub struct EventCursor {
    scope: EventScope,
    kind: EventKind,
    last: Option<(i32, SubscriptionId)>,
}

/// Subscription registry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventBus {
    /// Handler lists, kept sorted by (priority, id).
    lists: FxHashMap<(EventScope, EventKind), Vec<Subscription>>,
    /// Next subscription id to allocate.
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns the removal handle.
    pub fn subscribe(
        &mut self,
        scope: EventScope,
        kind: EventKind,
        source: SourceToken,
        priority: i32,
        handler: MechanicId,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id);
        self.next_id += 1;

        let sub = Subscription {
            id,
            source,
            handler,
            priority,
        };

        let list = self.lists.entry((scope, kind)).or_default();
        let pos = list.partition_point(|s| s.key() < sub.key());
        list.insert(pos, sub);
        id
    }

    /// Remove a single subscription. Returns true if it was live.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.lists.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Remove every subscription registered under `source`, across all scopes
    /// and kinds. Removing a token with no live subscriptions is a no-op.
    /// Returns the number removed.
    pub fn unsubscribe_source(&mut self, source: SourceToken) -> usize {
        let mut removed = 0;
        self.lists.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.source != source);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// Tear down a permanent's entire subgroup: every list scoped to it, for
    /// every kind. Subscriptions the permanent's mechanics hold under
    /// `Global` are not touched here; mechanic removal releases those.
    pub fn remove_entity(&mut self, card: CardId) {
        self.lists
            .retain(|(scope, _), _| *scope != EventScope::Entity(card));
    }

    /// Start a delivery pass over one (scope, kind) list.
    #[must_use]
    pub fn cursor(&self, scope: EventScope, kind: EventKind) -> EventCursor {
        EventCursor {
            scope,
            kind,
            last: None,
        }
    }

    /// Return the next live subscription past the cursor, advancing it.
    ///
    /// Returns `None` when the list is exhausted. Handlers registered during
    /// the pass are delivered iff their key is still ahead of the cursor.
    pub fn advance(&self, cursor: &mut EventCursor) -> Option<Subscription> {
        let list = self.lists.get(&(cursor.scope, cursor.kind))?;
        let next = match cursor.last {
            None => list.first(),
            Some(last) => {
                let pos = list.partition_point(|s| s.key() <= last);
                list.get(pos)
            }
        };
        let sub = *next?;
        cursor.last = Some(sub.key());
        Some(sub)
    }

    /// Number of live subscriptions for one (scope, kind).
    #[must_use]
    pub fn handler_count(&self, scope: EventScope, kind: EventKind) -> usize {
        self.lists.get(&(scope, kind)).map_or(0, Vec::len)
    }

    /// Total live subscriptions across the bus.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Check if the bus has no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
