//! The record store: canonical in-memory ticket collection.
//!
//! [`TicketStore`] is a pure keyed container. It is mutated only by the
//! mutation coordinator (optimistic and confirmed writes) and the real-time
//! merge layer (pushed writes); everything else reads. Writes are
//! last-writer-wins — ordering discipline lives in the callers, never here,
//! and the store knows nothing about optimism, pending state, or the network.
//!
//! # Snapshots
//!
//! [`TicketStore::list`] returns an owned, id-ordered snapshot, so a render
//! pass iterating it can never observe a concurrent mutation mid-iteration.
//!
//! # Change notification
//!
//! Every visible write bumps a monotonically increasing revision and fires
//! the registered change listeners, which is what dependent views key their
//! re-render on. Listeners run synchronously on the caller's (single) thread.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Ticket, TicketId};

// ---------------------------------------------------------------------------
// Change notices
// ---------------------------------------------------------------------------

/// What changed in the store, delivered to subscribed listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// The entire contents were replaced (bulk load / bulk-init).
    Replaced { count: usize },
    /// A single ticket was inserted or overwritten.
    Upserted(TicketId),
    /// A single ticket was removed.
    Removed(TicketId),
}

type Listener = Box<dyn FnMut(&StoreChange)>;

// ---------------------------------------------------------------------------
// TicketStore
// ---------------------------------------------------------------------------

/// Canonical mapping `id -> Ticket`, single source of truth for the UI.
#[derive(Default)]
pub struct TicketStore {
    tickets: BTreeMap<TicketId, Ticket>,
    revision: u64,
    listeners: Vec<Listener>,
}

impl TicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a ticket by id.
    #[must_use]
    pub fn get(&self, id: &TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &TicketId) -> bool {
        self.tickets.contains_key(id)
    }

    /// Owned, id-ordered snapshot of all tickets. Stable for a render pass.
    #[must_use]
    pub fn list(&self) -> Vec<Ticket> {
        self.tickets.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Monotonically increasing change counter. Bumped on every write.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the entire contents (bulk load, bulk-init).
    pub fn replace_all(&mut self, tickets: Vec<Ticket>) {
        self.tickets = tickets
            .into_iter()
            .map(|ticket| (ticket.id.clone(), ticket))
            .collect();
        let change = StoreChange::Replaced {
            count: self.tickets.len(),
        };
        self.bump(&change);
    }

    /// Insert or overwrite one ticket. Returns the prior entry, if any.
    pub fn upsert(&mut self, ticket: Ticket) -> Option<Ticket> {
        let id = ticket.id.clone();
        let prior = self.tickets.insert(id.clone(), ticket);
        self.bump(&StoreChange::Upserted(id));
        prior
    }

    /// Remove one ticket. Returns the removed entry, if any.
    pub fn remove(&mut self, id: &TicketId) -> Option<Ticket> {
        let removed = self.tickets.remove(id);
        if removed.is_some() {
            self.bump(&StoreChange::Removed(id.clone()));
        }
        removed
    }

    /// Register a change listener. Listeners are invoked synchronously after
    /// every visible write, in registration order.
    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn bump(&mut self, change: &StoreChange) {
        self.revision += 1;
        for listener in &mut self.listeners {
            listener(change);
        }
    }
}

impl fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketStore")
            .field("len", &self.tickets.len())
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
