//! Real-time merge layer: push-event application and connection lifecycle.
//!
//! # Merge semantics
//!
//! Push events carry an authoritative server view, so `created`/`updated`
//! always overwrite the store entry for that id — including while a local
//! mutation for the same id is still in flight. The pending mutation's own
//! resolution applies its server response afterwards, so whichever of the
//! two resolved last determines the final state ("last confirmed write
//! wins", per-id). The overlap is logged at `debug!` so interleavings stay
//! observable; the coordinator's post-resolution refetch bounds any
//! divergence to one round-trip.
//!
//! # Connection lifecycle
//!
//! ```text
//! unauthenticated -> connecting -> connected
//!       ^                             |
//!       | teardown          connection lost
//!       |                             v
//!       +---- disconnected <- reconnecting (bounded attempts, fixed backoff)
//! ```
//!
//! Every entry into `connected` requests a fresh bulk-init — missed events
//! are never assumed replayable. A degraded or parked connection fails no
//! pending mutation; it only pauses real-time convergence.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::effect::Effect;
use crate::error::ErrorKind;
use crate::model::{Ticket, TicketId};
use crate::mutation::MutationCoordinator;
use crate::store::TicketStore;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One inbound push-channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Full collection snapshot; replaces the store wholesale.
    BulkInit(Vec<Ticket>),
    Created(Ticket),
    Updated(Ticket),
    Deleted(TicketId),
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Push-channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No credential yet; connecting is not attempted.
    Unauthenticated,
    /// Connection attempt in progress.
    Connecting,
    Connected,
    /// Lost; a bounded retry is scheduled.
    Reconnecting { attempt: u32 },
    /// Retries exhausted (or torn down); parked until re-auth or an explicit
    /// reconnect.
    Disconnected,
}

// ---------------------------------------------------------------------------
// RealtimeMerge
// ---------------------------------------------------------------------------

/// Connection lifecycle, per-ticket subscriptions, and event application.
#[derive(Debug)]
pub struct RealtimeMerge {
    state: ConnectionState,
    max_attempts: u32,
    backoff_ms: u64,
    subscriptions: BTreeSet<TicketId>,
}

impl RealtimeMerge {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            state: ConnectionState::Unauthenticated,
            max_attempts,
            backoff_ms,
            subscriptions: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// A credential became available: start connecting. No-op unless the
    /// channel is unauthenticated or parked.
    pub fn credential_ready(&mut self) -> Option<Effect> {
        match self.state {
            ConnectionState::Unauthenticated | ConnectionState::Disconnected => {
                self.state = ConnectionState::Connecting;
                Some(Effect::ConnectPush)
            }
            _ => None,
        }
    }

    /// The host reports the channel is up. Always requests a fresh bulk-init;
    /// missed events are never replayed.
    pub fn connected(&mut self) -> Effect {
        info!("push channel connected");
        self.state = ConnectionState::Connected;
        Effect::RequestBulkInit
    }

    /// The host reports the channel dropped. Schedules a bounded retry, or
    /// parks after `max_attempts`. Never surfaced as a blocking error.
    pub fn connection_lost(&mut self) -> Option<Effect> {
        let attempt = match self.state {
            ConnectionState::Reconnecting { attempt } => attempt + 1,
            ConnectionState::Unauthenticated | ConnectionState::Disconnected => return None,
            _ => 1,
        };
        if attempt > self.max_attempts {
            warn!(
                code = ErrorKind::ConnectionDegraded.code(),
                attempts = self.max_attempts,
                "push channel retries exhausted; live updates paused"
            );
            self.state = ConnectionState::Disconnected;
            return None;
        }
        debug!(attempt, backoff_ms = self.backoff_ms, "push channel lost, scheduling retry");
        self.state = ConnectionState::Reconnecting { attempt };
        Some(Effect::ScheduleReconnect {
            after_ms: self.backoff_ms,
        })
    }

    /// The backoff elapsed; attempt the connection again.
    pub fn retry(&mut self) -> Option<Effect> {
        match self.state {
            ConnectionState::Reconnecting { .. } => Some(Effect::ConnectPush),
            _ => None,
        }
    }

    /// Credential loss or component teardown: drop the connection and all
    /// subscriptions.
    pub fn teardown(&mut self) -> Option<Effect> {
        self.subscriptions.clear();
        let was_live = !matches!(
            self.state,
            ConnectionState::Unauthenticated | ConnectionState::Disconnected
        );
        self.state = ConnectionState::Unauthenticated;
        was_live.then_some(Effect::DisconnectPush)
    }

    /// Register fine-grained interest in one ticket. Scopes what the server
    /// elects to send; never changes the merge rule.
    pub fn subscribe(&mut self, id: TicketId) -> Option<Effect> {
        self.subscriptions
            .insert(id.clone())
            .then_some(Effect::Subscribe { id })
    }

    pub fn unsubscribe(&mut self, id: &TicketId) -> Option<Effect> {
        self.subscriptions
            .remove(id)
            .then_some(Effect::Unsubscribe { id: id.clone() })
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Apply one inbound event to the store. Server truth wins; see the
    /// module docs for the pending-mutation interplay.
    pub fn apply(
        &mut self,
        event: PushEvent,
        store: &mut TicketStore,
        coordinator: &MutationCoordinator,
    ) {
        match event {
            PushEvent::BulkInit(tickets) => {
                debug!(count = tickets.len(), "applying bulk-init snapshot");
                store.replace_all(tickets);
            }
            PushEvent::Created(ticket) | PushEvent::Updated(ticket) => {
                if coordinator.has_pending_for(&ticket.id) {
                    debug!(
                        id = %ticket.id,
                        "push event overlaps an in-flight mutation; last resolved will win"
                    );
                }
                store.upsert(ticket);
            }
            PushEvent::Deleted(id) => {
                if store.remove(&id).is_none() {
                    debug!(%id, "push delete for unknown ticket");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
