//! Model ticket service: the authoritative half of a simulated run.
//!
//! Holds the true ticket map, applies REST calls the way the real backend
//! would (recomputing `updated_at` and `quality_score` on every write, so
//! server precedence is observable), and fabricates writes from foreign
//! clients as push events.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use lanes_core::{
    Grooming, GroomingStatus, Lane, Priority, PushEvent, RestCall, SyncError, Ticket, TicketFilter,
    TicketId,
};

use crate::rng::DeterministicRng;

/// The authoritative side of the wire.
#[derive(Debug, Clone)]
pub struct ModelServer {
    tickets: BTreeMap<TicketId, Ticket>,
    next_id: u64,
    now: DateTime<Utc>,
}

impl ModelServer {
    /// Create a server seeded with `seed_tickets` tickets in the `core`
    /// project.
    #[must_use]
    pub fn new(now: DateTime<Utc>, seed_tickets: usize) -> Self {
        let mut server = Self {
            tickets: BTreeMap::new(),
            next_id: 0,
            now,
        };
        for n in 0..seed_tickets {
            let id = server.mint_id();
            let mut ticket = Ticket {
                id: id.clone(),
                status: Lane::ALL[n % Lane::ALL.len()],
                priority: Priority::ALL[n % Priority::ALL.len()],
                project: "core".to_string(),
                title: format!("seeded ticket {n}"),
                body: "seed".repeat(n % 7),
                assignee: None,
                estimate: None,
                created_at: now,
                updated_at: now,
                grooming: None,
                quality_score: None,
            };
            ticket.quality_score = Some(Self::quality_of(&ticket));
            server.tickets.insert(id, ticket);
        }
        server
    }

    /// Advance the server clock.
    pub fn advance(&mut self, seconds: i64) {
        self.now += Duration::seconds(seconds);
    }

    /// Tickets matching a list call's filter, id-ordered.
    #[must_use]
    pub fn list(&self, filter: &TicketFilter) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    /// Full authoritative snapshot, id-ordered.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Ticket> {
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

    /// Apply one mutating REST call. Returns the authoritative ticket for
    /// calls that produce one (`None` for deletes and process acks), or the
    /// error the real service would have answered with.
    ///
    /// # Errors
    ///
    /// `ConflictStale` when the target no longer exists (another client got
    /// there first).
    pub fn apply(&mut self, call: &RestCall) -> Result<Option<Ticket>, SyncError> {
        match call {
            RestCall::Update { id, patch } => {
                let mut ticket = self.existing(id)?.clone();
                patch.apply_to(&mut ticket);
                self.commit(ticket).map(Some)
            }
            RestCall::Create { draft } => {
                let id = self.mint_id();
                let ticket = draft.clone().into_ticket(id, self.now);
                self.commit(ticket).map(Some)
            }
            RestCall::Delete { id } => {
                self.existing(id)?;
                self.tickets.remove(id);
                debug!(%id, "server delete");
                Ok(None)
            }
            RestCall::Move { id, to } => {
                let mut ticket = self.existing(id)?.clone();
                ticket.status = *to;
                self.commit(ticket).map(Some)
            }
            RestCall::TriggerProcess { id } => {
                let mut ticket = self.existing(id)?.clone();
                let attempts = ticket.grooming.as_ref().map_or(0, |g| g.attempts);
                ticket.grooming = Some(Grooming {
                    status: GroomingStatus::Pending,
                    attempts: attempts + 1,
                    last_error: None,
                });
                self.commit(ticket)?;
                Ok(None)
            }
        }
    }

    /// Fabricate a write by some other client and return the push event the
    /// real service would broadcast for it. Returns `None` when the chosen
    /// operation has nothing to act on.
    pub fn foreign_write(&mut self, rng: &mut DeterministicRng) -> Option<PushEvent> {
        match rng.next_bounded(4) {
            0 => {
                let id = self.mint_id();
                let mut ticket = Ticket {
                    id: id.clone(),
                    status: Lane::Backlog,
                    priority: Priority::ALL[rng.pick_index(Priority::ALL.len())],
                    project: "core".to_string(),
                    title: format!("foreign {id}"),
                    body: String::new(),
                    assignee: Some("rival".to_string()),
                    estimate: None,
                    created_at: self.now,
                    updated_at: self.now,
                    grooming: None,
                    quality_score: None,
                };
                ticket.quality_score = Some(Self::quality_of(&ticket));
                self.tickets.insert(id, ticket.clone());
                Some(PushEvent::Created(ticket))
            }
            1 => {
                let id = self.pick_id(rng)?;
                let mut ticket = self.tickets.get(&id)?.clone();
                ticket.title = format!("{} (edited)", ticket.title);
                ticket.status = Lane::ALL[rng.pick_index(Lane::ALL.len())];
                let ticket = self.commit(ticket).ok()?;
                Some(PushEvent::Updated(ticket))
            }
            2 => {
                let id = self.pick_id(rng)?;
                self.tickets.remove(&id);
                Some(PushEvent::Deleted(id))
            }
            _ => {
                // Grooming finished server-side for some pending ticket.
                let id = self
                    .tickets
                    .values()
                    .find(|t| {
                        t.grooming
                            .as_ref()
                            .is_some_and(|g| g.status == GroomingStatus::Pending)
                    })
                    .map(|t| t.id.clone())?;
                let mut ticket = self.tickets.get(&id)?.clone();
                if let Some(grooming) = ticket.grooming.as_mut() {
                    grooming.status = GroomingStatus::Complete;
                }
                let ticket = self.commit(ticket).ok()?;
                Some(PushEvent::Updated(ticket))
            }
        }
    }

    fn existing(&self, id: &TicketId) -> Result<&Ticket, SyncError> {
        self.tickets
            .get(id)
            .ok_or_else(|| SyncError::conflict(format!("no such ticket '{id}'")))
    }

    /// Server-side write path: bump `updated_at`, recompute quality, store.
    fn commit(&mut self, mut ticket: Ticket) -> Result<Ticket, SyncError> {
        ticket.updated_at = self.now;
        ticket.quality_score = Some(Self::quality_of(&ticket));
        self.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    fn mint_id(&mut self) -> TicketId {
        self.next_id += 1;
        TicketId::new_unchecked(format!("T-{}", self.next_id))
    }

    fn pick_id(&self, rng: &mut DeterministicRng) -> Option<TicketId> {
        if self.tickets.is_empty() {
            return None;
        }
        let index = rng.pick_index(self.tickets.len());
        self.tickets.keys().nth(index).cloned()
    }

    /// Deterministic stand-in for the backend's quality model.
    fn quality_of(ticket: &Ticket) -> f64 {
        let raw = (ticket.title.len() * 7 + ticket.body.len() * 3) % 101;
        f64::from(u8::try_from(raw).unwrap_or(0)) / 100.0
    }
}

/// The JSON frame the real service would broadcast for a push event.
#[must_use]
pub fn frame_of(event: &PushEvent) -> serde_json::Value {
    match event {
        PushEvent::BulkInit(tickets) => {
            serde_json::json!({"type": "bulk-init", "tickets": tickets})
        }
        PushEvent::Created(ticket) => serde_json::json!({"type": "created", "ticket": ticket}),
        PushEvent::Updated(ticket) => serde_json::json!({"type": "updated", "ticket": ticket}),
        PushEvent::Deleted(id) => serde_json::json!({"type": "deleted", "id": id}),
    }
}
