//! Bulk load and background refresh, with stale-response discard.
//!
//! Every fetch request carries a monotonically increasing generation number.
//! A response is applied only if it belongs to the newest request; a late
//! response from a superseded request is discarded rather than allowed to
//! overwrite state produced by its successor.
//!
//! A refresh racing with a pending optimistic write can transiently clobber
//! it — accepted, because the mutation coordinator schedules its own
//! reconciling refetch on every resolution, so the store converges to server
//! truth within one round-trip.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Lane, Priority, Ticket};
use crate::store::TicketStore;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional server-side filters for a bulk list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Lane>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl TicketFilter {
    /// Whether a ticket satisfies the filter (used by hosts and the
    /// simulator to evaluate list calls against a model server).
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|s| ticket.status == s)
            && self.priority.is_none_or(|p| ticket.priority == p)
            && self
                .project
                .as_ref()
                .is_none_or(|p| &ticket.project == p)
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Outcome of feeding a fetch response back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Response belonged to the newest request and replaced the store.
    Applied { count: usize },
    /// Response was superseded by a newer request and was dropped.
    Discarded { generation: u64 },
}

/// Generation-counted bulk fetch state.
#[derive(Debug, Clone)]
pub struct Fetcher {
    generation: u64,
    in_flight: bool,
    last_loaded_at: Option<DateTime<Utc>>,
    staleness: Duration,
    filter: TicketFilter,
}

impl Fetcher {
    #[must_use]
    pub fn new(staleness_secs: u64) -> Self {
        Self {
            generation: 0,
            in_flight: false,
            last_loaded_at: None,
            staleness: Duration::seconds(i64::try_from(staleness_secs).unwrap_or(i64::MAX)),
            filter: TicketFilter::default(),
        }
    }

    /// Issue a new fetch request. Returns the generation the host must echo
    /// back on completion. Supersedes any request still in flight.
    pub fn request(&mut self, filter: TicketFilter) -> u64 {
        self.generation += 1;
        self.in_flight = true;
        self.filter = filter;
        debug!(generation = self.generation, "fetch requested");
        self.generation
    }

    /// The filter used by the most recent request (background refreshes
    /// reuse it).
    #[must_use]
    pub const fn filter(&self) -> &TicketFilter {
        &self.filter
    }

    /// Whether the staleness window has elapsed and a background refresh is
    /// warranted. Never true while a request is already in flight.
    #[must_use]
    pub fn wants_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_loaded_at {
            None => true,
            Some(loaded) => now - loaded >= self.staleness,
        }
    }

    /// Record that the request for `generation` failed. Clears the in-flight
    /// flag (so `wants_refresh` can fire again) without touching the store.
    pub fn fail(&mut self, generation: u64) {
        if generation == self.generation {
            self.in_flight = false;
        }
    }

    /// Feed a fetch response back in. Applies `replace_all` for the newest
    /// generation; discards anything older.
    pub fn complete(
        &mut self,
        generation: u64,
        tickets: Vec<Ticket>,
        store: &mut TicketStore,
        now: DateTime<Utc>,
    ) -> FetchOutcome {
        if generation < self.generation {
            info!(
                generation,
                current = self.generation,
                "discarding superseded fetch response"
            );
            return FetchOutcome::Discarded { generation };
        }
        self.in_flight = false;
        self.last_loaded_at = Some(now);
        let count = tickets.len();
        store.replace_all(tickets);
        FetchOutcome::Applied { count }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
