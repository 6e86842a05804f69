//! Outward effects: everything the engine asks its host to do.
//!
//! The engine performs no I/O. Each user action or inbound completion may
//! enqueue effects; the host drains them with
//! [`BoardEngine::next_effect`](crate::engine::BoardEngine::next_effect) and
//! executes them against the real transport, feeding results back through the
//! engine's completion methods. Every network-bound effect implicitly
//! carries the session credential.

use crate::fetch::TicketFilter;
use crate::model::TicketId;
use crate::mutation::MutationId;
use crate::rest::RestCall;

/// One outward action for the host to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Execute a mutating REST call; report back via
    /// `rest_succeeded`/`rest_failed` with the same handle.
    CallRest { mutation: MutationId, call: RestCall },
    /// Execute a bulk list; report back via `fetch_completed` with the same
    /// generation.
    Fetch { generation: u64, filter: TicketFilter },
    /// Open the push channel (a credential is available).
    ConnectPush,
    /// Tear the push channel down and release its subscriptions.
    DisconnectPush,
    /// Ask the server for a fresh full snapshot over the push channel.
    RequestBulkInit,
    /// Re-attempt the push connection after the fixed backoff.
    ScheduleReconnect { after_ms: u64 },
    /// Register fine-grained interest in one ticket's push events.
    Subscribe { id: TicketId },
    /// Drop fine-grained interest.
    Unsubscribe { id: TicketId },
    /// Credential was rejected; the host should route to re-authentication.
    SignOutRedirect,
}
