//! Shapes of the consumed REST boundary.
//!
//! The engine never performs I/O. It emits [`RestCall`]s inside
//! [`Effect::CallRest`](crate::effect::Effect::CallRest) and the host executes
//! them against the real transport, attaching the session credential to every
//! request. Bulk `list` calls travel separately on
//! [`Effect::Fetch`](crate::effect::Effect::Fetch) because they carry the
//! fetch generation counter instead of a mutation handle; a host that wants a
//! single-ticket `get` for its own purposes can feed the response back
//! through the push-event path (`Updated`), which has identical merge
//! semantics.

use serde::{Deserialize, Serialize};

use crate::model::{Lane, TicketDraft, TicketId, TicketPatch};

/// One mutating request against the ticket service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RestCall {
    /// `PATCH /tickets/{id}` — partial field update.
    Update { id: TicketId, patch: TicketPatch },
    /// `POST /tickets` — create.
    Create { draft: TicketDraft },
    /// `DELETE /tickets/{id}`.
    Delete { id: TicketId },
    /// `POST /tickets/{id}/move` — status transition.
    Move { id: TicketId, to: Lane },
    /// `POST /tickets/{id}/groom` — trigger the long-running grooming
    /// process. The response only acknowledges the request; completion
    /// arrives later through the push channel.
    TriggerProcess { id: TicketId },
}

impl RestCall {
    /// The ticket the call targets, if it targets one (creates do not yet).
    #[must_use]
    pub const fn target(&self) -> Option<&TicketId> {
        match self {
            Self::Update { id, .. }
            | Self::Delete { id }
            | Self::Move { id, .. }
            | Self::TriggerProcess { id } => Some(id),
            Self::Create { .. } => None,
        }
    }
}

/// Acknowledgement returned by `triggerProcess`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAck {
    /// Server-side status of the request (`accepted`, `queued`, ...).
    pub status: String,
    pub id: TicketId,
    #[serde(default)]
    pub correlation_key: Option<String>,
}
