#![forbid(unsafe_code)]
//! lanes-core: the client-side state synchronization engine for a
//! collaborative ticket board.
//!
//! Three concurrent update streams — local optimistic mutations, server
//! responses, and push events from other clients — are reconciled into a
//! single [`store::TicketStore`]. The engine is sans-io: it never touches
//! the network, it emits [`effect::Effect`]s for the host to execute and
//! consumes completions the host feeds back.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums in library code, `anyhow::Result` at file
//!   boundaries (config loading).
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod clock;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod mutation;
pub mod realtime;
pub mod rest;
pub mod session;
pub mod store;
pub mod transition;
pub mod wire;

#[cfg(test)]
pub(crate) mod testutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, load_config};
pub use effect::Effect;
pub use engine::{BoardEngine, DragOutcome};
pub use error::{ErrorKind, SyncError};
pub use fetch::{FetchOutcome, TicketFilter};
pub use model::{Grooming, GroomingStatus, Lane, Priority, Ticket, TicketDraft, TicketId, TicketPatch};
pub use mutation::{MutationId, MutationStatus};
pub use realtime::{ConnectionState, PushEvent};
pub use rest::{ProcessAck, RestCall};
pub use session::{Credential, Role, Session};
pub use store::{StoreChange, TicketStore};
pub use transition::{DragGesture, MoveDecision};
