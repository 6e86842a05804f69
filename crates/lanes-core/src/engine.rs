//! The engine facade: one object owning the store and all three writers.
//!
//! [`BoardEngine`] wires the fetch layer, mutation coordinator, and
//! real-time merge layer onto a single [`TicketStore`], and exposes the
//! sans-io surface the host drives:
//!
//! - user actions (`drag_drop`, `update_ticket`, `delete_ticket`, ...) apply
//!   optimistic writes synchronously and enqueue [`Effect`]s;
//! - the host drains effects with [`BoardEngine::next_effect`], performs the
//!   I/O, and feeds results back (`rest_succeeded`, `fetch_completed`,
//!   `push_frame`, ...).
//!
//! Everything runs on the caller's single thread; a store read can never
//! observe a partially applied write. Logical races between the three update
//! streams are resolved by the component rules (generation counters, the
//! rollback protocol, server-wins push merges) — not by locking.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::effect::Effect;
use crate::error::{ErrorKind, SyncError};
use crate::fetch::{FetchOutcome, Fetcher, TicketFilter};
use crate::model::{Lane, Ticket, TicketDraft, TicketId, TicketPatch};
use crate::mutation::{MutationCoordinator, MutationId, MutationIntent, MutationStatus};
use crate::realtime::{ConnectionState, PushEvent, RealtimeMerge};
use crate::rest::RestCall;
use crate::session::{Credential, Role, Session};
use crate::store::{StoreChange, TicketStore};
use crate::transition::{DragGesture, MoveDecision, decide_move};
use crate::wire;

/// Outcome of a completed drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Below the drag threshold; not a transition attempt.
    Ignored,
    /// Dropped on the current lane; legal, zero mutations issued.
    NoOp,
    /// Move issued optimistically; track it via the handle.
    Moved(MutationId),
}

/// The client-side state synchronization engine.
pub struct BoardEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    session: Session,
    store: TicketStore,
    coordinator: MutationCoordinator,
    realtime: RealtimeMerge,
    fetcher: Fetcher,
    effects: VecDeque<Effect>,
}

impl BoardEngine {
    #[must_use]
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>) -> Self {
        let realtime = RealtimeMerge::new(config.reconnect_max_attempts, config.reconnect_backoff_ms);
        let fetcher = Fetcher::new(config.staleness_secs);
        Self {
            config,
            clock,
            session: Session::new(),
            store: TicketStore::new(),
            coordinator: MutationCoordinator::new(),
            realtime,
            fetcher,
            effects: VecDeque::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Stable, id-ordered snapshot for a render pass.
    #[must_use]
    pub fn tickets(&self) -> Vec<Ticket> {
        self.store.list()
    }

    #[must_use]
    pub fn ticket(&self, id: &TicketId) -> Option<&Ticket> {
        self.store.get(id)
    }

    /// Store change counter; views re-render when it moves.
    #[must_use]
    pub fn store_revision(&self) -> u64 {
        self.store.revision()
    }

    /// Register a store change listener (view invalidation hook).
    pub fn subscribe_store(&mut self, listener: Box<dyn FnMut(&StoreChange)>) {
        self.store.subscribe(listener);
    }

    #[must_use]
    pub fn mutation_status(&self, handle: MutationId) -> Option<MutationStatus> {
        self.coordinator.status(handle)
    }

    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.realtime.state()
    }

    /// Drain one queued outward effect.
    pub fn next_effect(&mut self) -> Option<Effect> {
        self.effects.pop_front()
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Initialize the session and bring the push channel up.
    pub fn sign_in(&mut self, credential: Credential) {
        self.session.sign_in(credential);
        if let Some(effect) = self.realtime.credential_ready() {
            self.effects.push_back(effect);
        }
    }

    /// Tear the session down: credential, roles, and push channel.
    pub fn sign_out(&mut self) {
        self.session.sign_out();
        if let Some(effect) = self.realtime.teardown() {
            self.effects.push_back(effect);
        }
    }

    /// Record a role reported by the permission collaborator.
    pub fn set_project_role(&mut self, project: impl Into<String>, role: Role) {
        self.session.set_project_role(project, role);
    }

    // -----------------------------------------------------------------------
    // Query / fetch
    // -----------------------------------------------------------------------

    /// Initial bulk load (or a filtered reload).
    pub fn load(&mut self, filter: TicketFilter) {
        let generation = self.fetcher.request(filter.clone());
        self.effects.push_back(Effect::Fetch { generation, filter });
    }

    /// Explicit manual refresh with the last-used filter.
    pub fn refresh(&mut self) {
        self.load(self.fetcher.filter().clone());
    }

    /// View refocus / periodic observation: refresh if the staleness window
    /// has elapsed.
    pub fn observe(&mut self) {
        if self.fetcher.wants_refresh(self.clock.now()) {
            debug!("staleness window elapsed, background refresh");
            self.refresh();
        }
    }

    /// Feed a bulk fetch result back in.
    pub fn fetch_completed(
        &mut self,
        generation: u64,
        result: Result<Vec<Ticket>, SyncError>,
    ) -> Option<FetchOutcome> {
        match result {
            Ok(tickets) => Some(self.fetcher.complete(
                generation,
                tickets,
                &mut self.store,
                self.clock.now(),
            )),
            Err(error) => {
                self.fetcher.fail(generation);
                if error.kind == ErrorKind::AuthExpired {
                    self.auth_expired();
                } else {
                    warn!(code = error.kind.code(), detail = %error.detail, "bulk fetch failed");
                }
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Validate and execute a drag-and-drop lane move.
    pub fn drag_drop(
        &mut self,
        id: &TicketId,
        raw_target: &str,
        gesture: DragGesture,
    ) -> Result<DragOutcome, SyncError> {
        let ticket = self
            .store
            .get(id)
            .ok_or_else(|| SyncError::validation(format!("unknown ticket '{id}'")))?;
        let decision = decide_move(
            ticket,
            raw_target,
            &self.session,
            gesture,
            self.config.drag_threshold_px,
        )?;
        match decision {
            MoveDecision::Ignored => Ok(DragOutcome::Ignored),
            MoveDecision::NoOp => Ok(DragOutcome::NoOp),
            MoveDecision::Move(to) => {
                let handle = self.move_ticket(id.clone(), to)?;
                Ok(DragOutcome::Moved(handle))
            }
        }
    }

    pub fn move_ticket(&mut self, id: TicketId, to: Lane) -> Result<MutationId, SyncError> {
        self.begin(MutationIntent::Move { id, to })
    }

    pub fn update_ticket(
        &mut self,
        id: TicketId,
        patch: TicketPatch,
    ) -> Result<MutationId, SyncError> {
        self.begin(MutationIntent::Update { id, patch })
    }

    pub fn create_ticket(&mut self, draft: TicketDraft) -> Result<MutationId, SyncError> {
        self.begin(MutationIntent::Create { draft })
    }

    pub fn delete_ticket(&mut self, id: TicketId) -> Result<MutationId, SyncError> {
        self.begin(MutationIntent::Delete { id })
    }

    /// Request the long-running server-side grooming process. The optimistic
    /// write only flips the grooming status; completion arrives via push.
    pub fn trigger_grooming(&mut self, id: TicketId) -> Result<MutationId, SyncError> {
        self.begin(MutationIntent::TriggerGrooming { id })
    }

    fn begin(&mut self, intent: MutationIntent) -> Result<MutationId, SyncError> {
        let now = self.clock.now();
        let (handle, call) = self.coordinator.begin(intent, &mut self.store, now)?;
        self.effects.push_back(Effect::CallRest {
            mutation: handle,
            call,
        });
        Ok(handle)
    }

    /// Feed a successful mutating REST response back in. `response` is the
    /// server's authoritative ticket, or `None` for deletes and process acks.
    pub fn rest_succeeded(&mut self, handle: MutationId, response: Option<Ticket>) {
        self.coordinator
            .resolve_success(handle, response, &mut self.store);
        self.reconciling_refetch();
    }

    /// Feed a failed mutating REST call back in. Rolls back per protocol and
    /// always schedules a reconciling refetch.
    pub fn rest_failed(&mut self, handle: MutationId, error: &SyncError) {
        self.coordinator
            .resolve_failure(handle, error, &mut self.store);
        if error.kind == ErrorKind::AuthExpired {
            self.auth_expired();
        }
        self.reconciling_refetch();
    }

    /// Step 6 of the mutation protocol: whatever the outcome, converge on
    /// server truth via a fresh generation-counted fetch.
    fn reconciling_refetch(&mut self) {
        let filter = self.fetcher.filter().clone();
        let generation = self.fetcher.request(filter.clone());
        self.effects.push_back(Effect::Fetch { generation, filter });
    }

    fn auth_expired(&mut self) {
        warn!("credential rejected; signing out");
        self.sign_out();
        self.effects.push_back(Effect::SignOutRedirect);
    }

    // -----------------------------------------------------------------------
    // Push channel
    // -----------------------------------------------------------------------

    /// Apply a typed push event.
    pub fn push_event(&mut self, event: PushEvent) {
        self.realtime.apply(event, &mut self.store, &self.coordinator);
    }

    /// Parse and apply a raw push frame. Malformed frames are logged and
    /// dropped — a bad frame must never wedge the channel.
    pub fn push_frame(&mut self, frame: &Value) {
        match wire::parse_push_event(frame) {
            Ok(event) => self.push_event(event),
            Err(err) => warn!(%err, "dropping malformed push frame"),
        }
    }

    pub fn push_connected(&mut self) {
        let effect = self.realtime.connected();
        self.effects.push_back(effect);
    }

    pub fn push_connection_lost(&mut self) {
        if let Some(effect) = self.realtime.connection_lost() {
            self.effects.push_back(effect);
        }
    }

    /// The host's reconnect backoff timer fired.
    pub fn push_retry_elapsed(&mut self) {
        if let Some(effect) = self.realtime.retry() {
            self.effects.push_back(effect);
        }
    }

    pub fn subscribe_ticket(&mut self, id: TicketId) {
        if let Some(effect) = self.realtime.subscribe(id) {
            self.effects.push_back(effect);
        }
    }

    pub fn unsubscribe_ticket(&mut self, id: &TicketId) {
        if let Some(effect) = self.realtime.unsubscribe(id) {
            self.effects.push_back(effect);
        }
    }
}

impl std::fmt::Debug for BoardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardEngine")
            .field("store", &self.store)
            .field("in_flight", &self.coordinator.in_flight())
            .field("connection", &self.realtime.state())
            .field("queued_effects", &self.effects.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
