//! The mutation coordinator: optimistic writes with exact rollback.
//!
//! Every user intent follows the same protocol:
//!
//! 1. Snapshot the current record for the target id (`None` = absent).
//! 2. Apply the intended change to the store immediately, bumping
//!    `updated_at` from the injected clock so the UI reflects recency.
//! 3. Hand the caller a [`RestCall`] to execute asynchronously.
//! 4. On success, the server's returned representation replaces the entry
//!    wholesale — the optimistic guess never survives confirmation.
//! 5. On failure, the pre-mutation snapshot is restored exactly, with two
//!    exceptions: a still-pending later mutation for the same id makes the
//!    rollback a warned no-op (restoring would resurrect state older than
//!    that mutation's own snapshot), and `ConflictStale` skips the restore
//!    because the snapshot itself is suspect — reconciliation is left to the
//!    refetch the engine schedules after every resolution.
//!
//! Delete is the same protocol with removal as the optimistic write; create
//! inserts under a client-local placeholder id that the confirmation swaps
//! for the server-assigned one. Triggering grooming only flips the grooming
//! status sub-field — real completion arrives through the push channel.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ErrorKind, SyncError};
use crate::model::{Grooming, GroomingStatus, Lane, Ticket, TicketDraft, TicketId, TicketPatch};
use crate::rest::RestCall;
use crate::store::TicketStore;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Correlation handle for one in-flight mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A user intent, before translation into an optimistic write + remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    Update { id: TicketId, patch: TicketPatch },
    Move { id: TicketId, to: Lane },
    Create { draft: TicketDraft },
    Delete { id: TicketId },
    TriggerGrooming { id: TicketId },
}

/// Per-operation status, queryable by the UI to render in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    InFlight,
    Succeeded,
    Failed(ErrorKind),
}

/// Bookkeeping for one in-flight optimistic change.
#[derive(Debug, Clone)]
struct PendingMutation {
    /// Store entry the optimistic write targeted (placeholder id for create).
    target: TicketId,
    /// Pre-mutation record; `None` means the target did not exist.
    snapshot: Option<Ticket>,
    /// True for deletes: success confirms removal instead of carrying a body.
    is_delete: bool,
    issued_at: DateTime<Utc>,
}

/// What a resolution did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Success: server representation applied.
    Applied,
    /// Delete success: removal confirmed, store untouched.
    Confirmed,
    /// Failure: snapshot restored exactly.
    RolledBack,
    /// Failure with rollback deliberately skipped (reason logged).
    RollbackSkipped,
    /// Unknown handle; nothing done.
    Ignored,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Tracks in-flight mutations and reconciles their outcomes into the store.
#[derive(Debug, Default)]
pub struct MutationCoordinator {
    next_handle: u64,
    next_placeholder: u64,
    pending: BTreeMap<MutationId, PendingMutation>,
    statuses: BTreeMap<MutationId, MutationStatus>,
}

impl MutationCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutations currently awaiting a server response.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Whether some mutation targeting `id` is still unresolved.
    #[must_use]
    pub fn has_pending_for(&self, id: &TicketId) -> bool {
        self.pending.values().any(|p| &p.target == id)
    }

    /// Status of a previously issued mutation.
    #[must_use]
    pub fn status(&self, handle: MutationId) -> Option<MutationStatus> {
        self.statuses.get(&handle).copied()
    }

    /// Snapshot, apply the optimistic write, and return the remote call the
    /// host must execute. `now` stamps the optimistic `updated_at` bump.
    pub fn begin(
        &mut self,
        intent: MutationIntent,
        store: &mut TicketStore,
        now: DateTime<Utc>,
    ) -> Result<(MutationId, RestCall), SyncError> {
        let (target, snapshot, is_delete, call) = match intent {
            MutationIntent::Update { id, patch } => {
                if patch.is_empty() {
                    return Err(SyncError::validation("empty update patch"));
                }
                let mut ticket = self.existing(store, &id)?;
                patch.apply_to(&mut ticket);
                ticket.updated_at = now;
                let snapshot = store.upsert(ticket);
                (id.clone(), snapshot, false, RestCall::Update { id, patch })
            }
            MutationIntent::Move { id, to } => {
                let mut ticket = self.existing(store, &id)?;
                ticket.status = to;
                ticket.updated_at = now;
                let snapshot = store.upsert(ticket);
                (id.clone(), snapshot, false, RestCall::Move { id, to })
            }
            MutationIntent::Create { draft } => {
                self.next_placeholder += 1;
                let placeholder = TicketId::placeholder(self.next_placeholder);
                store.upsert(draft.clone().into_ticket(placeholder.clone(), now));
                (placeholder, None, false, RestCall::Create { draft })
            }
            MutationIntent::Delete { id } => {
                let Some(snapshot) = store.remove(&id) else {
                    return Err(SyncError::validation(format!("unknown ticket '{id}'")));
                };
                (id.clone(), Some(snapshot), true, RestCall::Delete { id })
            }
            MutationIntent::TriggerGrooming { id } => {
                let mut ticket = self.existing(store, &id)?;
                ticket.grooming = Some(match ticket.grooming.take() {
                    Some(mut grooming) => {
                        grooming.status = GroomingStatus::Pending;
                        grooming
                    }
                    None => Grooming::new(GroomingStatus::Pending),
                });
                ticket.updated_at = now;
                let snapshot = store.upsert(ticket);
                (
                    id.clone(),
                    snapshot,
                    false,
                    RestCall::TriggerProcess { id },
                )
            }
        };

        self.next_handle += 1;
        let handle = MutationId(self.next_handle);
        debug!(%handle, target = %target, "optimistic write applied");
        self.pending.insert(
            handle,
            PendingMutation {
                target,
                snapshot,
                is_delete,
                issued_at: now,
            },
        );
        self.statuses.insert(handle, MutationStatus::InFlight);
        Ok((handle, call))
    }

    /// Apply a successful server response. `response` carries the server's
    /// authoritative representation, or `None` for confirmed deletes and for
    /// process-trigger acks (whose completion arrives via push).
    pub fn resolve_success(
        &mut self,
        handle: MutationId,
        response: Option<Ticket>,
        store: &mut TicketStore,
    ) -> ResolveOutcome {
        let Some(pending) = self.pending.remove(&handle) else {
            warn!(%handle, "success for unknown mutation handle, ignoring");
            return ResolveOutcome::Ignored;
        };
        self.statuses.insert(handle, MutationStatus::Succeeded);

        match response {
            Some(server_ticket) => {
                // Create confirmations come back under the server-assigned
                // id; the optimistic placeholder entry must not survive.
                if pending.target != server_ticket.id {
                    store.remove(&pending.target);
                }
                store.upsert(server_ticket);
                ResolveOutcome::Applied
            }
            None => {
                // Delete: the removal already happened optimistically.
                // Process-trigger ack: nothing to merge, the push channel
                // delivers the real state change later.
                if pending.is_delete {
                    debug!(%handle, target = %pending.target, "delete confirmed");
                }
                ResolveOutcome::Confirmed
            }
        }
    }

    /// Roll back a failed mutation per the protocol in the module docs.
    pub fn resolve_failure(
        &mut self,
        handle: MutationId,
        error: &SyncError,
        store: &mut TicketStore,
    ) -> ResolveOutcome {
        let Some(pending) = self.pending.remove(&handle) else {
            warn!(%handle, "failure for unknown mutation handle, ignoring");
            return ResolveOutcome::Ignored;
        };
        self.statuses.insert(handle, MutationStatus::Failed(error.kind));

        if self.has_pending_for(&pending.target) {
            warn!(
                %handle,
                target = %pending.target,
                issued_at = %pending.issued_at,
                "skipping rollback: a later mutation for this ticket is still pending"
            );
            return ResolveOutcome::RollbackSkipped;
        }

        if !error.kind.rolls_back() {
            debug!(
                %handle,
                target = %pending.target,
                kind = %error.kind,
                "skipping snapshot restore in favor of reconciling refetch"
            );
            return ResolveOutcome::RollbackSkipped;
        }

        match pending.snapshot {
            Some(snapshot) => {
                // Restores the entry exactly: failed deletes re-insert it,
                // failed updates/moves revert every field and timestamp.
                store.upsert(snapshot);
            }
            None => {
                // Failed create: the optimistic placeholder must vanish.
                store.remove(&pending.target);
            }
        }
        ResolveOutcome::RolledBack
    }

    fn existing(&self, store: &TicketStore, id: &TicketId) -> Result<Ticket, SyncError> {
        store
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::validation(format!("unknown ticket '{id}'")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::testutil::{sample_ticket, t0};
    use chrono::Duration;

    fn setup() -> (MutationCoordinator, TicketStore) {
        let mut store = TicketStore::new();
        store.upsert(sample_ticket("T-1"));
        (MutationCoordinator::new(), store)
    }

    fn now2() -> DateTime<Utc> {
        t0() + Duration::seconds(10)
    }

    #[test]
    fn optimistic_update_applies_immediately_with_local_timestamp_bump() {
        let (mut coord, mut store) = setup();
        let patch = TicketPatch {
            title: Some("renamed".to_string()),
            ..TicketPatch::default()
        };
        let (handle, call) = coord
            .begin(
                MutationIntent::Update {
                    id: TicketId::new_unchecked("T-1"),
                    patch: patch.clone(),
                },
                &mut store,
                now2(),
            )
            .unwrap();

        let ticket = store.get(&TicketId::new_unchecked("T-1")).unwrap();
        assert_eq!(ticket.title, "renamed");
        assert_eq!(ticket.updated_at, now2(), "local recency bump");
        assert_eq!(coord.status(handle), Some(MutationStatus::InFlight));
        assert_eq!(
            call,
            RestCall::Update {
                id: TicketId::new_unchecked("T-1"),
                patch
            }
        );
    }

    #[test]
    fn success_replaces_with_server_representation() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");
        let (handle, _) = coord
            .begin(
                MutationIntent::Move {
                    id: id.clone(),
                    to: Lane::Done,
                },
                &mut store,
                now2(),
            )
            .unwrap();

        // Server recomputes fields the optimistic guess cannot know.
        let mut server = sample_ticket("T-1");
        server.status = Lane::Done;
        server.quality_score = Some(0.87);
        server.updated_at = now2() + Duration::seconds(1);

        let outcome = coord.resolve_success(handle, Some(server.clone()), &mut store);
        assert_eq!(outcome, ResolveOutcome::Applied);
        assert_eq!(store.get(&id), Some(&server), "server response wins wholesale");
        assert_eq!(coord.status(handle), Some(MutationStatus::Succeeded));
        assert_eq!(coord.in_flight(), 0);
    }

    #[test]
    fn failure_restores_snapshot_exactly() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");
        let before = store.get(&id).cloned().unwrap();

        let (handle, _) = coord
            .begin(
                MutationIntent::Update {
                    id: id.clone(),
                    patch: TicketPatch {
                        priority: Some(Priority::Urgent),
                        body: Some("scribbled".to_string()),
                        ..TicketPatch::default()
                    },
                },
                &mut store,
                now2(),
            )
            .unwrap();
        assert_ne!(store.get(&id), Some(&before));

        let outcome =
            coord.resolve_failure(handle, &SyncError::network("timeout"), &mut store);
        assert_eq!(outcome, ResolveOutcome::RolledBack);
        assert_eq!(store.get(&id), Some(&before), "field-for-field restore");
        assert_eq!(
            coord.status(handle),
            Some(MutationStatus::Failed(ErrorKind::NetworkFailure))
        );
    }

    #[test]
    fn delete_is_optimistic_and_failure_reinserts() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");
        let before = store.get(&id).cloned().unwrap();

        let (handle, _) = coord
            .begin(MutationIntent::Delete { id: id.clone() }, &mut store, now2())
            .unwrap();
        assert!(!store.contains(&id), "removed immediately");

        let outcome =
            coord.resolve_failure(handle, &SyncError::network("boom"), &mut store);
        assert_eq!(outcome, ResolveOutcome::RolledBack);
        assert_eq!(store.get(&id), Some(&before), "delete failure re-inserts");
    }

    #[test]
    fn delete_success_confirms_removal() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");
        let (handle, _) = coord
            .begin(MutationIntent::Delete { id: id.clone() }, &mut store, now2())
            .unwrap();

        let outcome = coord.resolve_success(handle, None, &mut store);
        assert_eq!(outcome, ResolveOutcome::Confirmed);
        assert!(!store.contains(&id));
    }

    #[test]
    fn create_swaps_placeholder_for_server_record() {
        let mut coord = MutationCoordinator::new();
        let mut store = TicketStore::new();
        let draft = TicketDraft {
            title: "fresh".to_string(),
            project: "core".to_string(),
            body: String::new(),
            priority: Priority::default(),
            status: Lane::Backlog,
            assignee: None,
            estimate: None,
        };

        let (handle, _) = coord
            .begin(MutationIntent::Create { draft }, &mut store, now2())
            .unwrap();
        assert_eq!(store.len(), 1);
        let placeholder_id = store.list()[0].id.clone();
        assert!(placeholder_id.is_placeholder());

        let mut server = sample_ticket("T-42");
        server.status = Lane::Backlog;
        server.title = "fresh".to_string();
        let outcome = coord.resolve_success(handle, Some(server.clone()), &mut store);

        assert_eq!(outcome, ResolveOutcome::Applied);
        assert_eq!(store.len(), 1, "placeholder gone, confirmed record in");
        assert_eq!(store.get(&server.id), Some(&server));
        assert!(!store.contains(&placeholder_id));
    }

    #[test]
    fn create_failure_removes_placeholder() {
        let mut coord = MutationCoordinator::new();
        let mut store = TicketStore::new();
        let draft = TicketDraft {
            title: "doomed".to_string(),
            project: "core".to_string(),
            body: String::new(),
            priority: Priority::default(),
            status: Lane::Backlog,
            assignee: None,
            estimate: None,
        };

        let (handle, _) = coord
            .begin(MutationIntent::Create { draft }, &mut store, now2())
            .unwrap();
        assert_eq!(store.len(), 1);

        let outcome =
            coord.resolve_failure(handle, &SyncError::network("rejected"), &mut store);
        assert_eq!(outcome, ResolveOutcome::RolledBack);
        assert!(store.is_empty(), "absent restored to absent");
    }

    #[test]
    fn rollback_skipped_while_later_mutation_pending() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");

        let (first, _) = coord
            .begin(
                MutationIntent::Move {
                    id: id.clone(),
                    to: Lane::InProgress,
                },
                &mut store,
                now2(),
            )
            .unwrap();
        // Second mutation before the first resolves; its snapshot includes
        // the first's optimistic write.
        let (_second, _) = coord
            .begin(
                MutationIntent::Move {
                    id: id.clone(),
                    to: Lane::Done,
                },
                &mut store,
                now2() + Duration::seconds(1),
            )
            .unwrap();

        let outcome =
            coord.resolve_failure(first, &SyncError::network("late fail"), &mut store);
        assert_eq!(outcome, ResolveOutcome::RollbackSkipped);
        assert_eq!(
            store.get(&id).unwrap().status,
            Lane::Done,
            "second mutation's optimistic write untouched"
        );
    }

    #[test]
    fn conflict_stale_skips_snapshot_restore() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");

        let (handle, _) = coord
            .begin(
                MutationIntent::Move {
                    id: id.clone(),
                    to: Lane::Done,
                },
                &mut store,
                now2(),
            )
            .unwrap();

        let outcome =
            coord.resolve_failure(handle, &SyncError::conflict("already deleted"), &mut store);
        assert_eq!(outcome, ResolveOutcome::RollbackSkipped);
        // Optimistic state is left for the reconciling refetch to correct.
        assert_eq!(store.get(&id).unwrap().status, Lane::Done);
        assert_eq!(
            coord.status(handle),
            Some(MutationStatus::Failed(ErrorKind::ConflictStale))
        );
    }

    #[test]
    fn grooming_trigger_flips_status_subfield_only() {
        let (mut coord, mut store) = setup();
        let id = TicketId::new_unchecked("T-1");

        let (_, call) = coord
            .begin(
                MutationIntent::TriggerGrooming { id: id.clone() },
                &mut store,
                now2(),
            )
            .unwrap();
        assert_eq!(call, RestCall::TriggerProcess { id: id.clone() });

        let ticket = store.get(&id).unwrap();
        let grooming = ticket.grooming.as_ref().unwrap();
        assert_eq!(grooming.status, GroomingStatus::Pending);
        assert_eq!(ticket.title, "sample", "other fields untouched");
    }

    #[test]
    fn empty_patch_and_unknown_target_never_reach_the_network() {
        let (mut coord, mut store) = setup();

        let err = coord
            .begin(
                MutationIntent::Update {
                    id: TicketId::new_unchecked("T-1"),
                    patch: TicketPatch::default(),
                },
                &mut store,
                now2(),
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationRejected);

        let err = coord
            .begin(
                MutationIntent::Delete {
                    id: TicketId::new_unchecked("T-missing"),
                },
                &mut store,
                now2(),
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationRejected);
        assert_eq!(coord.in_flight(), 0);
    }

    #[test]
    fn unknown_handle_resolutions_are_ignored() {
        let (mut coord, mut store) = setup();
        let bogus = MutationId(999);
        assert_eq!(
            coord.resolve_success(bogus, None, &mut store),
            ResolveOutcome::Ignored
        );
        assert_eq!(
            coord.resolve_failure(bogus, &SyncError::network("x"), &mut store),
            ResolveOutcome::Ignored
        );
    }
}
