//! Property tests for rollback exactness and server precedence.

use chrono::Duration;
use proptest::prelude::*;

use lanes_core::mutation::{MutationCoordinator, MutationIntent, ResolveOutcome};
use lanes_core::{SyncError, TicketStore};

use generators::{arb_patch, arb_ticket, t0};

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    /// For any ticket and any patch, a failed update restores the store
    /// entry field-for-field.
    #[test]
    fn failed_update_restores_the_snapshot_exactly(
        ticket in arb_ticket(),
        patch in arb_patch(),
    ) {
        prop_assume!(!patch.is_empty());

        let mut store = TicketStore::new();
        let mut coord = MutationCoordinator::new();
        store.upsert(ticket.clone());

        let (handle, _) = coord
            .begin(
                MutationIntent::Update { id: ticket.id.clone(), patch },
                &mut store,
                t0() + Duration::seconds(999),
            )
            .expect("non-empty patch on an existing ticket");

        let outcome =
            coord.resolve_failure(handle, &SyncError::network("injected"), &mut store);
        prop_assert_eq!(outcome, ResolveOutcome::RolledBack);
        prop_assert_eq!(store.get(&ticket.id), Some(&ticket));
        prop_assert_eq!(store.len(), 1);
    }

    /// A failed delete re-inserts the snapshot; a successful one confirms
    /// the removal. Either way the store is consistent.
    #[test]
    fn delete_failure_reinserts_and_success_confirms(
        ticket in arb_ticket(),
        fails in any::<bool>(),
    ) {
        let mut store = TicketStore::new();
        let mut coord = MutationCoordinator::new();
        store.upsert(ticket.clone());

        let (handle, _) = coord
            .begin(
                MutationIntent::Delete { id: ticket.id.clone() },
                &mut store,
                t0(),
            )
            .expect("delete of an existing ticket");
        prop_assert!(store.is_empty(), "optimistic removal");

        if fails {
            coord.resolve_failure(handle, &SyncError::network("injected"), &mut store);
            prop_assert_eq!(store.get(&ticket.id), Some(&ticket));
        } else {
            coord.resolve_success(handle, None, &mut store);
            prop_assert!(store.is_empty());
        }
    }

    /// The post-success entry always equals the server's representation,
    /// regardless of what the optimistic write guessed.
    #[test]
    fn success_always_applies_the_server_representation(
        local in arb_ticket(),
        patch in arb_patch(),
        mut server in arb_ticket(),
    ) {
        prop_assume!(!patch.is_empty());

        let mut store = TicketStore::new();
        let mut coord = MutationCoordinator::new();
        store.upsert(local.clone());
        server.id = local.id.clone();

        let (handle, _) = coord
            .begin(
                MutationIntent::Update { id: local.id.clone(), patch },
                &mut store,
                t0(),
            )
            .expect("update issued");

        coord.resolve_success(handle, Some(server.clone()), &mut store);
        prop_assert_eq!(store.get(&local.id), Some(&server));
    }
}
