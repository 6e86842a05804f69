//! Shared fixtures for unit tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::model::{Lane, Priority, Ticket, TicketId};

/// 2024-01-01T00:00:00Z — the fixed epoch used by test fixtures.
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A plain ticket in `todo` for the given id.
pub(crate) fn sample_ticket(id: &str) -> Ticket {
    Ticket {
        id: TicketId::new_unchecked(id),
        status: Lane::Todo,
        priority: Priority::Medium,
        project: "core".to_string(),
        title: "sample".to_string(),
        body: "original body".to_string(),
        assignee: None,
        estimate: None,
        created_at: t0(),
        updated_at: t0(),
        grooming: None,
        quality_score: None,
    }
}
