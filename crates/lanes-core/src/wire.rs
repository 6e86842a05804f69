//! Boundary narrowing for loose server payloads.
//!
//! REST responses and push frames arrive as dynamic JSON. Nothing enters the
//! record store until it has been narrowed to the strict [`Ticket`] shape
//! here. Narrowing is deliberately asymmetric:
//!
//! - **Coerced**: unrecognized `status` / `priority` values map to the
//!   default variant (a ticket is never dropped because the server grew a
//!   lane this client does not know). A malformed `grooming` sub-record is
//!   dropped from the ticket, not fatal.
//! - **Rejected**: a missing/invalid `id`, `title`, or timestamp makes the
//!   record unusable and fails the parse.
//!
//! Bulk payloads skip unparseable records with a warning rather than failing
//! the whole load.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::{ErrorKind, SyncError};
use crate::model::{Grooming, GroomingStatus, Lane, Priority, Ticket, TicketId};
use crate::realtime::PushEvent;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while narrowing a wire payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {detail}")]
    InvalidField { field: &'static str, detail: String },
    #[error("unknown push event type: '{0}'")]
    UnknownEventType(String),
}

// ---------------------------------------------------------------------------
// Ticket narrowing
// ---------------------------------------------------------------------------

/// Narrow one loose JSON value into a strict [`Ticket`].
pub fn parse_ticket(value: &Value) -> Result<Ticket, WireError> {
    let obj = value.as_object().ok_or(WireError::NotAnObject)?;

    let id = required_str(value, "id")?;
    let id = TicketId::new(id).map_err(|e| WireError::InvalidField {
        field: "id",
        detail: e.to_string(),
    })?;

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .map_or_else(Lane::default, Lane::coerce);
    let priority = obj
        .get("priority")
        .and_then(Value::as_str)
        .map_or_else(Priority::default, Priority::coerce);

    let ticket = Ticket {
        id,
        status,
        priority,
        project: optional_str(obj, "project").unwrap_or_default(),
        title: required_str(value, "title")?.to_string(),
        body: optional_str(obj, "body").unwrap_or_default(),
        assignee: optional_str(obj, "assignee"),
        estimate: obj.get("estimate").and_then(Value::as_f64),
        created_at: required_timestamp(value, "createdAt")?,
        updated_at: required_timestamp(value, "updatedAt")?,
        grooming: obj.get("grooming").and_then(parse_grooming),
        quality_score: obj.get("qualityScore").and_then(Value::as_f64),
    };
    Ok(ticket)
}

/// Narrow a bulk payload. Unparseable records are skipped with a warning so
/// one bad row cannot fail a whole board load.
#[must_use]
pub fn parse_tickets(values: &[Value]) -> Vec<Ticket> {
    let mut tickets = Vec::with_capacity(values.len());
    for value in values {
        match parse_ticket(value) {
            Ok(ticket) => tickets.push(ticket),
            Err(err) => warn!(%err, "skipping unparseable ticket in bulk payload"),
        }
    }
    tickets
}

fn parse_grooming(value: &Value) -> Option<Grooming> {
    let obj = value.as_object()?;
    let status = obj.get("status").and_then(Value::as_str)?;
    let Ok(status) = status.parse::<GroomingStatus>() else {
        warn!(value = status, "unrecognized grooming status, dropping sub-record");
        return None;
    };
    Some(Grooming {
        status,
        attempts: obj
            .get("attempts")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        last_error: obj
            .get("lastError")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn required_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, WireError> {
    value
        .get(field)
        .ok_or(WireError::MissingField(field))?
        .as_str()
        .ok_or(WireError::InvalidField {
            field,
            detail: "expected a string".to_string(),
        })
}

fn optional_str(obj: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn required_timestamp(value: &Value, field: &'static str) -> Result<DateTime<Utc>, WireError> {
    let raw = required_str(value, field)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WireError::InvalidField {
            field,
            detail: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Push envelope
// ---------------------------------------------------------------------------

/// Parse one push frame. Envelope format:
///
/// ```json
/// {"type": "updated", "ticket": { ... }}
/// {"type": "deleted", "id": "T-42"}
/// {"type": "bulk-init", "tickets": [ ... ]}
/// ```
pub fn parse_push_event(value: &Value) -> Result<PushEvent, WireError> {
    let kind = required_str(value, "type")?;
    match kind {
        "bulk-init" => {
            let tickets = value
                .get("tickets")
                .and_then(Value::as_array)
                .ok_or(WireError::MissingField("tickets"))?;
            Ok(PushEvent::BulkInit(parse_tickets(tickets)))
        }
        "created" => Ok(PushEvent::Created(parse_ticket(
            value.get("ticket").ok_or(WireError::MissingField("ticket"))?,
        )?)),
        "updated" => Ok(PushEvent::Updated(parse_ticket(
            value.get("ticket").ok_or(WireError::MissingField("ticket"))?,
        )?)),
        "deleted" => {
            let id = required_str(value, "id")?;
            let id = TicketId::new(id).map_err(|e| WireError::InvalidField {
                field: "id",
                detail: e.to_string(),
            })?;
            Ok(PushEvent::Deleted(id))
        }
        other => Err(WireError::UnknownEventType(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// HTTP status classification
// ---------------------------------------------------------------------------

/// Map an HTTP status (0 = transport-level failure) onto the error taxonomy.
#[must_use]
pub fn classify_http_failure(status: u16, detail: impl Into<String>) -> SyncError {
    let kind = match status {
        401 => ErrorKind::AuthExpired,
        409 | 410 | 412 => ErrorKind::ConflictStale,
        _ => ErrorKind::NetworkFailure,
    };
    SyncError::new(kind, detail)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_ticket(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "status": status,
            "priority": "high",
            "project": "core",
            "title": "wire test",
            "body": "b",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
        })
    }

    #[test]
    fn parses_well_formed_ticket() {
        let ticket = parse_ticket(&raw_ticket("T-1", "in-progress")).unwrap();
        assert_eq!(ticket.id.as_str(), "T-1");
        assert_eq!(ticket.status, Lane::InProgress);
        assert_eq!(ticket.priority, Priority::High);
        assert!(ticket.grooming.is_none());
    }

    #[test]
    fn unknown_status_coerces_instead_of_dropping() {
        let ticket = parse_ticket(&raw_ticket("T-1", "review")).unwrap();
        assert_eq!(ticket.status, Lane::Backlog, "coerced to default lane");
    }

    #[test]
    fn unknown_priority_coerces_to_default() {
        let mut raw = raw_ticket("T-1", "todo");
        raw["priority"] = json!("p0");
        let ticket = parse_ticket(&raw).unwrap();
        assert_eq!(ticket.priority, Priority::Medium);
    }

    #[test]
    fn missing_id_is_rejected() {
        let mut raw = raw_ticket("T-1", "todo");
        raw.as_object_mut().unwrap().remove("id");
        assert_eq!(parse_ticket(&raw), Err(WireError::MissingField("id")));
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let mut raw = raw_ticket("T-1", "todo");
        raw["updatedAt"] = json!("yesterday");
        assert!(matches!(
            parse_ticket(&raw),
            Err(WireError::InvalidField {
                field: "updatedAt",
                ..
            })
        ));
    }

    #[test]
    fn grooming_parses_and_bad_grooming_drops() {
        let mut raw = raw_ticket("T-1", "todo");
        raw["grooming"] = json!({"status": "failed", "attempts": 2, "lastError": "boom"});
        let ticket = parse_ticket(&raw).unwrap();
        let grooming = ticket.grooming.unwrap();
        assert_eq!(grooming.status, GroomingStatus::Failed);
        assert_eq!(grooming.attempts, 2);
        assert_eq!(grooming.last_error.as_deref(), Some("boom"));

        raw["grooming"] = json!({"status": "warp"});
        assert!(parse_ticket(&raw).unwrap().grooming.is_none());
    }

    #[test]
    fn bulk_parse_skips_bad_rows() {
        let rows = vec![
            raw_ticket("T-1", "todo"),
            json!({"title": "no id"}),
            raw_ticket("T-2", "done"),
        ];
        let tickets = parse_tickets(&rows);
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].id.as_str(), "T-1");
        assert_eq!(tickets[1].id.as_str(), "T-2");
    }

    #[test]
    fn push_envelope_all_kinds() {
        let bulk = json!({"type": "bulk-init", "tickets": [raw_ticket("T-1", "todo")]});
        assert!(matches!(
            parse_push_event(&bulk).unwrap(),
            PushEvent::BulkInit(tickets) if tickets.len() == 1
        ));

        let created = json!({"type": "created", "ticket": raw_ticket("T-2", "todo")});
        assert!(matches!(
            parse_push_event(&created).unwrap(),
            PushEvent::Created(t) if t.id.as_str() == "T-2"
        ));

        let updated = json!({"type": "updated", "ticket": raw_ticket("T-2", "done")});
        assert!(matches!(
            parse_push_event(&updated).unwrap(),
            PushEvent::Updated(t) if t.status == Lane::Done
        ));

        let deleted = json!({"type": "deleted", "id": "T-3"});
        assert!(matches!(
            parse_push_event(&deleted).unwrap(),
            PushEvent::Deleted(id) if id.as_str() == "T-3"
        ));

        let bogus = json!({"type": "renamed", "id": "T-3"});
        assert_eq!(
            parse_push_event(&bogus),
            Err(WireError::UnknownEventType("renamed".to_string()))
        );
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(
            classify_http_failure(401, "expired").kind,
            ErrorKind::AuthExpired
        );
        assert_eq!(
            classify_http_failure(409, "gone").kind,
            ErrorKind::ConflictStale
        );
        assert_eq!(
            classify_http_failure(500, "ise").kind,
            ErrorKind::NetworkFailure
        );
        assert_eq!(
            classify_http_failure(0, "reset").kind,
            ErrorKind::NetworkFailure
        );
    }
}
