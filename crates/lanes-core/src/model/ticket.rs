//! Ticket model: lanes, priorities, grooming, and the ticket aggregate.
//!
//! Lanes and priorities are closed, ordered enums. Server payloads may carry
//! values outside the known sets; the wire boundary coerces those to the
//! default variant rather than dropping the record (see [`Lane::coerce`]),
//! so inside the record store `status` is always a member of the lane set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

use crate::model::ticket_id::TicketId;

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// The ordered set of status lanes on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Lane {
    Backlog = 0,
    Todo = 1,
    InProgress = 2,
    Done = 3,
}

impl Lane {
    /// All lanes in board order.
    pub const ALL: [Self; 4] = [Self::Backlog, Self::Todo, Self::InProgress, Self::Done];

    /// Numeric board position.
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    /// Coerce a raw wire value into a known lane.
    ///
    /// Unrecognized values map to [`Lane::default`] with a warning — a ticket
    /// must never be dropped because the server introduced a lane this client
    /// does not know.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        Self::from_str(raw).unwrap_or_else(|_| {
            warn!(value = raw, "unrecognized lane, coercing to default");
            Self::default()
        })
    }
}

impl Default for Lane {
    fn default() -> Self {
        Self::Backlog
    }
}

impl PartialOrd for Lane {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lane {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "backlog" => Ok(Self::Backlog),
            "todo" => Ok(Self::Todo),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "lane",
                got: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Ticket priority, ordered low to urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Coerce a raw wire value into a known priority (default on unknown).
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        Self::from_str(raw).unwrap_or_else(|_| {
            warn!(value = raw, "unrecognized priority, coercing to default");
            Self::default()
        })
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Grooming
// ---------------------------------------------------------------------------

/// Lifecycle of the server-side grooming process for a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroomingStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Manual,
}

impl GroomingStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for GroomingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroomingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseEnumError {
                expected: "grooming status",
                got: s.to_string(),
            }),
        }
    }
}

/// Grooming sub-record: status plus attempt bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grooming {
    pub status: GroomingStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Grooming {
    /// A fresh grooming record in the given status with zero attempts.
    #[must_use]
    pub const fn new(status: GroomingStatus) -> Self {
        Self {
            status,
            attempts: 0,
            last_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket aggregate
// ---------------------------------------------------------------------------

/// A work item as held in the record store.
///
/// `id` and `created_at` are immutable once assigned by the server.
/// `updated_at` is authoritative only when it came from a server payload; the
/// mutation coordinator bumps it locally during an optimistic write so the UI
/// reflects recency, and the server value replaces it on confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub status: Lane,
    pub priority: Priority,
    pub project: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimate: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub grooming: Option<Grooming>,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// Partial update to a ticket: the body of a REST `update` call and the shape
/// applied by the optimistic write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Lane>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
}

impl TicketPatch {
    /// A patch that only moves the ticket to `lane`.
    #[must_use]
    pub fn move_to(lane: Lane) -> Self {
        Self {
            status: Some(lane),
            ..Self::default()
        }
    }

    /// Apply every set field to `ticket` in place.
    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(title) = &self.title {
            ticket.title = title.clone();
        }
        if let Some(body) = &self.body {
            ticket.body = body.clone();
        }
        if let Some(assignee) = &self.assignee {
            ticket.assignee = Some(assignee.clone());
        }
        if let Some(estimate) = self.estimate {
            ticket.estimate = Some(estimate);
        }
    }

    /// True when no field is set (applying it would change nothing).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.assignee.is_none()
            && self.estimate.is_none()
    }
}

/// Payload for creating a new ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDraft {
    pub title: String,
    pub project: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Lane,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimate: Option<f64>,
}

impl TicketDraft {
    /// Materialize the draft as an optimistic ticket under a placeholder id.
    #[must_use]
    pub fn into_ticket(self, id: TicketId, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id,
            status: self.status,
            priority: self.priority,
            project: self.project,
            title: self.title,
            body: self.body,
            assignee: self.assignee,
            estimate: self.estimate,
            created_at: now,
            updated_at: now,
            grooming: None,
            quality_score: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse error
// ---------------------------------------------------------------------------

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected}: '{got}'")]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
