//! Error taxonomy for the sync engine.
//!
//! Every failure path in the engine terminates in one of five kinds, each
//! with a different recovery policy:
//!
//! - [`ErrorKind::AuthExpired`] — credential invalid; the engine signs the
//!   session out and emits a redirect effect. Not a rollback-only failure.
//! - [`ErrorKind::ValidationRejected`] — rejected before any network call,
//!   surfaced immediately to the caller.
//! - [`ErrorKind::NetworkFailure`] — remote call failed; the optimistic
//!   write is rolled back to the pre-mutation snapshot.
//! - [`ErrorKind::ConflictStale`] — the server reports the target no longer
//!   matches assumptions; rollback is skipped in favor of a reconciling
//!   refetch because the local snapshot itself may be wrong.
//! - [`ErrorKind::ConnectionDegraded`] — push channel down; logged and
//!   retried, never surfaced as a blocking error, fails no mutation.

use std::fmt;

/// Machine-readable error kind with a stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthExpired,
    ValidationRejected,
    NetworkFailure,
    ConflictStale,
    ConnectionDegraded,
}

impl ErrorKind {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::AuthExpired => "E1401",
            Self::ValidationRejected => "E2001",
            Self::NetworkFailure => "E3001",
            Self::ConflictStale => "E3002",
            Self::ConnectionDegraded => "E4001",
        }
    }

    /// Short human-facing summary for logs and user messaging.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::AuthExpired => "Session expired",
            Self::ValidationRejected => "Request rejected before sending",
            Self::NetworkFailure => "Request failed",
            Self::ConflictStale => "Ticket changed on the server",
            Self::ConnectionDegraded => "Live updates unavailable",
        }
    }

    /// Optional remediation hint for user-facing surfaces.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::AuthExpired => Some("Sign in again to continue."),
            Self::ValidationRejected => None,
            Self::NetworkFailure => Some("Check your connection and retry."),
            Self::ConflictStale => Some("The board will refresh with the latest server state."),
            Self::ConnectionDegraded => {
                Some("Changes still save; live updates resume on reconnect.")
            }
        }
    }

    /// Whether a failed mutation of this kind restores the pre-mutation
    /// snapshot. `ConflictStale` prefers a reconciling refetch instead.
    #[must_use]
    pub const fn rolls_back(self) -> bool {
        matches!(self, Self::NetworkFailure | Self::AuthExpired)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A classified engine failure: kind plus human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} ({}): {detail}", kind.message(), kind.code())]
pub struct SyncError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl SyncError {
    #[must_use]
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailure, detail)
    }

    #[must_use]
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationRejected, detail)
    }

    #[must_use]
    pub fn auth_expired(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthExpired, detail)
    }

    #[must_use]
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConflictStale, detail)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
