//! Validated ticket identifier.
//!
//! Ticket ids are server-assigned and opaque to the client. The one client-side
//! exception is the optimistic-create placeholder (`tmp-N`), which exists in
//! the record store only between the optimistic insert and the server's
//! confirmation, and is recognizable via [`TicketId::is_placeholder`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix used for locally-assigned optimistic-create placeholders.
pub const PLACEHOLDER_PREFIX: &str = "tmp-";

/// A validated ticket identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Parse and validate a ticket id.
    ///
    /// Ids must be non-empty and free of whitespace. No other structure is
    /// assumed; the server owns the id format.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidTicketId> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(InvalidTicketId::Empty);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(InvalidTicketId::Whitespace(raw));
        }
        Ok(Self(raw))
    }

    /// Construct without validation. For literals known to be well-formed
    /// (tests, placeholder construction).
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the Nth optimistic-create placeholder id.
    #[must_use]
    pub fn placeholder(n: u64) -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{n}"))
    }

    /// Whether this id is a client-local optimistic placeholder rather than
    /// a server-assigned id.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TicketId {
    type Err = InvalidTicketId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when a ticket id fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTicketId {
    #[error("ticket id is empty")]
    Empty,
    #[error("ticket id contains whitespace: '{0}'")]
    Whitespace(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_server_style_ids() {
        assert_eq!(TicketId::new("T-42").unwrap().as_str(), "T-42");
        assert_eq!(TicketId::new("a7x9k").unwrap().as_str(), "a7x9k");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(TicketId::new(""), Err(InvalidTicketId::Empty));
        assert!(matches!(
            TicketId::new("T 42"),
            Err(InvalidTicketId::Whitespace(_))
        ));
    }

    #[test]
    fn placeholder_ids_are_recognizable() {
        let id = TicketId::placeholder(7);
        assert_eq!(id.as_str(), "tmp-7");
        assert!(id.is_placeholder());
        assert!(!TicketId::new_unchecked("T-42").is_placeholder());
    }

    #[test]
    fn serde_is_transparent() {
        let id = TicketId::new_unchecked("T-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"T-42\"");
        let back: TicketId = serde_json::from_str("\"T-42\"").unwrap();
        assert_eq!(back, id);
    }
}
