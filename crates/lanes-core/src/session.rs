//! Session context: credential and role lookups.
//!
//! The session is explicit process-wide state with defined initialization
//! (`sign_in`) and teardown (`sign_out`). It is handed to the engine as a
//! constructor dependency, never read ambiently. Role lookups degrade to
//! minimum privilege: a project with no cached role, or a lookup that timed
//! out upstream, grants no access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Opaque bearer credential issued by the external auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Per-project authorization level, ordered by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Role {
    Viewer = 0,
    Editor = 1,
    Admin = 2,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may mutate tickets.
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Editor | Self::Admin)
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Current-session state: the credential and the per-project role cache.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Credential>,
    roles: BTreeMap<String, Role>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the session with a credential.
    pub fn sign_in(&mut self, credential: Credential) {
        info!("session initialized");
        self.credential = Some(credential);
    }

    /// Tear the session down: credential and cached roles are dropped.
    pub fn sign_out(&mut self) {
        info!("session torn down");
        self.credential = None;
        self.roles.clear();
    }

    #[must_use]
    pub const fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Record the role the permission collaborator reported for a project.
    pub fn set_project_role(&mut self, project: impl Into<String>, role: Role) {
        self.roles.insert(project.into(), role);
    }

    /// Role for a project. `None` means no access — unknown is never treated
    /// as full access, and upstream lookup timeouts simply leave the cache
    /// empty, landing here.
    #[must_use]
    pub fn project_role(&self, project: &str) -> Option<Role> {
        self.roles.get(project).copied()
    }

    /// Whether the current principal may edit tickets in `project`.
    #[must_use]
    pub fn can_edit(&self, project: &str) -> bool {
        self.project_role(project).is_some_and(Role::can_edit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::Viewer < Role::Editor);
        assert!(Role::Editor < Role::Admin);
    }

    #[test]
    fn edit_capability_per_role() {
        assert!(!Role::Viewer.can_edit());
        assert!(Role::Editor.can_edit());
        assert!(Role::Admin.can_edit());
    }

    #[test]
    fn unknown_project_is_no_access() {
        let mut session = Session::new();
        session.sign_in(Credential::new("tok"));
        assert!(!session.can_edit("core"), "unknown role must deny");

        session.set_project_role("core", Role::Viewer);
        assert!(!session.can_edit("core"));

        session.set_project_role("core", Role::Editor);
        assert!(session.can_edit("core"));
    }

    #[test]
    fn sign_out_clears_credential_and_roles() {
        let mut session = Session::new();
        session.sign_in(Credential::new("tok"));
        session.set_project_role("core", Role::Admin);
        assert!(session.is_authenticated());

        session.sign_out();
        assert!(!session.is_authenticated());
        assert!(session.credential().is_none());
        assert!(!session.can_edit("core"));
    }
}
