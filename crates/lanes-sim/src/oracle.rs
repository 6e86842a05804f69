//! Convergence oracle: invariants that must hold at quiescence.
//!
//! Once every queued delivery has been fed back and a final authoritative
//! fetch has applied, the engine's store must be exactly the server's ticket
//! map, with no optimistic residue left behind.

use lanes_core::{BoardEngine, MutationId, MutationStatus};

use crate::server::ModelServer;

/// Result of running every invariant check.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    /// Description of every invariant that was violated.
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Diagnostic for a single failed check.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    /// Engine and server disagree on how many tickets exist.
    CountMismatch { engine: usize, server: usize },
    /// Engine and server disagree on one ticket's contents.
    Divergence { id: String, detail: String },
    /// An optimistic placeholder id survived quiescence.
    PlaceholderResidue { id: String },
    /// A tracked mutation never reached a terminal status.
    UnresolvedMutation { handle: String },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CountMismatch { engine, server } => {
                write!(f, "count mismatch: engine={engine} server={server}")
            }
            Self::Divergence { id, detail } => write!(f, "divergence on {id}: {detail}"),
            Self::PlaceholderResidue { id } => write!(f, "placeholder residue: {id}"),
            Self::UnresolvedMutation { handle } => write!(f, "unresolved mutation: {handle}"),
        }
    }
}

/// Checks a quiescent engine against the model server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceOracle;

impl ConvergenceOracle {
    /// Run every check and collect all violations.
    #[must_use]
    pub fn check_all(
        engine: &BoardEngine,
        server: &ModelServer,
        handles: &[MutationId],
    ) -> OracleResult {
        let mut violations = Vec::new();
        violations.extend(Self::check_convergence(engine, server));
        violations.extend(Self::check_no_placeholders(engine));
        violations.extend(Self::check_mutations_terminal(engine, handles));
        OracleResult::from_violations(violations)
    }

    /// The store must equal the server's map, ticket for ticket.
    fn check_convergence(engine: &BoardEngine, server: &ModelServer) -> Vec<InvariantViolation> {
        let local = engine.tickets();
        let truth = server.snapshot();
        let mut violations = Vec::new();
        if local.len() != truth.len() {
            violations.push(InvariantViolation::CountMismatch {
                engine: local.len(),
                server: truth.len(),
            });
        }
        for server_ticket in &truth {
            match local.iter().find(|t| t.id == server_ticket.id) {
                None => violations.push(InvariantViolation::Divergence {
                    id: server_ticket.id.to_string(),
                    detail: "missing from engine".to_string(),
                }),
                Some(engine_ticket) if engine_ticket != server_ticket => {
                    violations.push(InvariantViolation::Divergence {
                        id: server_ticket.id.to_string(),
                        detail: format!("engine={engine_ticket:?} server={server_ticket:?}"),
                    });
                }
                Some(_) => {}
            }
        }
        for engine_ticket in &local {
            if !truth.iter().any(|t| t.id == engine_ticket.id) {
                violations.push(InvariantViolation::Divergence {
                    id: engine_ticket.id.to_string(),
                    detail: "missing from server".to_string(),
                });
            }
        }
        violations
    }

    /// No `tmp-` id may survive: every confirmed create swapped its
    /// placeholder and every failed one removed it.
    fn check_no_placeholders(engine: &BoardEngine) -> Vec<InvariantViolation> {
        engine
            .tickets()
            .iter()
            .filter(|t| t.id.is_placeholder())
            .map(|t| InvariantViolation::PlaceholderResidue {
                id: t.id.to_string(),
            })
            .collect()
    }

    /// Every mutation whose call was executed must have resolved.
    fn check_mutations_terminal(
        engine: &BoardEngine,
        handles: &[MutationId],
    ) -> Vec<InvariantViolation> {
        handles
            .iter()
            .filter(|&&handle| {
                matches!(engine.mutation_status(handle), Some(MutationStatus::InFlight) | None)
            })
            .map(|handle| InvariantViolation::UnresolvedMutation {
                handle: handle.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lanes_core::{
        Credential, Effect, EngineConfig, ManualClock, Role, TicketFilter,
    };

    fn quiescent_pair() -> (BoardEngine, ModelServer) {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let server = ModelServer::new(t0, 3);
        let mut engine = BoardEngine::new(EngineConfig::default(), Box::new(ManualClock::new(t0)));
        engine.sign_in(Credential::new("tok"));
        engine.set_project_role("core", Role::Editor);
        engine.load(TicketFilter::default());
        let generation = std::iter::from_fn(|| engine.next_effect())
            .find_map(|e| match e {
                Effect::Fetch { generation, .. } => Some(generation),
                _ => None,
            })
            .unwrap();
        engine.fetch_completed(generation, Ok(server.snapshot()));
        (engine, server)
    }

    #[test]
    fn synchronized_pair_passes() {
        let (engine, server) = quiescent_pair();
        let result = ConvergenceOracle::check_all(&engine, &server, &[]);
        assert!(result.passed, "violations: {:?}", result.violations);
    }

    #[test]
    fn server_side_drift_is_reported() {
        let (engine, mut server) = quiescent_pair();
        let victim = server.snapshot().remove(0).id;
        server
            .apply(&lanes_core::RestCall::Delete { id: victim })
            .unwrap();

        let result = ConvergenceOracle::check_all(&engine, &server, &[]);
        assert!(!result.passed);
        assert!(result
            .violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::CountMismatch { .. })));
    }

    #[test]
    fn unresolved_handle_is_reported() {
        let (mut engine, server) = quiescent_pair();
        let id = server.snapshot().remove(0).id;
        let handle = engine
            .move_ticket(id, lanes_core::Lane::Done)
            .expect("move issued");

        let result = ConvergenceOracle::check_all(&engine, &server, &[handle]);
        assert!(result
            .violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::UnresolvedMutation { .. })));
    }
}
