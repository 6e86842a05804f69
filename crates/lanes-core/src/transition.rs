//! Status-transition validation for drag-and-drop.
//!
//! Any lane-to-lane move is legal on this board; the validator's job is to
//! filter out everything that must not become a mutation:
//!
//! - drags below the pointer-movement threshold (accidental clicks),
//! - drop targets that are not a recognized lane,
//! - principals without edit access to the ticket's project,
//! - moves to the ticket's current lane (a no-op, never a request).
//!
//! The decision carries a human-readable reason on reject so the UI can
//! message the user directly.

use std::str::FromStr;

use crate::error::SyncError;
use crate::model::{Lane, Ticket};
use crate::session::Session;

/// Pointer travel of a completed drag, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGesture {
    pub dx: f64,
    pub dy: f64,
}

impl DragGesture {
    #[must_use]
    pub fn distance(self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// Outcome of validating a drag-and-drop move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDecision {
    /// Gesture was below the drag threshold: not a transition attempt.
    Ignored,
    /// Target equals the current lane: legal, but no mutation is issued.
    NoOp,
    /// Valid move; hand off to the mutation coordinator.
    Move(Lane),
}

/// Validate a requested lane move.
///
/// `raw_target` is the drop-target label as delivered by the UI surface; it
/// must parse as a known lane exactly (no coercion here — coercion is for
/// server payloads we must not drop, not for user requests we can reject).
pub fn decide_move(
    ticket: &Ticket,
    raw_target: &str,
    session: &Session,
    gesture: DragGesture,
    threshold_px: f64,
) -> Result<MoveDecision, SyncError> {
    if gesture.distance() < threshold_px {
        return Ok(MoveDecision::Ignored);
    }

    let target = Lane::from_str(raw_target).map_err(|_| {
        SyncError::validation(format!("'{raw_target}' is not a lane on this board"))
    })?;

    if !session.can_edit(&ticket.project) {
        return Err(SyncError::validation(format!(
            "you need edit access to '{}' to move tickets",
            ticket.project
        )));
    }

    if target == ticket.status {
        return Ok(MoveDecision::NoOp);
    }

    Ok(MoveDecision::Move(target))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::{Credential, Role};
    use crate::testutil::sample_ticket;

    const THRESHOLD: f64 = 5.0;

    fn editor_session() -> Session {
        let mut session = Session::new();
        session.sign_in(Credential::new("tok"));
        session.set_project_role("core", Role::Editor);
        session
    }

    fn drag() -> DragGesture {
        DragGesture { dx: 40.0, dy: 3.0 }
    }

    #[test]
    fn tiny_gesture_is_ignored_not_rejected() {
        let ticket = sample_ticket("T-1");
        let decision = decide_move(
            &ticket,
            "done",
            &editor_session(),
            DragGesture { dx: 1.0, dy: 2.0 },
            THRESHOLD,
        )
        .unwrap();
        assert_eq!(decision, MoveDecision::Ignored);
    }

    #[test]
    fn gesture_distance_is_euclidean() {
        let gesture = DragGesture { dx: 3.0, dy: 4.0 };
        assert!((gesture.distance() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_target_lane_is_rejected_with_reason() {
        let ticket = sample_ticket("T-1");
        let err = decide_move(&ticket, "review", &editor_session(), drag(), THRESHOLD)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationRejected);
        assert!(err.detail.contains("review"));
    }

    #[test]
    fn viewer_and_unknown_role_cannot_move() {
        let ticket = sample_ticket("T-1");

        let mut viewer = Session::new();
        viewer.sign_in(Credential::new("tok"));
        viewer.set_project_role("core", Role::Viewer);
        let err = decide_move(&ticket, "done", &viewer, drag(), THRESHOLD).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationRejected);

        // No role cached at all: minimum privilege, same rejection.
        let mut unknown = Session::new();
        unknown.sign_in(Credential::new("tok"));
        let err = decide_move(&ticket, "done", &unknown, drag(), THRESHOLD).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationRejected);
    }

    #[test]
    fn same_lane_move_is_noop() {
        let ticket = sample_ticket("T-1"); // status: todo
        let decision =
            decide_move(&ticket, "todo", &editor_session(), drag(), THRESHOLD).unwrap();
        assert_eq!(decision, MoveDecision::NoOp);
    }

    #[test]
    fn any_lane_to_lane_move_is_legal() {
        let mut ticket = sample_ticket("T-1");
        for from in Lane::ALL {
            ticket.status = from;
            for to in Lane::ALL {
                if to == from {
                    continue;
                }
                let decision = decide_move(
                    &ticket,
                    to.as_str(),
                    &editor_session(),
                    drag(),
                    THRESHOLD,
                )
                .unwrap();
                assert_eq!(decision, MoveDecision::Move(to), "{from} -> {to}");
            }
        }
    }
}
