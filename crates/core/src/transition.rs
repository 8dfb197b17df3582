//! Status transition guard.
//!
//! ```text
//!              ┌──────────► Completed
//!  Scheduled ──┤
//!              └──────────► Canceled
//! ```
//!
//! Completed and Canceled have no outgoing edges. Persisting an accepted
//! change upstream is the caller's job.

use tracing::debug;

use crate::error::TransitionError;
use crate::event::{EventStatus, MaintenanceEvent};

/// Whether `from -> to` is a legal edge (including the `Scheduled` self-loop).
pub fn can_transition(from: EventStatus, to: EventStatus) -> bool {
    match (from, to) {
        (EventStatus::Scheduled, _) => true,
        (EventStatus::Completed | EventStatus::Canceled, _) => false,
    }
}

/// Stateless enforcer of the event status machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTransitionGuard;

impl StatusTransitionGuard {
    /// Check a transition without touching the event.
    pub fn check(&self, event: &MaintenanceEvent, to: EventStatus) -> Result<(), TransitionError> {
        let from = event.status();
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                id: event.id.clone(),
                from,
                to,
            })
        }
    }

    /// Apply a status change in place.
    ///
    /// # Errors
    ///
    /// [`TransitionError::InvalidTransition`] whenever the event is already
    /// terminal; the event is left unchanged.
    pub fn apply_transition(
        &self,
        event: &mut MaintenanceEvent,
        to: EventStatus,
    ) -> Result<(), TransitionError> {
        self.check(event, to)?;
        if event.status() != to {
            debug!(event_id = %event.id, from = %event.status(), to = %to, "status transition");
            event.set_status(to);
        }
        Ok(())
    }
}
