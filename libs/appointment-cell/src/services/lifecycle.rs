use chrono::NaiveDate;
use tracing::{debug, warn};

use shared_models::error::SchedulingError;

use crate::models::AppointmentStatus;

/// A lifecycle request against an existing appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    Cancel,
    Reschedule { appointment_date: NaiveDate, time_slot: String },
    Complete,
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::Reschedule { .. } => "reschedule",
            LifecycleAction::Complete => "complete",
        }
    }
}

/// Result of applying an action to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the new status (and, for a reschedule, the new date and slot).
    Changed(AppointmentStatus),
    /// Accepted, nothing to write.
    NoOp,
}

/// The appointment state machine.
///
/// ```text
/// scheduled --cancel--> cancelled --reschedule--> scheduled
/// scheduled --complete--> completed
/// ```
///
/// `completed` is terminal. Repeating a transition that already holds is a
/// no-op, as is cancelling or rescheduling a completed appointment. The only
/// rejected move is completing a cancelled appointment.
pub fn apply(current: AppointmentStatus, action: &LifecycleAction) -> Result<Transition, SchedulingError> {
    use AppointmentStatus::*;

    let transition = match (current, action) {
        (Scheduled, LifecycleAction::Cancel) => Transition::Changed(Cancelled),
        (Cancelled | Completed, LifecycleAction::Cancel) => Transition::NoOp,

        (Scheduled | Cancelled, LifecycleAction::Reschedule { .. }) => Transition::Changed(Scheduled),
        (Completed, LifecycleAction::Reschedule { .. }) => Transition::NoOp,

        (Scheduled, LifecycleAction::Complete) => Transition::Changed(Completed),
        (Completed, LifecycleAction::Complete) => Transition::NoOp,
        (Cancelled, LifecycleAction::Complete) => {
            warn!("Rejected {} of a {} appointment", action.name(), current);
            return Err(SchedulingError::InvalidTransition {
                from: current.to_string(),
                action: action.name().to_string(),
            });
        }
    };

    debug!("{} on {} appointment -> {:?}", action.name(), current, transition);
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn reschedule() -> LifecycleAction {
        LifecycleAction::Reschedule {
            appointment_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            time_slot: "10:00 - 10:30".to_string(),
        }
    }

    #[test]
    fn cancel_is_idempotent() {
        use AppointmentStatus::*;
        assert_eq!(apply(Scheduled, &LifecycleAction::Cancel).unwrap(), Transition::Changed(Cancelled));
        assert_eq!(apply(Cancelled, &LifecycleAction::Cancel).unwrap(), Transition::NoOp);
        assert_eq!(apply(Completed, &LifecycleAction::Cancel).unwrap(), Transition::NoOp);
    }

    #[test]
    fn reschedule_revives_cancelled_but_not_completed() {
        use AppointmentStatus::*;
        assert_eq!(apply(Scheduled, &reschedule()).unwrap(), Transition::Changed(Scheduled));
        assert_eq!(apply(Cancelled, &reschedule()).unwrap(), Transition::Changed(Scheduled));
        assert_eq!(apply(Completed, &reschedule()).unwrap(), Transition::NoOp);
    }

    #[test]
    fn completion_only_from_scheduled() {
        use AppointmentStatus::*;
        assert_eq!(apply(Scheduled, &LifecycleAction::Complete).unwrap(), Transition::Changed(Completed));
        assert_eq!(apply(Completed, &LifecycleAction::Complete).unwrap(), Transition::NoOp);
        assert_matches!(
            apply(Cancelled, &LifecycleAction::Complete),
            Err(SchedulingError::InvalidTransition { ref from, ref action }) if from == "cancelled" && action == "complete"
        );
    }
}
