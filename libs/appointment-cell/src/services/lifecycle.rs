use tracing::{debug, warn};

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentEvent, AppointmentStatus,
};

/// The appointment state machine.
///
/// Role and ownership are checked before the state is even looked at, so a
/// stranger probing a terminal appointment learns nothing about it.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Who may apply which event.
    pub fn authorize(
        &self,
        appointment: &Appointment,
        actor: &Actor,
        event: AppointmentEvent,
    ) -> Result<(), AppointmentError> {
        let allowed = match event {
            AppointmentEvent::Approve | AppointmentEvent::Reject | AppointmentEvent::Complete => {
                matches!(actor, Actor::Doctor(id) if *id == appointment.doctor_id)
            }
            AppointmentEvent::Cancel => {
                matches!(actor, Actor::Doctor(id) if *id == appointment.doctor_id)
                    || matches!(actor, Actor::Patient(id) if *id == appointment.patient_id)
            }
        };

        if allowed {
            Ok(())
        } else {
            warn!("Actor {:?} not authorized for {:?} on appointment {}", actor, event, appointment.id);
            Err(AppointmentError::Unauthorized)
        }
    }

    /// The status an event leads to, or an error when the event is illegal
    /// in the current status.
    pub fn next_status(
        &self,
        current: AppointmentStatus,
        event: AppointmentEvent,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating transition {:?} --{:?}-->", current, event);

        let next = match (current, event) {
            (AppointmentStatus::PendingApproval, AppointmentEvent::Approve) => {
                Some(AppointmentStatus::Scheduled)
            }
            (AppointmentStatus::PendingApproval, AppointmentEvent::Reject) => {
                Some(AppointmentStatus::Cancelled)
            }
            (AppointmentStatus::PendingApproval, AppointmentEvent::Cancel)
            | (AppointmentStatus::Scheduled, AppointmentEvent::Cancel) => {
                Some(AppointmentStatus::Cancelled)
            }
            (AppointmentStatus::Scheduled, AppointmentEvent::Complete) => {
                Some(AppointmentStatus::Completed)
            }
            _ => None,
        };

        next.ok_or_else(|| {
            warn!("Invalid transition attempted: {:?} --{:?}-->", current, event);
            AppointmentError::InvalidStateTransition(current)
        })
    }

    /// Events currently applicable, for surfacing actions in the UI.
    pub fn valid_events(&self, current: AppointmentStatus) -> Vec<AppointmentEvent> {
        match current {
            AppointmentStatus::PendingApproval => vec![
                AppointmentEvent::Approve,
                AppointmentEvent::Reject,
                AppointmentEvent::Cancel,
            ],
            AppointmentStatus::Scheduled => vec![
                AppointmentEvent::Cancel,
                AppointmentEvent::Complete,
            ],
            AppointmentStatus::Cancelled | AppointmentStatus::Completed => vec![],
        }
    }

    /// Whether applying the event hands the slot back to the open pool.
    pub fn releases_slot(&self, event: AppointmentEvent) -> bool {
        matches!(event, AppointmentEvent::Reject | AppointmentEvent::Cancel)
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
