//! StatusMachine — the appointment lifecycle state machine.
//!
//! Validates edges only; who may request an edge is decided by
//! [`crate::access::AccessScope`] before the table is consulted. A
//! successful transition writes the new status and nothing else.

use crate::error::ClinicError;
use crate::types::AppointmentStatus;

pub struct StatusMachine;

impl StatusMachine {
    /// All legal next statuses from a given status. Terminal states return
    /// an empty set.
    pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match from {
            Scheduled => &[Confirmed, Completed, Cancelled, NoShow],
            Confirmed => &[Completed, Cancelled, NoShow],
            Completed | Cancelled | NoShow => &[],
        }
    }

    /// Reject any edge not in the transition table, including self-edges
    /// and any transition out of a terminal status.
    pub fn validate(
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), ClinicError> {
        if Self::valid_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(ClinicError::InvalidTransition { from, to })
        }
    }
}
