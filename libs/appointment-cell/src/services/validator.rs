use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use holiday_cell::HolidaySet;
use shared_config::AppConfig;
use shared_models::entities::Appointment;

use crate::models::{OverlapPolicy, ProposedAppointment, RejectionReason, ValidationResult};

/// Accept/reject decision for a proposed appointment.
///
/// Checks run in a fixed order and stop at the first failure: the range,
/// then the holiday set on the clinic's local start date, then (when the
/// policy asks for it) overlaps with the same professional's bookings.
#[derive(Debug, Clone)]
pub struct AppointmentValidator {
    overlap_policy: OverlapPolicy,
    timezone: FixedOffset,
}

impl AppointmentValidator {
    pub fn new(overlap_policy: OverlapPolicy, timezone: FixedOffset) -> Self {
        Self {
            overlap_policy,
            timezone,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        Ok(Self::new(config.overlap_policy.parse()?, config.clinic_timezone()))
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap_policy
    }

    /// Wall-clock date of `instant` at the clinic.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn validate(
        &self,
        proposed: &ProposedAppointment,
        holidays: &HolidaySet,
        existing: &[Appointment],
    ) -> ValidationResult {
        if proposed.end <= proposed.start {
            return ValidationResult::rejected(RejectionReason::InvalidRange, None);
        }

        let local_start = self.local_date(proposed.start);
        if let Some(holiday) = holidays.holiday_on(local_start) {
            debug!("Rejecting appointment on {}: {}", local_start, holiday.name);
            return ValidationResult::rejected(RejectionReason::HolidayBlocked, Some(holiday.name.clone()));
        }

        if self.overlap_policy == OverlapPolicy::SameProfessional {
            if let Some(conflict) = self.find_overlap(proposed, existing) {
                debug!("Appointment overlaps {} for the same professional", conflict.id);
                return ValidationResult::rejected(
                    RejectionReason::ProfessionalOverlap,
                    Some(conflict.id.to_string()),
                );
            }
        }

        ValidationResult::accepted()
    }

    /// Calendar select-allow callback: selections starting on a holiday are refused.
    pub fn selection_allowed(&self, start: DateTime<Utc>, holidays: &HolidaySet) -> bool {
        !holidays.contains_date(self.local_date(start))
    }

    fn find_overlap<'a>(&self, proposed: &ProposedAppointment, existing: &'a [Appointment]) -> Option<&'a Appointment> {
        let professional_id = proposed.professional_id?;

        existing.iter().find(|appointment| {
            Some(appointment.id) != proposed.exclude_id
                && appointment.professional_id == Some(professional_id)
                && appointment.overlaps(proposed.start, proposed.end)
        })
    }
}

impl Default for AppointmentValidator {
    fn default() -> Self {
        Self::new(OverlapPolicy::Disabled, AppConfig::default().clinic_timezone())
    }
}
