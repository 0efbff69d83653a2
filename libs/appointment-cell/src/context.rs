use holiday_cell::HolidayCalculator;
use scheduling_cell::SchedulingContext;

use crate::services::validator::AppointmentValidator;

/// Scheduling state plus the configured holiday table and validator.
pub trait BookingContext: SchedulingContext {
    fn holidays(&self) -> &HolidayCalculator;

    fn validator(&self) -> &AppointmentValidator;
}
