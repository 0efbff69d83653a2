pub mod calendar;
pub mod store;

pub use calendar::{build_calendar_events, resolve_professional_filter};
pub use store::SchedulingStore;
