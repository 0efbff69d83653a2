pub mod calculator;

pub use calculator::{easter_sunday, HolidayCalculator};
