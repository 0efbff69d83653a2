use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};

use crate::models::{
    Holiday, HolidayBackgroundEvent, HolidayError, HolidayProfile, HolidayRule, HolidaySet,
};

/// Earliest year the Gregorian computus applies to.
pub const FIRST_GREGORIAN_YEAR: i32 = 1583;
pub const LAST_SUPPORTED_YEAR: i32 = 9999;

/// Gregorian Easter Sunday (anonymous Gregorian / Meeus-Jones-Butcher).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

pub struct HolidayCalculator {
    profile: HolidayProfile,
}

impl HolidayCalculator {
    pub fn new(profile: HolidayProfile) -> Self {
        Self { profile }
    }

    /// Builds the calculator for a configured profile name.
    pub fn from_profile_name(name: &str) -> Result<Self, HolidayError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn profile(&self) -> &HolidayProfile {
        &self.profile
    }

    /// Observed holidays generated by `year`'s rules.
    ///
    /// Easter-relative dates keep their true calendar date even when the
    /// offset crosses into a neighbouring year.
    pub fn compute_holidays(&self, year: i32) -> Result<HolidaySet, HolidayError> {
        if !(FIRST_GREGORIAN_YEAR..=LAST_SUPPORTED_YEAR).contains(&year) {
            return Err(HolidayError::YearOutOfRange(year));
        }

        let easter = easter_sunday(year).ok_or(HolidayError::YearOutOfRange(year))?;
        let mut holidays = HolidaySet::new();

        for rule in &self.profile.rules {
            let date = match rule {
                HolidayRule::Fixed { month, day, .. } => NaiveDate::from_ymd_opt(year, *month, *day),
                HolidayRule::EasterRelative { offset_days, .. } => {
                    easter.checked_add_signed(Duration::days(*offset_days))
                }
            };

            match date {
                Some(date) => holidays.insert(Holiday { date, name: rule.name().to_string() }),
                // Feb 29 in a common year.
                None => debug!("Holiday '{}' does not occur in {}", rule.name(), year),
            }
        }

        Ok(holidays)
    }

    /// Holidays falling on a day of `[start, end]`.
    ///
    /// Neighbouring years are generated too, so an Easter offset that crosses
    /// a year boundary still lands in the view.
    pub fn holidays_for_view(&self, start: NaiveDate, end: NaiveDate) -> Result<HolidaySet, HolidayError> {
        if end < start {
            return Err(HolidayError::InvalidRange { start, end });
        }

        let spread = self.year_spread();
        let first = start.year().saturating_sub(spread).max(FIRST_GREGORIAN_YEAR.min(start.year()));
        let last = end.year().saturating_add(spread).min(LAST_SUPPORTED_YEAR.max(end.year()));

        let mut holidays = HolidaySet::new();
        for year in first..=last {
            let in_view = start.year() <= year && year <= end.year();
            match self.compute_holidays(year) {
                Ok(set) => holidays.extend(set),
                Err(e) if in_view => return Err(e),
                Err(_) => {}
            }
        }

        holidays.retain(|holiday| holiday.date >= start && holiday.date <= end);
        Ok(holidays)
    }

    /// How many years away from its rule year a generated date can land.
    fn year_spread(&self) -> i32 {
        self.profile
            .rules
            .iter()
            .filter_map(|rule| match rule {
                HolidayRule::EasterRelative { offset_days, .. } => Some(offset_days.unsigned_abs()),
                HolidayRule::Fixed { .. } => None,
            })
            .max()
            .map_or(0, |days| i32::try_from(days / 365 + 1).unwrap_or(LAST_SUPPORTED_YEAR))
    }

    /// Background events for the days of `[start, end]` that are holidays.
    pub fn background_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HolidayBackgroundEvent>, HolidayError> {
        let holidays = self.holidays_for_view(start, end)?;
        Ok(holidays.iter().map(HolidayBackgroundEvent::from).collect())
    }

    /// The holiday on `date`, if any. Years outside the supported range have none.
    pub fn holiday_on(&self, date: NaiveDate) -> Option<Holiday> {
        match self.holidays_for_view(date, date) {
            Ok(holidays) => holidays.holiday_on(date).cloned(),
            Err(e) => {
                warn!("Holiday lookup for {} skipped: {}", date, e);
                None
            }
        }
    }
}

impl Default for HolidayCalculator {
    fn default() -> Self {
        Self::new(HolidayProfile::brazil_national())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CARNIVAL, CORPUS_CHRISTI, EASTER, GOOD_FRIDAY};
    use assert_matches::assert_matches;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn easter_matches_reference_dates() {
        assert_eq!(easter_sunday(2024), Some(ymd(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(ymd(2025, 4, 20)));
        assert_eq!(easter_sunday(2019), Some(ymd(2019, 4, 21)));
        assert_eq!(easter_sunday(2000), Some(ymd(2000, 4, 23)));
        assert_eq!(easter_sunday(2038), Some(ymd(2038, 4, 25)));
        assert_eq!(easter_sunday(2285), Some(ymd(2285, 3, 22)));
    }

    #[test]
    fn holidays_2024_include_fixed_and_movable_entries() {
        let holidays = HolidayCalculator::default().compute_holidays(2024).unwrap();

        assert!(holidays.contains_date(ymd(2024, 1, 1)));
        assert_eq!(holidays.by_name(EASTER).unwrap().date, ymd(2024, 3, 31));
        assert_eq!(holidays.by_name(GOOD_FRIDAY).unwrap().date, ymd(2024, 3, 29));
        assert_eq!(holidays.by_name(CARNIVAL).unwrap().date, ymd(2024, 2, 13));
        assert_eq!(holidays.by_name(CORPUS_CHRISTI).unwrap().date, ymd(2024, 5, 30));
        assert_eq!(holidays.len(), 13);
    }

    #[test]
    fn coinciding_holidays_are_both_kept() {
        // Easter 2019 fell on Tiradentes.
        let holidays = HolidayCalculator::default().compute_holidays(2019).unwrap();
        let on_april_21 = holidays.iter().filter(|h| h.date == ymd(2019, 4, 21)).count();

        assert_eq!(on_april_21, 2);
        assert_eq!(holidays.len(), 13);
    }

    #[test]
    fn negative_offset_crossing_year_boundary_keeps_true_date() {
        let profile = HolidayProfile::new(
            "custom",
            vec![HolidayRule::easter_relative(-100, "Long Lead")],
        )
        .unwrap();
        let holidays = HolidayCalculator::new(profile).compute_holidays(2024).unwrap();

        // 2024-03-31 minus 100 days.
        assert_eq!(holidays.by_name("Long Lead").unwrap().date, ymd(2023, 12, 22));
    }

    #[test]
    fn leap_day_rule_skips_common_years() {
        let profile = HolidayProfile::new("custom", vec![HolidayRule::fixed(2, 29, "Leap")]).unwrap();
        let calculator = HolidayCalculator::new(profile);

        assert_eq!(calculator.compute_holidays(2024).unwrap().len(), 1);
        assert!(calculator.compute_holidays(2023).unwrap().is_empty());
    }

    #[test]
    fn extended_profile_adds_carnival_monday() {
        let holidays = HolidayCalculator::new(HolidayProfile::brazil_national_extended())
            .compute_holidays(2024)
            .unwrap();
        assert!(holidays.contains_date(ymd(2024, 2, 12)));
    }

    #[test]
    fn view_spanning_new_year_covers_both_years() {
        let calculator = HolidayCalculator::default();
        let holidays = calculator.holidays_for_view(ymd(2024, 12, 20), ymd(2025, 1, 4)).unwrap();
        assert!(holidays.contains_date(ymd(2024, 12, 25)));
        assert!(holidays.contains_date(ymd(2025, 1, 1)));
        assert_eq!(holidays.len(), 2);

        let events = calculator.background_events(ymd(2024, 12, 29), ymd(2025, 1, 4)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "h_2025-01-01");
    }

    #[test]
    fn lookups_see_offsets_from_the_following_year() {
        let profile = HolidayProfile::new(
            "custom",
            vec![HolidayRule::easter_relative(-100, "Long Lead")],
        )
        .unwrap();
        let calculator = HolidayCalculator::new(profile);

        assert_eq!(calculator.holiday_on(ymd(2023, 12, 22)).unwrap().name, "Long Lead");
        let events = calculator.background_events(ymd(2023, 12, 20), ymd(2023, 12, 25)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "h_2023-12-22");
    }

    #[test]
    fn lookups_see_offsets_from_the_previous_year() {
        // Easter 2024 is 2024-03-31; +300 days is 2025-01-25.
        let profile = HolidayProfile::new(
            "custom",
            vec![HolidayRule::easter_relative(300, "Late")],
        )
        .unwrap();
        let calculator = HolidayCalculator::new(profile);

        assert_eq!(calculator.holiday_on(ymd(2025, 1, 25)).unwrap().name, "Late");
        assert!(calculator.holiday_on(ymd(2024, 1, 25)).is_none());
    }

    #[test]
    fn boundary_years_do_not_need_unsupported_neighbours() {
        let calculator = HolidayCalculator::default();
        assert!(calculator.holiday_on(ymd(FIRST_GREGORIAN_YEAR, 1, 1)).is_some());
        assert!(calculator.holiday_on(ymd(LAST_SUPPORTED_YEAR, 12, 25)).is_some());
    }

    #[test]
    fn out_of_range_years_are_rejected() {
        let calculator = HolidayCalculator::default();
        assert_matches!(calculator.compute_holidays(1200), Err(HolidayError::YearOutOfRange(1200)));
        assert_eq!(calculator.holiday_on(ymd(1200, 1, 1)), None);
        assert_matches!(
            calculator.holidays_for_view(ymd(2024, 2, 1), ymd(2024, 1, 1)),
            Err(HolidayError::InvalidRange { .. })
        );
    }
}
