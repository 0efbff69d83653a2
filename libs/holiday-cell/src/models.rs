// libs/holiday-cell/src/models.rs
use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==============================================================================
// HOLIDAYS
// ==============================================================================

/// An observed closure day. Ordered by date, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HolidayRule {
    /// Same month/day every year.
    Fixed { month: u32, day: u32, name: String },
    /// Signed day offset from Gregorian Easter Sunday.
    EasterRelative { offset_days: i64, name: String },
}

impl HolidayRule {
    pub fn fixed(month: u32, day: u32, name: &str) -> Self {
        HolidayRule::Fixed { month, day, name: name.to_string() }
    }

    pub fn easter_relative(offset_days: i64, name: &str) -> Self {
        HolidayRule::EasterRelative { offset_days, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        match self {
            HolidayRule::Fixed { name, .. } | HolidayRule::EasterRelative { name, .. } => name,
        }
    }
}

pub const GOOD_FRIDAY: &str = "Sexta-feira Santa";
pub const EASTER: &str = "Páscoa";
pub const CORPUS_CHRISTI: &str = "Corpus Christi";
pub const CARNIVAL: &str = "Carnaval";
pub const CARNIVAL_MONDAY: &str = "Segunda de Carnaval";

/// The holiday table a clinic observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayProfile {
    pub name: String,
    pub rules: Vec<HolidayRule>,
}

impl HolidayProfile {
    /// Rejects fixed rules that name a day no year has (Feb 29 is allowed).
    pub fn new(name: &str, rules: Vec<HolidayRule>) -> Result<Self, HolidayError> {
        for rule in &rules {
            if let HolidayRule::Fixed { month, day, .. } = rule {
                if NaiveDate::from_ymd_opt(2000, *month, *day).is_none() {
                    return Err(HolidayError::InvalidFixedDate { month: *month, day: *day });
                }
            }
        }

        Ok(Self { name: name.to_string(), rules })
    }

    /// Brazilian national holidays, including Easter Sunday itself.
    pub fn brazil_national() -> Self {
        Self {
            name: "br_national".to_string(),
            rules: vec![
                HolidayRule::fixed(1, 1, "Confraternização Universal"),
                HolidayRule::fixed(4, 21, "Tiradentes"),
                HolidayRule::fixed(5, 1, "Dia do Trabalho"),
                HolidayRule::fixed(9, 7, "Independência do Brasil"),
                HolidayRule::fixed(10, 12, "Nossa Senhora Aparecida"),
                HolidayRule::fixed(11, 2, "Finados"),
                HolidayRule::fixed(11, 15, "Proclamação da República"),
                HolidayRule::fixed(11, 20, "Consciência Negra"),
                HolidayRule::fixed(12, 25, "Natal"),
                HolidayRule::easter_relative(-47, CARNIVAL),
                HolidayRule::easter_relative(-2, GOOD_FRIDAY),
                HolidayRule::easter_relative(0, EASTER),
                HolidayRule::easter_relative(60, CORPUS_CHRISTI),
            ],
        }
    }

    /// National table plus the Monday of Carnival.
    pub fn brazil_national_extended() -> Self {
        let mut profile = Self::brazil_national();
        profile.name = "br_national_extended".to_string();
        profile.rules.push(HolidayRule::easter_relative(-48, CARNIVAL_MONDAY));
        profile
    }
}

impl FromStr for HolidayProfile {
    type Err = HolidayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "br_national" | "" => Ok(Self::brazil_national()),
            "br_national_extended" => Ok(Self::brazil_national_extended()),
            other => Err(HolidayError::UnknownProfile(other.to_string())),
        }
    }
}

/// The holidays computed for one or more years.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidaySet(BTreeSet<Holiday>);

impl HolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, holiday: Holiday) {
        self.0.insert(holiday);
    }

    pub fn extend(&mut self, other: HolidaySet) {
        self.0.extend(other.0);
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.holiday_on(date).is_some()
    }

    /// First holiday (by name) falling on `date`.
    pub fn holiday_on(&self, date: NaiveDate) -> Option<&Holiday> {
        self.0.iter().find(|holiday| holiday.date == date)
    }

    pub fn by_name(&self, name: &str) -> Option<&Holiday> {
        self.0.iter().find(|holiday| holiday.name == name)
    }

    pub fn retain(&mut self, keep: impl FnMut(&Holiday) -> bool) {
        self.0.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holiday> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Holiday> for HolidaySet {
    fn from_iter<I: IntoIterator<Item = Holiday>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ==============================================================================
// CALENDAR FEED
// ==============================================================================

/// All-day background entry the calendar widget paints behind a closed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayBackgroundEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDate,
    pub all_day: bool,
    pub display: String,
    pub holiday_name: String,
}

impl From<&Holiday> for HolidayBackgroundEvent {
    fn from(holiday: &Holiday) -> Self {
        Self {
            id: format!("h_{}", holiday.date.format("%Y-%m-%d")),
            title: String::new(),
            start: holiday.date,
            all_day: true,
            display: "background".to_string(),
            holiday_name: holiday.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HolidayRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HolidayError {
    #[error("Unknown holiday profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid fixed holiday {month:02}-{day:02}")]
    InvalidFixedDate { month: u32, day: u32 },

    #[error("Year {0} is outside the supported Gregorian range")]
    YearOutOfRange(i32),

    #[error("Range end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}
