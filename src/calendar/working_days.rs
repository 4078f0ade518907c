use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};

use super::CalendarError;
use crate::model::bank_holiday::BankHoliday;

/// Set of non-working dates on top of weekends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn from_bank_holidays<'a>(holidays: impl IntoIterator<Item = &'a BankHoliday>) -> Self {
        Self::new(holidays.into_iter().map(|h| h.date))
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn extend(&mut self, other: &HolidayCalendar) {
        self.dates.extend(other.dates.iter().copied());
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_working_day(date: NaiveDate, holidays: &HolidayCalendar) -> bool {
    !is_weekend(date) && !holidays.is_holiday(date)
}

/// Counts days in `[start, end]` that are neither weekend nor bank holiday.
/// `end` defaults to `start`.
pub fn count_working_days(
    start: NaiveDate,
    end: Option<NaiveDate>,
    holidays: &HolidayCalendar,
) -> Result<u32, CalendarError> {
    let end = end.unwrap_or(start);
    if end < start {
        return Err(CalendarError::InvalidRange { start, end });
    }

    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_working_day(*day, holidays))
        .count() as u32)
}
