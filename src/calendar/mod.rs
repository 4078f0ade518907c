//! Date accounting shared by every handler: working days, Monday-start
//! weeks, hours totals, leave policy and financial years.
//!
//! Everything in here is pure. Handlers resolve bank holidays and stored
//! records first and pass them in.

pub mod financial_year;
pub mod hours;
pub mod policy;
pub mod week;
pub mod working_days;

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

pub use financial_year::FinancialYear;
pub use hours::{PayPeriod, WeekTotals};
pub use policy::LeaveSummary;
pub use week::Week;
pub use working_days::{HolidayCalendar, count_working_days};

/// Wire format for every date key (`YYYY-MM-DD`).
pub const ISO_DATE: &str = "%Y-%m-%d";

/// Years a four-digit `YYYY` can name. Dates outside are refused before
/// any week arithmetic.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

/// Longest `[from, to]` span, counted inclusively, one request may cover.
pub const MAX_RANGE_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("end date {end} is before start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("'{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),

    #[error("week start {0} is not a Monday")]
    NotAMonday(NaiveDate),

    #[error("{0} is outside the supported years 0001-9999")]
    OutOfRange(NaiveDate),

    #[error("range covers {days} days, at most {max} are allowed")]
    RangeTooLong { days: i64, max: i64 },
}

pub fn check_supported(date: NaiveDate) -> Result<NaiveDate, CalendarError> {
    if SUPPORTED_YEARS.contains(&date.year()) {
        Ok(date)
    } else {
        Err(CalendarError::OutOfRange(date))
    }
}

/// Both ends supported, `end >= start`, and no longer than [`MAX_RANGE_DAYS`].
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), CalendarError> {
    check_supported(start)?;
    check_supported(end)?;
    if end < start {
        return Err(CalendarError::InvalidRange { start, end });
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(CalendarError::RangeTooLong {
            days,
            max: MAX_RANGE_DAYS,
        });
    }
    Ok(())
}

/// Strict parse, used for request parameters.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(raw.trim(), ISO_DATE)
        .ok()
        .filter(|date| SUPPORTED_YEARS.contains(&date.year()))
        .ok_or_else(|| CalendarError::InvalidDate(raw.to_string()))
}
