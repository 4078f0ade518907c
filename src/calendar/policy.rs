//! Per-category leave rules, kept in one table.
//!
//! | type           | day count   | days-off rollup |
//! |----------------|-------------|-----------------|
//! | holiday        | calculated  | counted         |
//! | sick_leave     | calculated  | counted         |
//! | half_day       | calculated  | flat 0.5        |
//! | work_from_home | calculated  | excluded        |
//! | bank_holiday   | fixed 1     | excluded        |
//! | casual_leave   | calculated  | counted         |

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use strum::IntoEnumIterator;
use utoipa::ToSchema;

use super::CalendarError;
use super::working_days::{HolidayCalendar, count_working_days};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCount {
    /// Weekdays in the range that are not bank holidays.
    Calculated,
    /// Reported as this many days whatever the range.
    Fixed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    Counted,
    Flat(Decimal),
    Excluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeavePolicy {
    pub day_count: DayCount,
    pub rollup: Rollup,
}

impl LeaveType {
    pub fn policy(self) -> LeavePolicy {
        let (day_count, rollup) = match self {
            LeaveType::Holiday => (DayCount::Calculated, Rollup::Counted),
            LeaveType::SickLeave => (DayCount::Calculated, Rollup::Counted),
            LeaveType::HalfDay => (DayCount::Calculated, Rollup::Flat(dec!(0.5))),
            LeaveType::WorkFromHome => (DayCount::Calculated, Rollup::Excluded),
            LeaveType::BankHoliday => (DayCount::Fixed(1), Rollup::Excluded),
            LeaveType::CasualLeave => (DayCount::Calculated, Rollup::Counted),
        };
        LeavePolicy { day_count, rollup }
    }

    /// Working days a request of this type is worth. The range is validated
    /// even when the count is fixed.
    pub fn working_days(
        self,
        from: NaiveDate,
        to: NaiveDate,
        holidays: &HolidayCalendar,
    ) -> Result<u32, CalendarError> {
        if to < from {
            return Err(CalendarError::InvalidRange { start: from, end: to });
        }
        match self.policy().day_count {
            DayCount::Fixed(days) => Ok(days),
            DayCount::Calculated => count_working_days(from, Some(to), holidays),
        }
    }

    /// Contribution of `working_days` of this type to a days-off total.
    /// A flat rollup needs at least one working day to apply.
    pub fn days_off(self, working_days: u32) -> Decimal {
        match self.policy().rollup {
            Rollup::Counted => Decimal::from(working_days),
            Rollup::Flat(_) if working_days == 0 => Decimal::ZERO,
            Rollup::Flat(value) => value,
            Rollup::Excluded => Decimal::ZERO,
        }
    }
}

/// Annual view of one person's leave.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveSummary {
    pub year: i32,
    /// Approved days off after the per-type rollup rules.
    #[schema(value_type = String)]
    pub days_off: Decimal,
    /// Approved working days per type, before rollup rules.
    #[schema(value_type = Object)]
    pub approved_days_by_type: BTreeMap<LeaveType, u32>,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl LeaveSummary {
    /// Requests are bucketed by the year of their `from` date.
    pub fn for_year(requests: &[LeaveRequest], year: i32) -> Self {
        let mut summary = Self {
            year,
            days_off: Decimal::ZERO,
            approved_days_by_type: LeaveType::iter().map(|t| (t, 0)).collect(),
            pending: 0,
            approved: 0,
            rejected: 0,
        };

        for request in requests.iter().filter(|r| r.from.year() == year) {
            match request.status {
                LeaveStatus::Pending => summary.pending += 1,
                LeaveStatus::Rejected => summary.rejected += 1,
                LeaveStatus::Approved => {
                    summary.approved += 1;
                    summary.days_off += request.leave_type.days_off(request.working_days);
                    *summary
                        .approved_days_by_type
                        .entry(request.leave_type)
                        .or_insert(0) += request.working_days;
                }
            }
        }

        summary
    }
}
