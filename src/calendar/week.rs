use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use super::{CalendarError, check_supported, parse_iso_date};
use super::working_days::{HolidayCalendar, is_weekend};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::timesheet::{DayStatus, HasEntries};

/// Monday-to-Sunday window. The only week convention in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    start: NaiveDate,
}

/// `start` always lies in a supported year, so the day arithmetic below
/// stays far from chrono's limits.
impl Week {
    pub fn containing(date: NaiveDate) -> Result<Self, CalendarError> {
        let offset = u64::from(date.weekday().num_days_from_monday());
        let start = check_supported(date)?
            .checked_sub_days(Days::new(offset))
            .ok_or(CalendarError::OutOfRange(date))?;
        Ok(Self { start })
    }

    /// For keys that must already be a Monday (stored `weekStartDate`).
    pub fn starting(monday: NaiveDate) -> Result<Self, CalendarError> {
        let week = Self::containing(monday)?;
        if week.start != monday {
            return Err(CalendarError::NotAMonday(monday));
        }
        Ok(week)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.start + Days::new(6)
    }

    pub fn dates(&self) -> [NaiveDate; 7] {
        std::array::from_fn(|i| self.start + Days::new(i as u64))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end()).contains(&date)
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.start + Days::new(7),
        }
    }

    /// Weekdays `working`, weekend `not-working`.
    pub fn default_day_status(&self) -> BTreeMap<NaiveDate, DayStatus> {
        self.dates()
            .into_iter()
            .map(|day| {
                let status = if is_weekend(day) {
                    DayStatus::NotWorking
                } else {
                    DayStatus::Working
                };
                (day, status)
            })
            .collect()
    }

    /// Defaults overlaid with bank holidays and approved leave.
    pub fn day_status(
        &self,
        holidays: &HolidayCalendar,
        leaves: &[LeaveRequest],
    ) -> BTreeMap<NaiveDate, DayStatus> {
        let mut status = self.default_day_status();

        for (day, slot) in status.iter_mut() {
            if is_weekend(*day) {
                continue;
            }
            if holidays.is_holiday(*day) {
                *slot = DayStatus::BankHoliday;
            }
        }

        for leave in leaves.iter().filter(|l| l.status == LeaveStatus::Approved) {
            let Some(marker) = leave_marker(leave.leave_type) else {
                continue;
            };
            for (day, slot) in status.iter_mut() {
                if is_weekend(*day) || *day < leave.from || *day > leave.to {
                    continue;
                }
                if *slot == DayStatus::Working {
                    *slot = marker;
                }
            }
        }

        status
    }
}

fn leave_marker(leave_type: LeaveType) -> Option<DayStatus> {
    match leave_type {
        LeaveType::SickLeave => Some(DayStatus::Sick),
        LeaveType::BankHoliday => Some(DayStatus::BankHoliday),
        LeaveType::Holiday | LeaveType::CasualLeave | LeaveType::HalfDay => Some(DayStatus::Holiday),
        LeaveType::WorkFromHome => None,
    }
}

/// First record, in the given order, with an hour key inside `week`.
///
/// Two records whose keys overlap the same week both qualify; the earlier
/// one wins. Lookups by `(username, weekStartDate)` should be tried first.
pub fn find_for_week<'a, R: HasEntries>(records: &'a [R], week: &Week) -> Option<&'a R> {
    records.iter().find(|record| {
        record
            .entries()
            .iter()
            .flat_map(|entry| entry.hours.keys())
            .filter_map(|key| parse_iso_date(key).ok())
            .any(|day| week.contains(day))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::timesheet::{TimesheetDraft, TimesheetEntry};
    use chrono::{Utc, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(keys: &[&str]) -> TimesheetDraft {
        TimesheetDraft {
            username: "jdoe".to_string(),
            week_start_date: date(2025, 1, 6),
            entries: vec![TimesheetEntry {
                id: "row".to_string(),
                client: "Acme".to_string(),
                project: "Site".to_string(),
                subject: "Dev".to_string(),
                hours: keys.iter().map(|k| (k.to_string(), "1".to_string())).collect(),
            }],
            work_description: String::new(),
            updated_at: Utc::now(),
        }
    }

    fn leave(leave_type: LeaveType, from: NaiveDate, to: NaiveDate, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            username: "jdoe".to_string(),
            email: "jdoe@company.com".to_string(),
            leave_type,
            from,
            to,
            reason: "test".to_string(),
            working_days: 1,
            status,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn every_day_of_a_year_maps_into_a_monday_week() {
        for day in date(2024, 1, 1).iter_days().take(366) {
            let week = Week::containing(day).unwrap();
            assert_eq!(week.start().weekday(), Weekday::Mon);
            assert_eq!(week.end().weekday(), Weekday::Sun);
            assert!(week.contains(day));
            assert_eq!(week.dates()[0], week.start());
            assert_eq!(week.dates()[6], week.end());
        }
    }

    #[test]
    fn sunday_belongs_to_the_previous_monday() {
        let week = Week::containing(date(2025, 1, 12)).unwrap();
        assert_eq!(week.start(), date(2025, 1, 6));
    }

    #[test]
    fn week_crosses_year_boundary() {
        let week = Week::containing(date(2025, 1, 1)).unwrap();
        assert_eq!(week.start(), date(2024, 12, 30));
        assert_eq!(week.end(), date(2025, 1, 5));
        assert_eq!(week.next().start(), date(2025, 1, 6));
    }

    #[test]
    fn starting_requires_a_monday() {
        assert!(Week::starting(date(2025, 1, 6)).is_ok());
        assert_eq!(
            Week::starting(date(2025, 1, 7)),
            Err(CalendarError::NotAMonday(date(2025, 1, 7)))
        );
    }

    #[test]
    fn dates_outside_supported_years_have_no_week() {
        assert_eq!(
            Week::containing(NaiveDate::MAX),
            Err(CalendarError::OutOfRange(NaiveDate::MAX))
        );
        assert_eq!(
            Week::containing(NaiveDate::MIN),
            Err(CalendarError::OutOfRange(NaiveDate::MIN))
        );

        let last = Week::containing(date(9999, 12, 31)).unwrap();
        assert_eq!(last.start(), date(9999, 12, 27));
        assert_eq!(last.end(), date(10000, 1, 2));

        let first = Week::containing(date(1, 1, 1)).unwrap();
        assert_eq!(first.start(), date(1, 1, 1));
    }

    #[test]
    fn default_status_splits_weekdays_and_weekend() {
        let status = Week::containing(date(2025, 1, 8)).unwrap().default_day_status();
        assert_eq!(status.len(), 7);
        assert_eq!(status[&date(2025, 1, 6)], DayStatus::Working);
        assert_eq!(status[&date(2025, 1, 10)], DayStatus::Working);
        assert_eq!(status[&date(2025, 1, 11)], DayStatus::NotWorking);
        assert_eq!(status[&date(2025, 1, 12)], DayStatus::NotWorking);
    }

    #[test]
    fn day_status_overlays_holidays_and_approved_leave() {
        let week = Week::containing(date(2024, 12, 23)).unwrap();
        let holidays = HolidayCalendar::new([date(2024, 12, 25), date(2024, 12, 26)]);
        let leaves = vec![
            leave(LeaveType::SickLeave, date(2024, 12, 23), date(2024, 12, 23), LeaveStatus::Approved),
            leave(LeaveType::Holiday, date(2024, 12, 24), date(2024, 12, 29), LeaveStatus::Approved),
            leave(LeaveType::SickLeave, date(2024, 12, 27), date(2024, 12, 27), LeaveStatus::Pending),
        ];

        let status = week.day_status(&holidays, &leaves);
        assert_eq!(status[&date(2024, 12, 23)], DayStatus::Sick);
        assert_eq!(status[&date(2024, 12, 24)], DayStatus::Holiday);
        assert_eq!(status[&date(2024, 12, 25)], DayStatus::BankHoliday);
        assert_eq!(status[&date(2024, 12, 26)], DayStatus::BankHoliday);
        assert_eq!(status[&date(2024, 12, 27)], DayStatus::Holiday);
        assert_eq!(status[&date(2024, 12, 28)], DayStatus::NotWorking);
    }

    #[test]
    fn work_from_home_stays_working() {
        let week = Week::containing(date(2025, 1, 6)).unwrap();
        let leaves = vec![leave(
            LeaveType::WorkFromHome,
            date(2025, 1, 6),
            date(2025, 1, 7),
            LeaveStatus::Approved,
        )];
        let status = week.day_status(&HolidayCalendar::default(), &leaves);
        assert_eq!(status[&date(2025, 1, 6)], DayStatus::Working);
    }

    #[test]
    fn containment_match_takes_the_first_record() {
        let week = Week::containing(date(2025, 1, 8)).unwrap();
        let records = vec![
            draft(&["2024-12-31"]),
            draft(&["not-a-date", "2025-01-09"]),
            draft(&["2025-01-06"]),
        ];
        let found = find_for_week(&records, &week).unwrap();
        assert!(found.entries[0].hours.contains_key("2025-01-09"));
    }

    #[test]
    fn containment_match_can_miss() {
        let week = Week::containing(date(2025, 2, 3)).unwrap();
        let records = vec![draft(&["2025-01-06"])];
        assert!(find_for_week(&records, &week).is_none());
    }
}
