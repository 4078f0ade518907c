use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

use super::parse_iso_date;
use super::week::Week;
use crate::model::timesheet::TimesheetEntry;

/// Largest value accepted for a single day cell.
pub const MAX_DAY_HOURS: Decimal = Decimal::from_parts(24, 0, 0, false, 0);

/// Empty or non-numeric input reads as zero hours.
pub fn parse_hours(raw: &str) -> Decimal {
    Decimal::from_str(raw.trim()).unwrap_or(Decimal::ZERO)
}

/// Cells that parse as numbers but fall outside `0..=24`.
pub fn out_of_range_cells(entries: &[TimesheetEntry]) -> Vec<(String, String)> {
    entries
        .iter()
        .flat_map(|entry| entry.hours.iter())
        .filter(|(_, raw)| {
            Decimal::from_str(raw.trim())
                .map(|value| value < Decimal::ZERO || value > MAX_DAY_HOURS)
                .unwrap_or(false)
        })
        .map(|(day, raw)| (day.clone(), raw.clone()))
        .collect()
}

/// Sum of one entry across every key it carries.
pub fn row_total(entry: &TimesheetEntry) -> Decimal {
    entry.hours.values().map(|raw| parse_hours(raw)).sum()
}

/// Sum across entries for one date.
pub fn day_total(entries: &[TimesheetEntry], day: NaiveDate) -> Decimal {
    entries.iter().map(|entry| hours_on(entry, day)).sum()
}

fn hours_on(entry: &TimesheetEntry, day: NaiveDate) -> Decimal {
    entry
        .hours
        .iter()
        .filter(|(key, _)| parse_iso_date(key).ok() == Some(day))
        .map(|(_, raw)| parse_hours(raw))
        .sum()
}

/// Totals for the printable week grid.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekTotals {
    /// One per entry, same order.
    #[schema(value_type = Vec<String>)]
    pub rows: Vec<Decimal>,
    /// Monday..Sunday column totals.
    #[schema(value_type = Vec<String>)]
    pub days: Vec<Decimal>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

impl WeekTotals {
    pub fn compute(entries: &[TimesheetEntry], week: &Week) -> Self {
        let dates = week.dates();
        let rows: Vec<Decimal> = entries.iter().map(row_total).collect();
        let days: Vec<Decimal> = dates.iter().map(|day| day_total(entries, *day)).collect();
        let total = rows.iter().copied().sum();

        Self { rows, days, total }
    }
}

#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayPeriod {
    Weekly,
    #[default]
    Monthly,
}

impl PayPeriod {
    /// First day of the bucket `day` falls in.
    pub fn bucket_start(&self, day: NaiveDate) -> NaiveDate {
        match self {
            PayPeriod::Weekly => Week::containing(day).map(|week| week.start()).unwrap_or(day),
            PayPeriod::Monthly => day.with_day(1).unwrap_or(day),
        }
    }

    pub fn bucket_end(&self, start: NaiveDate) -> NaiveDate {
        match self {
            PayPeriod::Weekly => Week::containing(start).map(|week| week.end()).unwrap_or(start),
            PayPeriod::Monthly => start
                .checked_add_months(Months::new(1))
                .and_then(|next| next.checked_sub_days(Days::new(1)))
                .unwrap_or(start),
        }
    }
}

/// Hours per bucket for every hour key whose date falls in `year`.
/// Keys that are not dates are skipped.
pub fn bucket_hours<'a>(
    entries: impl IntoIterator<Item = &'a TimesheetEntry>,
    year: i32,
    period: PayPeriod,
) -> BTreeMap<NaiveDate, Decimal> {
    let mut buckets = BTreeMap::new();
    for entry in entries {
        for (key, raw) in &entry.hours {
            let Ok(day) = parse_iso_date(key) else {
                continue;
            };
            if day.year() != year {
                continue;
            }
            *buckets.entry(period.bucket_start(day)).or_insert(Decimal::ZERO) += parse_hours(raw);
        }
    }
    buckets
}

/// Hours keyed on dates inside `[from, to]`.
pub fn hours_between<'a>(
    entries: impl IntoIterator<Item = &'a TimesheetEntry>,
    from: NaiveDate,
    to: NaiveDate,
) -> Decimal {
    entries
        .into_iter()
        .flat_map(|entry| entry.hours.iter())
        .filter_map(|(key, raw)| parse_iso_date(key).ok().map(|day| (day, raw)))
        .filter(|(day, _)| *day >= from && *day <= to)
        .map(|(_, raw)| parse_hours(raw))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(cells: &[(&str, &str)]) -> TimesheetEntry {
        TimesheetEntry {
            id: String::new(),
            client: "Acme".to_string(),
            project: "Site".to_string(),
            subject: "Dev".to_string(),
            hours: cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn malformed_hours_read_as_zero() {
        assert_eq!(parse_hours(""), Decimal::ZERO);
        assert_eq!(parse_hours("abc"), Decimal::ZERO);
        assert_eq!(parse_hours(" 7.5 "), dec!(7.5));
        assert_eq!(parse_hours("8"), dec!(8));
    }

    #[test]
    fn row_and_day_totals() {
        let entries = vec![
            entry(&[("2025-01-06", "7.5"), ("2025-01-07", "x"), ("2025-01-08", "")]),
            entry(&[("2025-01-06", "0.5"), ("2025-01-07", "8")]),
        ];
        assert_eq!(row_total(&entries[0]), dec!(7.5));
        assert_eq!(row_total(&entries[1]), dec!(8.5));
        assert_eq!(day_total(&entries, date(2025, 1, 6)), dec!(8));
        assert_eq!(day_total(&entries, date(2025, 1, 7)), dec!(8));
        assert_eq!(day_total(&entries, date(2025, 1, 9)), Decimal::ZERO);
    }

    #[test]
    fn week_totals_are_additive() {
        let entries = vec![
            entry(&[("2025-01-06", "7.5"), ("2025-01-10", "4"), ("2025-01-12", "1.5")]),
            entry(&[("2025-01-07", "8"), ("2025-01-08", "junk"), ("2025-01-09", "6.5")]),
            entry(&[]),
        ];
        let totals = WeekTotals::compute(&entries, &Week::containing(date(2025, 1, 8)).unwrap());

        let row_sum: Decimal = totals.rows.iter().copied().sum();
        let day_sum: Decimal = totals.days.iter().copied().sum();
        assert_eq!(totals.total, dec!(27.5));
        assert_eq!(row_sum, totals.total);
        assert_eq!(day_sum, totals.total);
        assert_eq!(totals.rows, vec![dec!(13), dec!(14.5), Decimal::ZERO]);
        assert_eq!(totals.days.len(), 7);
    }

    #[test]
    fn day_columns_only_cover_the_week() {
        let entries = vec![entry(&[("2025-01-05", "8"), ("2025-01-06", "2")])];
        let totals = WeekTotals::compute(&entries, &Week::containing(date(2025, 1, 6)).unwrap());
        assert_eq!(totals.total, dec!(10));
        assert_eq!(totals.days.iter().copied().sum::<Decimal>(), dec!(2));
    }

    #[test]
    fn out_of_range_cells_are_reported() {
        let entries = vec![entry(&[("2025-01-06", "25"), ("2025-01-07", "-1"), ("2025-01-08", "oops"), ("2025-01-09", "24")])];
        let bad = out_of_range_cells(&entries);
        assert_eq!(bad.len(), 2);
        assert!(bad.contains(&("2025-01-06".to_string(), "25".to_string())));
    }

    #[test]
    fn monthly_buckets_filter_by_year() {
        let entries = vec![
            entry(&[("2024-12-31", "8"), ("2025-01-02", "7"), ("2025-01-31", "1")]),
            entry(&[("2025-02-03", "6"), ("bad", "9")]),
        ];
        let buckets = bucket_hours(&entries, 2025, PayPeriod::Monthly);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&date(2025, 1, 1)], dec!(8));
        assert_eq!(buckets[&date(2025, 2, 1)], dec!(6));
    }

    #[test]
    fn weekly_buckets_key_on_monday() {
        let entries = vec![entry(&[("2025-01-01", "8"), ("2025-01-05", "2"), ("2025-01-06", "3")])];
        let buckets = bucket_hours(&entries, 2025, PayPeriod::Weekly);
        assert_eq!(buckets[&date(2024, 12, 30)], dec!(10));
        assert_eq!(buckets[&date(2025, 1, 6)], dec!(3));
    }

    #[test]
    fn bucket_ends() {
        assert_eq!(PayPeriod::Monthly.bucket_end(date(2024, 2, 1)), date(2024, 2, 29));
        assert_eq!(PayPeriod::Weekly.bucket_end(date(2025, 1, 6)), date(2025, 1, 12));
    }

    #[test]
    fn hours_between_is_inclusive() {
        let entries = vec![entry(&[("2024-04-01", "8"), ("2025-03-31", "4"), ("2025-04-01", "2")])];
        assert_eq!(hours_between(&entries, date(2024, 4, 1), date(2025, 3, 31)), dec!(12));
    }
}
