use chrono::{Datelike, NaiveDate};

/// First month of the financial year (April).
const START_MONTH: u32 = 4;

/// April-to-March year, named by the calendar year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FinancialYear {
    start_year: i32,
}

impl FinancialYear {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn containing(date: NaiveDate) -> Self {
        let start_year = if date.month() >= START_MONTH {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, START_MONTH, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn end(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year + 1, START_MONTH, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.start_year, self.start_year + 1)
    }
}
