use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "title": "Christmas Day",
    "date": "2024-12-25",
    "notes": "",
    "bunting": true
}))]
pub struct BankHoliday {
    pub title: String,
    #[schema(example = "2024-12-25", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub bunting: bool,
}

/// One region of the public holiday feed.
#[derive(Debug, Clone, Deserialize)]
pub struct HolidayDivision {
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub events: Vec<BankHoliday>,
}

/// Whole feed document, keyed by region (`england-and-wales`, `scotland`, ...).
pub type HolidayFeedDocument = HashMap<String, HolidayDivision>;
