use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// One (client, project, subject) row of a week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "row-1",
    "client": "Acme",
    "project": "Website",
    "subject": "Development",
    "hours": { "2025-01-06": "7.5", "2025-01-07": "8" }
}))]
pub struct TimesheetEntry {
    #[serde(default)]
    pub id: String,
    pub client: String,
    pub project: String,
    pub subject: String,
    /// ISO date -> decimal hours as typed by the user.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub hours: BTreeMap<String, String>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DayStatus {
    Working,
    NotWorking,
    Holiday,
    Sick,
    BankHoliday,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
    Unapproved,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: u64,
    pub username: String,
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    pub entries: Vec<TimesheetEntry>,
    pub work_description: String,
    #[schema(value_type = Object)]
    pub day_status: BTreeMap<NaiveDate, DayStatus>,
    pub status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    /// Bumped on every write; updates must echo the value they read.
    pub version: i64,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTimesheet {
    pub username: String,
    pub week_start_date: NaiveDate,
    pub entries: Vec<TimesheetEntry>,
    pub work_description: String,
    pub day_status: BTreeMap<NaiveDate, DayStatus>,
}

/// Fields a user may change on an existing timesheet.
#[derive(Debug, Clone)]
pub struct TimesheetChanges {
    pub entries: Vec<TimesheetEntry>,
    pub work_description: String,
    pub day_status: BTreeMap<NaiveDate, DayStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimesheetDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl TimesheetDecision {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            TimesheetDecision::Approve => ApprovalStatus::Approved,
            TimesheetDecision::Reject { .. } => ApprovalStatus::Rejected,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            TimesheetDecision::Approve => None,
            TimesheetDecision::Reject { reason } => reason.as_deref(),
        }
    }
}

/// Provisional rows saved before a timesheet is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetDraft {
    pub username: String,
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    pub entries: Vec<TimesheetEntry>,
    #[serde(default)]
    pub work_description: String,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

/// Anything holding timesheet rows, for week containment matching.
pub trait HasEntries {
    fn entries(&self) -> &[TimesheetEntry];
}

impl HasEntries for Timesheet {
    fn entries(&self) -> &[TimesheetEntry] {
        &self.entries
    }
}

impl HasEntries for TimesheetDraft {
    fn entries(&self) -> &[TimesheetEntry] {
        &self.entries
    }
}
