use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    #[serde(alias = "Holiday")]
    Holiday,
    #[serde(alias = "Sick Leave")]
    SickLeave,
    #[serde(alias = "Half Day")]
    HalfDay,
    #[serde(alias = "Work From Home")]
    WorkFromHome,
    #[serde(alias = "Bank Holiday")]
    BankHoliday,
    #[serde(alias = "Casual Leave")]
    CasualLeave,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "username": "jdoe",
    "email": "jdoe@company.com",
    "leaveType": "sick_leave",
    "from": "2025-01-06",
    "to": "2025-01-08",
    "reason": "Flu",
    "workingDays": 3,
    "status": "pending",
    "rejectionReason": null,
    "createdAt": "2025-01-05T09:00:00Z",
    "updatedAt": "2025-01-05T09:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub leave_type: LeaveType,
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub from: NaiveDate,
    #[schema(example = "2025-01-08", format = "date", value_type = String)]
    pub to: NaiveDate,
    pub reason: String,
    /// Recomputed on creation from the range and the bank-holiday calendar.
    pub working_days: u32,
    pub status: LeaveStatus,
    pub rejection_reason: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

/// Validated leave ready to be stored.
#[derive(Debug, Clone)]
pub struct NewLeave {
    pub username: String,
    pub email: String,
    pub leave_type: LeaveType,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub reason: String,
    pub working_days: u32,
}

/// Outcome of an admin review.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl LeaveDecision {
    pub fn status(&self) -> LeaveStatus {
        match self {
            LeaveDecision::Approve => LeaveStatus::Approved,
            LeaveDecision::Reject { .. } => LeaveStatus::Rejected,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            LeaveDecision::Approve => None,
            LeaveDecision::Reject { reason } => reason.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeaveQuery {
    pub username: Option<String>,
    pub status: Option<LeaveStatus>,
    pub leave_type: Option<LeaveType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn leave_type_accepts_display_names() {
        let parsed: LeaveType = serde_json::from_str("\"Sick Leave\"").unwrap();
        assert_eq!(parsed, LeaveType::SickLeave);
        let parsed: LeaveType = serde_json::from_str("\"work_from_home\"").unwrap();
        assert_eq!(parsed, LeaveType::WorkFromHome);
        assert_eq!(serde_json::to_string(&LeaveType::HalfDay).unwrap(), "\"half_day\"");
    }

    #[test]
    fn stored_strings_match_wire_names() {
        assert_eq!(LeaveType::BankHoliday.as_ref(), "bank_holiday");
        assert_eq!(LeaveType::from_str("casual_leave").unwrap(), LeaveType::CasualLeave);
        assert_eq!(LeaveStatus::from_str("rejected").unwrap(), LeaveStatus::Rejected);
    }
}
