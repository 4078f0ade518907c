use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::calendar::PayPeriod;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayPeriodLine {
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub period_start: NaiveDate,
    #[schema(example = "2025-01-12", format = "date", value_type = String)]
    pub period_end: NaiveDate,
    #[schema(value_type = String)]
    pub hours: Decimal,
    #[schema(value_type = String)]
    pub pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    pub username: String,
    pub year: i32,
    pub period: PayPeriod,
    #[schema(value_type = String)]
    pub hourly_rate: Decimal,
    pub lines: Vec<PayPeriodLine>,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
    #[schema(value_type = String)]
    pub total_pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoursBudget {
    pub username: String,
    #[schema(example = "2024-2025")]
    pub financial_year: String,
    #[schema(value_type = String)]
    pub allocated_hours: Decimal,
    /// Running counter, decremented as timesheets are approved.
    #[schema(value_type = String)]
    pub remaining_hours: Decimal,
    /// Approved hours inside the financial year, recomputed from timesheets.
    #[schema(value_type = String)]
    pub logged_hours: Decimal,
}
