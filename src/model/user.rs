use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "username": "jdoe",
    "name": "Jane Doe",
    "email": "jdoe@company.com",
    "role": "user",
    "designation": "Developer",
    "active": true,
    "hourlyRate": "25.00",
    "allocatedHours": "1500",
    "remainingHours": "1420.5",
    "allocationYear": 2024
}))]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub designation: String,
    pub active: bool,
    #[schema(value_type = String)]
    pub hourly_rate: Decimal,
    /// Hours budget for the financial year starting in `allocation_year`.
    #[schema(value_type = String)]
    pub allocated_hours: Decimal,
    #[schema(value_type = String)]
    pub remaining_hours: Decimal,
    pub allocation_year: i32,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// Password hash kept apart from [`User`] so it never reaches a response.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub designation: String,
    pub hourly_rate: Decimal,
    pub allocated_hours: Decimal,
    pub allocation_year: i32,
}

/// Partial update; `None` leaves the column alone.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub designation: Option<String>,
    pub active: Option<bool>,
    pub hourly_rate: Option<Decimal>,
    /// Resets the allocation: remaining hours start again from this budget.
    pub allocation: Option<(Decimal, i32)>,
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub search: Option<String>,
}
