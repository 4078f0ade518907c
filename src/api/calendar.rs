use std::collections::BTreeMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::calendar::{HolidayCalendar, Week, check_range, count_working_days};
use crate::error::{AppError, ErrorBody};
use crate::holidays::HolidayService;
use crate::model::bank_holiday::BankHoliday;
use crate::model::leave_request::LeaveType;
use crate::model::timesheet::DayStatus;
use crate::store::Store;

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WorkingDaysQuery {
    #[param(value_type = String, format = "date", example = "2024-12-23")]
    pub from: NaiveDate,
    /// Defaults to `from`
    #[param(value_type = Option<String>, format = "date", example = "2024-12-29")]
    pub to: Option<NaiveDate>,
    /// Applies the per-type rules; plain weekday count when omitted
    #[param(value_type = Option<String>, example = "half_day")]
    pub leave_type: Option<LeaveType>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "from": "2024-12-23",
    "to": "2024-12-29",
    "leaveType": null,
    "workingDays": 3,
    "daysOff": "3",
    "holidays": [
        { "title": "Christmas Day", "date": "2024-12-25", "notes": "", "bunting": true },
        { "title": "Boxing Day", "date": "2024-12-26", "notes": "", "bunting": true }
    ]
}))]
pub struct WorkingDaysResponse {
    #[schema(format = "date", value_type = String)]
    pub from: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub to: NaiveDate,
    pub leave_type: Option<LeaveType>,
    pub working_days: u32,
    /// What the range adds to the annual days-off total.
    #[schema(value_type = String)]
    pub days_off: Decimal,
    /// Bank holidays inside the range.
    pub holidays: Vec<BankHoliday>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeekQuery {
    /// Any day of the week; defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekResponse {
    #[schema(format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub week_end_date: NaiveDate,
    #[schema(value_type = Vec<String>)]
    pub dates: Vec<NaiveDate>,
    /// Weekends, bank holidays and the caller's approved leave.
    #[schema(value_type = Object)]
    pub day_status: BTreeMap<NaiveDate, DayStatus>,
}

/// Working days in a range
#[utoipa::path(
    get,
    path = "/api/calendar/working-days",
    params(WorkingDaysQuery),
    responses(
        (status = 200, description = "Working-day count for the range", body = WorkingDaysResponse),
        (status = 400, description = "`to` is before `from`, or the range is longer than a year", body = ErrorBody),
        (status = 502, description = "Bank holiday feed unavailable", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Calendar"
)]
pub async fn working_days(
    _auth: AuthUser,
    holidays: web::Data<HolidayService>,
    query: web::Query<WorkingDaysQuery>,
) -> Result<impl Responder, AppError> {
    let from = query.from;
    let to = query.to.unwrap_or(from);
    check_range(from, to)?;

    let in_range = holidays.holidays_between(from, to).await?;
    let calendar = HolidayCalendar::from_bank_holidays(in_range.iter());
    let (working_days, days_off) = match query.leave_type {
        Some(leave_type) => {
            let days = leave_type.working_days(from, to, &calendar)?;
            (days, leave_type.days_off(days))
        }
        None => {
            let days = count_working_days(from, Some(to), &calendar)?;
            (days, Decimal::from(days))
        }
    };

    Ok(HttpResponse::Ok().json(WorkingDaysResponse {
        from,
        to,
        leave_type: query.leave_type,
        working_days,
        days_off,
        holidays: in_range,
    }))
}

/// Monday-start week around a date
#[utoipa::path(
    get,
    path = "/api/calendar/week",
    params(WeekQuery),
    responses(
        (status = 200, description = "Dates and day statuses of the week", body = WeekResponse),
        (status = 400, description = "Date outside the supported years", body = ErrorBody),
        (status = 502, description = "Bank holiday feed unavailable", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Calendar"
)]
pub async fn week(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    holidays: web::Data<HolidayService>,
    query: web::Query<WeekQuery>,
) -> Result<impl Responder, AppError> {
    let week = Week::containing(query.date.unwrap_or_else(|| Utc::now().date_naive()))?;
    let calendar = holidays.calendar_for_range(week.start(), week.end()).await?;
    let leaves = store
        .leave_between(&auth.username, week.start(), week.end())
        .await?;

    Ok(HttpResponse::Ok().json(WeekResponse {
        week_start_date: week.start(),
        week_end_date: week.end(),
        dates: week.dates().to_vec(),
        day_status: week.day_status(&calendar, &leaves),
    }))
}
