use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::auth::AuthUser;
use crate::calendar::hours::{bucket_hours, hours_between};
use crate::calendar::{FinancialYear, PayPeriod};
use crate::error::{AppError, ErrorBody};
use crate::model::payroll::{HoursBudget, PayPeriodLine, PayrollSummary};
use crate::model::timesheet::{ApprovalStatus, Timesheet};
use crate::model::user::User;
use crate::store::Store;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    /// Admins may ask for anyone; defaults to the caller
    pub username: Option<String>,
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
    /// weekly or monthly (default)
    #[param(value_type = Option<String>, example = "monthly")]
    pub period: Option<PayPeriod>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BudgetQuery {
    pub username: Option<String>,
    /// Any day of the wanted financial year; defaults to the allocation year
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

async fn load_user(store: &dyn Store, username: &str) -> Result<User, AppError> {
    store
        .get_user(username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))
}

/// Approved timesheets whose week overlaps `[from, to]`.
async fn approved_between(
    store: &dyn Store,
    username: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Timesheet>, AppError> {
    let earliest_week = from.checked_sub_days(Days::new(6)).unwrap_or(from);
    let timesheets = store
        .list_timesheets(Some(username), Some(earliest_week), Some(to))
        .await?;
    Ok(timesheets
        .into_iter()
        .filter(|t| t.status == ApprovalStatus::Approved)
        .collect())
}

/// Pay per week or month, from approved hours
#[utoipa::path(
    get,
    path = "/api/payroll/summary",
    params(PayrollQuery),
    responses(
        (status = 200, description = "One line per period that has hours", body = PayrollSummary),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Payroll"
)]
pub async fn payroll_summary(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<PayrollQuery>,
) -> Result<impl Responder, AppError> {
    let username = auth.resolve_target(query.username.as_deref())?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let period = query.period.unwrap_or_default();

    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Err(AppError::Validation(format!("{} is not a supported year", year)));
    };

    let user = load_user(store.get_ref(), &username).await?;
    let timesheets = approved_between(store.get_ref(), &username, first, last).await?;

    let buckets = bucket_hours(timesheets.iter().flat_map(|t| t.entries.iter()), year, period);
    let lines: Vec<PayPeriodLine> = buckets
        .into_iter()
        .map(|(start, hours)| PayPeriodLine {
            period_start: start,
            period_end: period.bucket_end(start),
            hours,
            pay: (hours * user.hourly_rate).round_dp(2),
        })
        .collect();

    let total_hours: Decimal = lines.iter().map(|l| l.hours).sum();
    let total_pay: Decimal = lines.iter().map(|l| l.pay).sum();

    Ok(HttpResponse::Ok().json(PayrollSummary {
        username,
        year,
        period,
        hourly_rate: user.hourly_rate,
        lines,
        total_hours,
        total_pay,
    }))
}

/// Financial-year hours budget
#[utoipa::path(
    get,
    path = "/api/payroll/budget",
    params(BudgetQuery),
    responses(
        (status = 200, description = "Allocated, remaining and logged hours", body = HoursBudget),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Payroll"
)]
pub async fn hours_budget(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<BudgetQuery>,
) -> Result<impl Responder, AppError> {
    let username = auth.resolve_target(query.username.as_deref())?;
    let user = load_user(store.get_ref(), &username).await?;

    let allocation_year = FinancialYear::new(user.allocation_year);
    let year = query.date.map(FinancialYear::containing).unwrap_or(allocation_year);

    let timesheets = approved_between(store.get_ref(), &username, year.start(), year.end()).await?;
    let logged_hours = hours_between(
        timesheets.iter().flat_map(|t| t.entries.iter()),
        year.start(),
        year.end(),
    );

    // allocations only exist for the allocation year
    let (allocated_hours, remaining_hours) = if year == allocation_year {
        (user.allocated_hours, user.remaining_hours)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    Ok(HttpResponse::Ok().json(HoursBudget {
        username,
        financial_year: year.label(),
        allocated_hours,
        remaining_hours,
        logged_hours,
    }))
}
