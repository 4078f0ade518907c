use std::collections::BTreeMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use super::DecisionBody;
use crate::auth::auth::AuthUser;
use crate::calendar::hours::{hours_between, out_of_range_cells};
use crate::calendar::week::find_for_week;
use crate::calendar::{CalendarError, FinancialYear, Week, WeekTotals, parse_iso_date};
use crate::error::{AppError, ErrorBody};
use crate::holidays::HolidayService;
use crate::model::timesheet::{
    ApprovalStatus, DayStatus, NewTimesheet, Timesheet, TimesheetChanges, TimesheetDecision,
    TimesheetDraft, TimesheetEntry,
};
use crate::notify::{Notification, Notifier, notify};
use crate::store::Store;

/// Longest range the weekly report will walk.
const MAX_REPORT_WEEKS: usize = 60;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTimesheet {
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    pub entries: Vec<TimesheetEntry>,
    #[serde(default)]
    pub work_description: String,
    /// Computed from bank holidays and approved leave when omitted. Days
    /// left out of a partial map get the weekday/weekend default.
    #[schema(value_type = Option<Object>)]
    pub day_status: Option<BTreeMap<NaiveDate, DayStatus>>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimesheet {
    /// The `version` this edit is based on.
    #[schema(example = 1)]
    pub version: i64,
    pub entries: Vec<TimesheetEntry>,
    #[serde(default)]
    pub work_description: String,
    /// Days left out keep their stored status.
    #[schema(value_type = Option<Object>)]
    pub day_status: Option<BTreeMap<NaiveDate, DayStatus>>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveDraft {
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    pub entries: Vec<TimesheetEntry>,
    #[serde(default)]
    pub work_description: String,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TimesheetFilter {
    /// Users may only pass their own name
    pub username: Option<String>,
    /// Earliest week start, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Latest week start, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeekQuery {
    /// Any day of the wanted week; defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub username: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    #[param(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub to: NaiveDate,
    pub username: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DraftQuery {
    #[param(value_type = String, format = "date")]
    pub week_start_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WeekSource {
    /// Submitted timesheet
    Timesheet,
    /// Saved draft, not yet submitted
    Draft,
    /// Nothing stored; default rows and statuses
    Empty,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub username: String,
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    #[schema(example = "2025-01-12", format = "date", value_type = String)]
    pub week_end_date: NaiveDate,
    pub source: WeekSource,
    /// Present when `source` is `timesheet`.
    pub timesheet: Option<Timesheet>,
    pub entries: Vec<TimesheetEntry>,
    pub work_description: String,
    #[schema(value_type = Object)]
    pub day_status: BTreeMap<NaiveDate, DayStatus>,
    pub totals: WeekTotals,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportWeek {
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub week_start_date: NaiveDate,
    /// `None` for weeks without a submitted timesheet.
    pub status: Option<ApprovalStatus>,
    pub totals: WeekTotals,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub username: String,
    #[schema(format = "date", value_type = String)]
    pub from: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub to: NaiveDate,
    pub weeks: Vec<ReportWeek>,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
}

/// Hours must be 0..=24 and any date key must fall inside the week.
fn validate_entries(entries: &[TimesheetEntry], week: &Week) -> Result<(), AppError> {
    if let Some((day, raw)) = out_of_range_cells(entries).into_iter().next() {
        return Err(AppError::Validation(format!(
            "Hours for {} must be between 0 and 24, got '{}'",
            day, raw
        )));
    }

    let outside = entries
        .iter()
        .flat_map(|entry| entry.hours.keys())
        .filter_map(|key| parse_iso_date(key).ok())
        .find(|day| !week.contains(*day));
    if let Some(day) = outside {
        return Err(AppError::Validation(format!(
            "{} is outside the week starting {}",
            day,
            week.start()
        )));
    }
    Ok(())
}

/// Exactly the week's seven dates: `sent` first, then `base`, then the
/// weekday/weekend defaults. A `sent` key outside the week is refused.
fn merge_day_status(
    week: &Week,
    base: &BTreeMap<NaiveDate, DayStatus>,
    sent: &BTreeMap<NaiveDate, DayStatus>,
) -> Result<BTreeMap<NaiveDate, DayStatus>, AppError> {
    if let Some(day) = sent.keys().find(|day| !week.contains(**day)) {
        return Err(AppError::Validation(format!(
            "Day status for {} is outside the week starting {}",
            day,
            week.start()
        )));
    }

    Ok(week
        .default_day_status()
        .into_iter()
        .map(|(day, default)| {
            let status = sent.get(&day).or_else(|| base.get(&day)).copied().unwrap_or(default);
            (day, status)
        })
        .collect())
}

/// Statuses from bank holidays and approved leave. The feed is advisory
/// here, so a lookup failure falls back to the plain defaults.
async fn computed_day_status(
    store: &dyn Store,
    holidays: &HolidayService,
    username: &str,
    week: &Week,
) -> Result<BTreeMap<NaiveDate, DayStatus>, AppError> {
    let leaves = store.leave_between(username, week.start(), week.end()).await?;
    match holidays.calendar_for_range(week.start(), week.end()).await {
        Ok(calendar) => Ok(week.day_status(&calendar, &leaves)),
        Err(e) => {
            warn!(error = %e, week = %week.start(), "Day statuses without bank holidays");
            Ok(week.day_status(&Default::default(), &leaves))
        }
    }
}

async fn load_owned(store: &dyn Store, auth: &AuthUser, id: u64) -> Result<Timesheet, AppError> {
    let timesheet = store
        .get_timesheet(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("timesheet {}", id)))?;
    auth.require_self_or_admin(&timesheet.username)?;
    Ok(timesheet)
}

/* =========================
Submit a week
========================= */
#[utoipa::path(
    post,
    path = "/api/timesheets",
    request_body = SubmitTimesheet,
    responses(
        (status = 201, description = "Timesheet stored as unapproved; the week's draft is removed", body = Timesheet),
        (status = 400, description = "Week start is not a Monday, or hours or day statuses are invalid", body = ErrorBody),
        (status = 409, description = "A timesheet for this week already exists", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn submit_timesheet(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    holidays: web::Data<HolidayService>,
    payload: web::Json<SubmitTimesheet>,
) -> Result<impl Responder, AppError> {
    let payload = payload.into_inner();
    let week = Week::starting(payload.week_start_date)?;
    validate_entries(&payload.entries, &week)?;

    let day_status = match &payload.day_status {
        Some(sent) => merge_day_status(&week, &BTreeMap::new(), sent)?,
        None => computed_day_status(store.get_ref(), &holidays, &auth.username, &week).await?,
    };

    let timesheet = store
        .submit_timesheet(NewTimesheet {
            username: auth.username.clone(),
            week_start_date: week.start(),
            entries: payload.entries,
            work_description: payload.work_description,
            day_status,
        })
        .await?;

    info!(
        timesheet_id = timesheet.id,
        username = %timesheet.username,
        week = %timesheet.week_start_date,
        "Timesheet submitted"
    );
    Ok(HttpResponse::Created().json(timesheet))
}

#[utoipa::path(
    get,
    path = "/api/timesheets",
    params(TimesheetFilter),
    responses(
        (status = 200, description = "Timesheets ordered by week", body = Vec<Timesheet>),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn list_timesheets(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<TimesheetFilter>,
) -> Result<impl Responder, AppError> {
    let query = query.into_inner();
    let username = if auth.is_admin() {
        query.username
    } else {
        Some(auth.resolve_target(query.username.as_deref())?)
    };

    let timesheets = store
        .list_timesheets(username.as_deref(), query.from, query.to)
        .await?;
    Ok(HttpResponse::Ok().json(timesheets))
}

/// Week view: the submitted timesheet, else the draft, else an empty week
#[utoipa::path(
    get,
    path = "/api/timesheets/week",
    params(WeekQuery),
    responses(
        (status = 200, description = "Rows, day statuses and totals for the week", body = WeekView),
        (status = 400, description = "Date outside the supported years", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn week_view(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    holidays: web::Data<HolidayService>,
    query: web::Query<WeekQuery>,
) -> Result<impl Responder, AppError> {
    let username = auth.resolve_target(query.username.as_deref())?;
    let week = Week::containing(query.date.unwrap_or_else(|| Utc::now().date_naive()))?;

    let mut timesheet = store.timesheet_for_week(&username, week.start()).await?;
    if timesheet.is_none() {
        let all = store.list_timesheets(Some(&username), None, None).await?;
        timesheet = find_for_week(&all, &week).cloned();
        if let Some(found) = &timesheet {
            debug!(
                timesheet_id = found.id,
                stored_week = %found.week_start_date,
                "Week matched by entry dates"
            );
        }
    }

    let view = match timesheet {
        Some(timesheet) => {
            // a record matched by entry dates keeps statuses for its own week
            let day_status = if timesheet.week_start_date == week.start() {
                merge_day_status(&week, &timesheet.day_status, &BTreeMap::new())?
            } else {
                computed_day_status(store.get_ref(), &holidays, &username, &week).await?
            };
            WeekView {
                username,
                week_start_date: week.start(),
                week_end_date: week.end(),
                source: WeekSource::Timesheet,
                entries: timesheet.entries.clone(),
                work_description: timesheet.work_description.clone(),
                day_status,
                totals: WeekTotals::compute(&timesheet.entries, &week),
                timesheet: Some(timesheet),
            }
        }
        None => {
            let day_status = computed_day_status(store.get_ref(), &holidays, &username, &week).await?;
            let (source, entries, work_description) = match store.get_draft(&username, week.start()).await? {
                Some(draft) => (WeekSource::Draft, draft.entries, draft.work_description),
                None => (WeekSource::Empty, Vec::new(), String::new()),
            };
            WeekView {
                username,
                week_start_date: week.start(),
                week_end_date: week.end(),
                source,
                totals: WeekTotals::compute(&entries, &week),
                timesheet: None,
                entries,
                work_description,
                day_status,
            }
        }
    };

    Ok(HttpResponse::Ok().json(view))
}

/// Totals per week over a date range
#[utoipa::path(
    get,
    path = "/api/timesheets/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "One line per week in the range", body = WeeklyReport),
        (status = 400, description = "Invalid range", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn weekly_report(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<ReportQuery>,
) -> Result<impl Responder, AppError> {
    let username = auth.resolve_target(query.username.as_deref())?;
    if query.to < query.from {
        return Err(CalendarError::InvalidRange {
            start: query.from,
            end: query.to,
        }
        .into());
    }

    let first = Week::containing(query.from)?;
    let last = Week::containing(query.to)?;
    let timesheets = store
        .list_timesheets(Some(&username), Some(first.start()), Some(last.start()))
        .await?;

    let mut weeks = Vec::new();
    let mut week = first;
    while week <= last {
        if weeks.len() >= MAX_REPORT_WEEKS {
            return Err(AppError::Validation(format!(
                "A report may cover at most {} weeks",
                MAX_REPORT_WEEKS
            )));
        }
        let stored = timesheets.iter().find(|t| t.week_start_date == week.start());
        let totals = stored
            .map(|t| WeekTotals::compute(&t.entries, &week))
            .unwrap_or_else(|| WeekTotals::compute(&[], &week));
        weeks.push(ReportWeek {
            week_start_date: week.start(),
            status: stored.map(|t| t.status),
            totals,
        });
        week = week.next();
    }

    let total_hours = weeks.iter().map(|w| w.totals.total).sum();
    Ok(HttpResponse::Ok().json(WeeklyReport {
        username,
        from: query.from,
        to: query.to,
        weeks,
        total_hours,
    }))
}

#[utoipa::path(
    get,
    path = "/api/timesheets/{timesheet_id}",
    params(
        ("timesheet_id" = u64, Path, description = "Timesheet id")
    ),
    responses(
        (status = 200, description = "Timesheet found", body = Timesheet),
        (status = 403, description = "Someone else's timesheet", body = ErrorBody),
        (status = 404, description = "Timesheet not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn get_timesheet(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    let timesheet = load_owned(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(timesheet))
}

/// Edit a week; it goes back to unapproved
#[utoipa::path(
    put,
    path = "/api/timesheets/{timesheet_id}",
    params(
        ("timesheet_id" = u64, Path, description = "Timesheet id")
    ),
    request_body = UpdateTimesheet,
    responses(
        (status = 200, description = "Timesheet updated", body = Timesheet),
        (status = 400, description = "Invalid hours or day statuses", body = ErrorBody),
        (status = 404, description = "Timesheet not found", body = ErrorBody),
        (status = 409, description = "Stale version or already approved", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn update_timesheet(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTimesheet>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let payload = payload.into_inner();
    let current = load_owned(store.get_ref(), &auth, id).await?;

    if current.status == ApprovalStatus::Approved {
        return Err(AppError::Conflict(format!("Timesheet {} is already approved", id)));
    }

    let week = Week::starting(current.week_start_date)?;
    validate_entries(&payload.entries, &week)?;

    let changes = TimesheetChanges {
        entries: payload.entries,
        work_description: payload.work_description,
        day_status: merge_day_status(
            &week,
            &current.day_status,
            &payload.day_status.unwrap_or_default(),
        )?,
    };

    let updated = store
        .update_timesheet(id, payload.version, changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("timesheet {}", id)))?;

    info!(timesheet_id = id, version = updated.version, "Timesheet updated");
    Ok(HttpResponse::Ok().json(updated))
}

async fn decide(
    store: &dyn Store,
    notifier: &dyn Notifier,
    id: u64,
    decision: TimesheetDecision,
) -> Result<Timesheet, AppError> {
    let Some(timesheet) = store.decide_timesheet(id, &decision).await? else {
        return match store.get_timesheet(id).await? {
            Some(existing) => Err(AppError::Conflict(format!(
                "Timesheet {} is already {}",
                id, existing.status
            ))),
            None => Err(AppError::not_found(format!("timesheet {}", id))),
        };
    };

    if timesheet.status == ApprovalStatus::Approved {
        consume_budget(store, &timesheet).await;
    }

    info!(timesheet_id = id, status = %timesheet.status, "Timesheet decided");
    notify(notifier, Notification::TimesheetDecided { timesheet: timesheet.clone() }).await;
    Ok(timesheet)
}

/// Takes the approved hours that fall in the user's allocation year off
/// `remainingHours`. Failure leaves the approval in place.
async fn consume_budget(store: &dyn Store, timesheet: &Timesheet) {
    let user = match store.get_user(&timesheet.username).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Budget not updated");
            return;
        }
    };

    let year = FinancialYear::new(user.allocation_year);
    let hours = hours_between(&timesheet.entries, year.start(), year.end());
    if hours.is_zero() {
        return;
    }

    match store.adjust_remaining_hours(&user.username, -hours).await {
        Ok(()) => debug!(username = %user.username, %hours, "Hours budget consumed"),
        Err(e) => warn!(error = %e, username = %user.username, "Budget not updated"),
    }
}

#[utoipa::path(
    put,
    path = "/api/timesheets/{timesheet_id}/approve",
    params(
        ("timesheet_id" = u64, Path, description = "Timesheet id")
    ),
    responses(
        (status = 200, description = "Timesheet approved", body = Timesheet),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Timesheet not found", body = ErrorBody),
        (status = 409, description = "Already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn approve_timesheet(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let timesheet = decide(
        store.get_ref(),
        notifier.get_ref(),
        path.into_inner(),
        TimesheetDecision::Approve,
    )
    .await?;
    Ok(HttpResponse::Ok().json(timesheet))
}

#[utoipa::path(
    put,
    path = "/api/timesheets/{timesheet_id}/reject",
    params(
        ("timesheet_id" = u64, Path, description = "Timesheet id")
    ),
    request_body(content = DecisionBody, description = "Optional reason shown to the owner"),
    responses(
        (status = 200, description = "Timesheet rejected", body = Timesheet),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Timesheet not found", body = ErrorBody),
        (status = 409, description = "Already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn reject_timesheet(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    path: web::Path<u64>,
    body: Option<web::Json<DecisionBody>>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let reason = body
        .and_then(|b| b.into_inner().reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let timesheet = decide(
        store.get_ref(),
        notifier.get_ref(),
        path.into_inner(),
        TimesheetDecision::Reject { reason },
    )
    .await?;
    Ok(HttpResponse::Ok().json(timesheet))
}

/* =========================
Drafts
========================= */
#[utoipa::path(
    get,
    path = "/api/timesheets/drafts",
    params(DraftQuery),
    responses(
        (status = 200, description = "Saved draft", body = TimesheetDraft),
        (status = 404, description = "No draft for this week", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn get_draft(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<DraftQuery>,
) -> Result<impl Responder, AppError> {
    let week = Week::starting(query.week_start_date)?;
    let draft = store
        .get_draft(&auth.username, week.start())
        .await?
        .ok_or_else(|| AppError::not_found(format!("draft for week {}", week.start())))?;
    Ok(HttpResponse::Ok().json(draft))
}

#[utoipa::path(
    put,
    path = "/api/timesheets/drafts",
    request_body = SaveDraft,
    responses(
        (status = 200, description = "Draft saved, replacing any previous one", body = TimesheetDraft),
        (status = 400, description = "Week start is not a Monday or hours are invalid", body = ErrorBody),
        (status = 409, description = "The week was already submitted", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Timesheet"
)]
pub async fn save_draft(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<SaveDraft>,
) -> Result<impl Responder, AppError> {
    let payload = payload.into_inner();
    let week = Week::starting(payload.week_start_date)?;
    validate_entries(&payload.entries, &week)?;

    let draft = store
        .save_draft(TimesheetDraft {
            username: auth.username.clone(),
            week_start_date: week.start(),
            entries: payload.entries,
            work_description: payload.work_description,
            updated_at: Utc::now(),
        })
        .await?;
    Ok(HttpResponse::Ok().json(draft))
}
