use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::DecisionBody;
use crate::auth::auth::AuthUser;
use crate::calendar::{LeaveSummary, check_range};
use crate::error::{AppError, ErrorBody};
use crate::holidays::HolidayService;
use crate::model::leave_request::{
    LeaveDecision, LeaveQuery, LeaveRequest, LeaveStatus, LeaveType, NewLeave,
};
use crate::notify::{Notification, Notifier, notify};
use crate::store::{Pagination, Store};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeave {
    #[schema(example = "sick_leave")]
    pub leave_type: LeaveType,
    #[schema(example = "2025-01-06", format = "date", value_type = String)]
    pub from: NaiveDate,
    /// Defaults to `from` for single-day requests.
    #[schema(example = "2025-01-08", format = "date", value_type = String)]
    pub to: Option<NaiveDate>,
    #[schema(example = "Flu")]
    pub reason: String,
    /// Accepted and ignored; the server recomputes it.
    #[schema(value_type = Option<u32>)]
    pub working_days: Option<serde_json::Value>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by requester; users may only pass their own name
    pub username: Option<String>,
    /// pending, approved or rejected
    #[param(value_type = Option<String>, example = "pending")]
    pub status: Option<LeaveStatus>,
    #[param(value_type = Option<String>, example = "holiday")]
    pub leave_type: Option<LeaveType>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Items per page, at most 100
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
    /// Admins may ask for anyone
    pub username: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted as pending", body = LeaveRequest),
        (status = 400, description = "Missing reason, end date before start date or a range over a year", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 502, description = "Bank holiday feed unavailable", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    holidays: web::Data<HolidayService>,
    notifier: web::Data<dyn Notifier>,
    payload: web::Json<CreateLeave>,
) -> Result<impl Responder, AppError> {
    let payload = payload.into_inner();
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("A reason is required".to_string()));
    }

    let from = payload.from;
    let to = payload.to.unwrap_or(from);
    check_range(from, to)?;

    let calendar = holidays.calendar_for_range(from, to).await?;
    let working_days = payload.leave_type.working_days(from, to, &calendar)?;
    if let Some(sent) = &payload.working_days {
        tracing::debug!(%sent, working_days, "Ignoring client-supplied workingDays");
    }

    let leave = store
        .create_leave(NewLeave {
            username: auth.username.clone(),
            email: auth.email.clone(),
            leave_type: payload.leave_type,
            from,
            to,
            reason: reason.to_string(),
            working_days,
        })
        .await?;

    tracing::info!(
        leave_id = leave.id,
        username = %leave.username,
        leave_type = %leave.leave_type,
        working_days,
        "Leave request submitted"
    );

    notify(notifier.get_ref(), Notification::LeaveSubmitted { leave: leave.clone() }).await;

    Ok(HttpResponse::Created().json(leave))
}

/// Applies a decision to a pending request; anything else is a 404 or 409.
async fn decide(
    store: &dyn Store,
    notifier: &dyn Notifier,
    leave_id: u64,
    decision: LeaveDecision,
) -> Result<LeaveRequest, AppError> {
    match store.decide_leave(leave_id, &decision).await? {
        Some(leave) => {
            tracing::info!(leave_id, status = %leave.status, "Leave decided");
            notify(notifier, Notification::LeaveDecided { leave: leave.clone() }).await;
            Ok(leave)
        }
        None => match store.get_leave(leave_id).await? {
            Some(existing) => Err(AppError::Conflict(format!(
                "Leave request {} is already {}",
                leave_id, existing.status
            ))),
            None => Err(AppError::not_found(format!("leave request {}", leave_id))),
        },
    }
}

/* =========================
Approve leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved", body = LeaveRequest),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;

    let leave = decide(
        store.get_ref(),
        notifier.get_ref(),
        path.into_inner(),
        LeaveDecision::Approve,
    )
    .await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body(content = DecisionBody, description = "Optional reason shown to the requester"),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody),
        (status = 409, description = "Leave request already processed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
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

    let leave = decide(
        store.get_ref(),
        notifier.get_ref(),
        path.into_inner(),
        LeaveDecision::Reject { reason },
    )
    .await?;
    Ok(HttpResponse::Ok().json(leave))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Someone else's request", body = ErrorBody),
        (status = 404, description = "Leave request not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<impl Responder, AppError> {
    let leave_id = path.into_inner();

    let leave = store
        .get_leave(leave_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("leave request {}", leave_id)))?;
    auth.require_self_or_admin(&leave.username)?;

    Ok(HttpResponse::Ok().json(leave))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list, newest first", body = LeaveListResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<LeaveFilter>,
) -> Result<impl Responder, AppError> {
    let query = query.into_inner();

    // users only ever see their own requests
    let username = if auth.is_admin() {
        query.username
    } else {
        Some(auth.resolve_target(query.username.as_deref())?)
    };

    let page = Pagination::new(query.page, query.per_page);
    let filter = LeaveQuery {
        username,
        status: query.status,
        leave_type: query.leave_type,
    };

    let result = store.list_leave(&filter, page).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: result.items,
        page: page.page,
        per_page: page.per_page,
        total: result.total,
    }))
}

/// Annual days-off rollup
#[utoipa::path(
    get,
    path = "/api/leave/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Approved days off and counts by status", body = LeaveSummary),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_summary(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<SummaryQuery>,
) -> Result<impl Responder, AppError> {
    let username = auth.resolve_target(query.username.as_deref())?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Err(AppError::Validation(format!("{} is not a supported year", year)));
    };

    let requests = store.leave_between(&username, first, last).await?;
    Ok(HttpResponse::Ok().json(LeaveSummary::for_year(&requests, year)))
}
