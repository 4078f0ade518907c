use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::calendar::FinancialYear;
use crate::config::AdminSeed;
use crate::error::{AppError, ErrorBody};
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserChanges, UserQuery};
use crate::store::{Pagination, Store};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$").unwrap());

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jdoe@company.com")]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub designation: String,
    #[schema(value_type = String, example = "25.00")]
    pub hourly_rate: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "1500")]
    pub allocated_hours: Decimal,
    /// Financial year the allocation is for, defaults to the current one.
    pub allocation_year: Option<i32>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub designation: Option<String>,
    pub active: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub hourly_rate: Option<Decimal>,
    /// Resets `remainingHours` to this value.
    #[schema(value_type = Option<String>)]
    pub allocated_hours: Option<Decimal>,
    pub allocation_year: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    #[param(value_type = Option<String>, example = "admin")]
    pub role: Option<Role>,
    pub active: Option<bool>,
    /// Matches username, name or e-mail
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub data: Vec<User>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("'{}' is not a valid e-mail address", email)))
    }
}

fn validate_rate(rate: Decimal) -> Result<(), AppError> {
    if rate.is_sign_negative() {
        return Err(AppError::Validation("Hourly rate cannot be negative".to_string()));
    }
    Ok(())
}

fn validate_new_user(user: &CreateUser) -> Result<(), AppError> {
    if !USERNAME_RE.is_match(&user.username) {
        return Err(AppError::Validation(
            "Username must be 3-32 lowercase letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    if user.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_email(&user.email)?;
    if user.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    validate_rate(user.hourly_rate)?;
    if user.allocated_hours.is_sign_negative() {
        return Err(AppError::Validation("Allocated hours cannot be negative".to_string()));
    }
    Ok(())
}

fn current_financial_year() -> i32 {
    FinancialYear::containing(Utc::now().date_naive()).start_year()
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 409, description = "Username or e-mail taken", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn create_user(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<CreateUser>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let payload = payload.into_inner();
    validate_new_user(&payload)?;

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AppError::internal()
    })?;

    let user = store
        .create_user(NewUser {
            username: payload.username,
            name: payload.name.trim().to_string(),
            email: payload.email.to_lowercase(),
            password_hash,
            role: payload.role,
            designation: payload.designation,
            hourly_rate: payload.hourly_rate,
            allocated_hours: payload.allocated_hours,
            allocation_year: payload.allocation_year.unwrap_or_else(current_financial_year),
        })
        .await?;

    info!(username = %user.username, role = %user.role, created_by = %auth.username, "User created");
    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Paginated users", body = UserListResponse),
        (status = 403, description = "Forbidden", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<UserFilter>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let query = query.into_inner();

    let page = Pagination::new(query.page, query.per_page);
    let filter = UserQuery {
        role: query.role,
        active: query.active,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };
    let result = store.list_users(&filter, page).await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data: result.items,
        page: page.page,
        per_page: page.per_page,
        total: result.total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let username = path.into_inner();
    auth.require_self_or_admin(&username)?;

    let user = store
        .get_user(&username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    put,
    path = "/api/users/{username}",
    params(
        ("username" = String, Path, description = "Username")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    payload: web::Json<UpdateUser>,
) -> Result<impl Responder, AppError> {
    auth.require_admin()?;
    let username = path.into_inner();
    let payload = payload.into_inner();

    if let Some(email) = &payload.email {
        validate_email(email)?;
    }
    if let Some(rate) = payload.hourly_rate {
        validate_rate(rate)?;
    }
    if payload.allocation_year.is_some() && payload.allocated_hours.is_none() {
        return Err(AppError::Validation(
            "allocationYear can only change together with allocatedHours".to_string(),
        ));
    }
    if username == auth.username && payload.active == Some(false) {
        return Err(AppError::Validation("You cannot deactivate your own account".to_string()));
    }

    let changes = UserChanges {
        name: payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        email: payload.email.map(|e| e.to_lowercase()),
        role: payload.role,
        designation: payload.designation,
        active: payload.active,
        hourly_rate: payload.hourly_rate,
        allocation: payload
            .allocated_hours
            .map(|hours| (hours, payload.allocation_year.unwrap_or_else(current_financial_year))),
    };

    let user = store
        .update_user(&username, changes)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {}", username)))?;

    info!(username = %user.username, updated_by = %auth.username, "User updated");
    Ok(HttpResponse::Ok().json(user))
}

/// Creates the configured admin unless the name is already taken.
pub async fn bootstrap_admin(store: &dyn Store, seed: &AdminSeed) -> anyhow::Result<()> {
    if store.get_user(&seed.username).await?.is_some() {
        info!(username = %seed.username, "Bootstrap admin already exists");
        return Ok(());
    }

    let password_hash = hash_password(&seed.password)
        .map_err(|e| anyhow::anyhow!("failed to hash bootstrap password: {}", e))?;

    store
        .create_user(NewUser {
            username: seed.username.clone(),
            name: seed.username.clone(),
            email: seed.email.to_lowercase(),
            password_hash,
            role: Role::Admin,
            designation: "Administrator".to_string(),
            hourly_rate: Decimal::ZERO,
            allocated_hours: Decimal::ZERO,
            allocation_year: current_financial_year(),
        })
        .await?;

    info!(username = %seed.username, "Bootstrap admin created");
    Ok(())
}
