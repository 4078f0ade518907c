//! One error type for every handler, rendered as
//! `{"code": "...", "message": "...", "details": ...}`.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::calendar::CalendarError;
use crate::holidays::HolidayError;
use crate::store::StoreError;

pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_RANGE: &str = "INVALID_RANGE";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    VersionMismatch { message: String, current_version: i64 },

    #[error("{0}")]
    Upstream(String),

    /// Message is already generic; the cause was logged where it happened.
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "code": "VERSION_MISMATCH",
    "message": "timesheet was changed by someone else",
    "details": { "currentVersion": 4 }
}))]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn internal() -> Self {
        AppError::Internal("internal server error".to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Calendar(
                CalendarError::InvalidRange { .. } | CalendarError::RangeTooLong { .. },
            ) => codes::INVALID_RANGE,
            AppError::Calendar(_) => codes::VALIDATION_ERROR,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::VersionMismatch { .. } => codes::VERSION_MISMATCH,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            AppError::VersionMismatch { current_version, .. } => {
                Some(json!({ "currentVersion": current_version }))
            }
            AppError::Calendar(CalendarError::InvalidRange { start, end }) => {
                Some(json!({ "from": start, "to": end }))
            }
            AppError::Calendar(CalendarError::RangeTooLong { days, max }) => {
                Some(json!({ "days": days, "maxDays": max }))
            }
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            details,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Calendar(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::VersionMismatch { .. } => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{} already exists", what)),
            StoreError::VersionMismatch { current } => AppError::VersionMismatch {
                message: "record was changed by someone else, reload and retry".to_string(),
                current_version: current,
            },
            other => {
                tracing::error!(error = %other, "Store failure");
                AppError::internal()
            }
        }
    }
}

impl From<HolidayError> for AppError {
    fn from(err: HolidayError) -> Self {
        tracing::warn!(error = %err, "Bank holiday lookup failed");
        AppError::Upstream("bank holiday feed is unavailable".to_string())
    }
}
