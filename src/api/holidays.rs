use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::{AppError, ErrorBody};
use crate::holidays::HolidayService;
use crate::model::bank_holiday::BankHoliday;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HolidayQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct HolidayList {
    pub year: i32,
    pub holidays: Vec<BankHoliday>,
}

/// Bank holidays for a year
#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses(
        (status = 200, description = "Bank holidays in feed order", body = HolidayList),
        (status = 502, description = "Bank holiday feed unavailable", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Calendar"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    holidays: web::Data<HolidayService>,
    query: web::Query<HolidayQuery>,
) -> Result<impl Responder, AppError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let in_year = holidays.holidays_for_year(year).await?;

    Ok(HttpResponse::Ok().json(HolidayList {
        year,
        holidays: in_year,
    }))
}
