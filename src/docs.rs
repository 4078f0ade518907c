use crate::api::DecisionBody;
use crate::api::calendar::{WeekResponse, WorkingDaysResponse};
use crate::api::holidays::HolidayList;
use crate::api::leave_request::{CreateLeave, LeaveListResponse};
use crate::api::timesheet::{
    ReportWeek, SaveDraft, SubmitTimesheet, UpdateTimesheet, WeekSource, WeekView, WeeklyReport,
};
use crate::api::users::{CreateUser, UpdateUser, UserListResponse};
use crate::calendar::{LeaveSummary, PayPeriod, Week, WeekTotals};
use crate::error::ErrorBody;
use crate::model::bank_holiday::BankHoliday;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{HoursBudget, PayPeriodLine, PayrollSummary};
use crate::model::role::Role;
use crate::model::timesheet::{ApprovalStatus, DayStatus, Timesheet, TimesheetDraft, TimesheetEntry};
use crate::model::user::User;
use crate::models::{LoginReqDto, RefreshReqDto, TokenPair};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timesheet & Leave API",
        version = "1.0.0",
        description = r#"
## Timesheets, Leave and Payroll

Back end for weekly timesheets, leave requests and the pay derived from them.
All of it rests on one calendar: Monday-start weeks, working days that skip
weekends and bank holidays, and April-to-March financial years.

### 🔹 Key Features
- **Leave**
  - Request leave, approve/reject requests, annual days-off summary
- **Timesheets**
  - Weekly hours by project, drafts, approval, weekly reports
- **Payroll**
  - Weekly or monthly pay from approved hours, financial-year hours budget
- **Calendar**
  - Working-day counts and bank holidays from the public feed

### 🔐 Security
Every endpoint under `/api` needs a JWT Bearer access token from `/auth/login`.
Approvals and user management are limited to **Admin**.

### 📦 Response Format
- JSON with camelCase fields
- Errors are `{ "code", "message", "details"? }`
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::leave_summary,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::timesheet::submit_timesheet,
        crate::api::timesheet::list_timesheets,
        crate::api::timesheet::week_view,
        crate::api::timesheet::weekly_report,
        crate::api::timesheet::get_timesheet,
        crate::api::timesheet::update_timesheet,
        crate::api::timesheet::approve_timesheet,
        crate::api::timesheet::reject_timesheet,
        crate::api::timesheet::get_draft,
        crate::api::timesheet::save_draft,

        crate::api::payroll::payroll_summary,
        crate::api::payroll::hours_budget,

        crate::api::calendar::working_days,
        crate::api::calendar::week,
        crate::api::holidays::list_holidays
    ),
    components(
        schemas(
            ErrorBody,
            DecisionBody,
            LoginReqDto,
            RefreshReqDto,
            TokenPair,
            Role,
            User,
            CreateUser,
            UpdateUser,
            UserListResponse,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            CreateLeave,
            LeaveListResponse,
            LeaveSummary,
            TimesheetEntry,
            DayStatus,
            ApprovalStatus,
            Timesheet,
            TimesheetDraft,
            SubmitTimesheet,
            UpdateTimesheet,
            SaveDraft,
            Week,
            WeekTotals,
            WeekSource,
            WeekView,
            ReportWeek,
            WeeklyReport,
            PayPeriod,
            PayPeriodLine,
            PayrollSummary,
            HoursBudget,
            BankHoliday,
            HolidayList,
            WorkingDaysResponse,
            WeekResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token APIs"),
        (name = "Users", description = "User management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Timesheet", description = "Timesheet APIs"),
        (name = "Payroll", description = "Payroll and hours budget APIs"),
        (name = "Calendar", description = "Working days and bank holidays"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
