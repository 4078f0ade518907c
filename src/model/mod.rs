pub mod bank_holiday;
pub mod leave_request;
pub mod payroll;
pub mod role;
pub mod timesheet;
pub mod user;
