//! Persistence behind one trait so handlers do not care whether rows live
//! in MySQL or in process memory.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::leave_request::{LeaveDecision, LeaveQuery, LeaveRequest, NewLeave};
use crate::model::timesheet::{
    NewTimesheet, Timesheet, TimesheetChanges, TimesheetDecision, TimesheetDraft,
};
use crate::model::user::{NewUser, User, UserChanges, UserCredentials, UserQuery};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored JSON could not be read: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored value '{0}' is not recognised")]
    Corrupt(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("record was modified concurrently (current version {current})")]
    VersionMismatch { current: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(10).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, username: &str) -> StoreResult<Option<User>>;
    /// Looks up by username or e-mail.
    async fn find_credentials(&self, login: &str) -> StoreResult<Option<UserCredentials>>;
    async fn list_users(&self, query: &UserQuery, page: Pagination) -> StoreResult<Page<User>>;
    async fn update_user(&self, username: &str, changes: UserChanges) -> StoreResult<Option<User>>;
    async fn record_login(&self, username: &str) -> StoreResult<()>;

    // session
    async fn store_refresh_token(
        &self,
        username: &str,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Revokes an active token; `false` when it was unknown or already revoked.
    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool>;

    // leave
    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest>;
    async fn get_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    async fn list_leave(&self, query: &LeaveQuery, page: Pagination) -> StoreResult<Page<LeaveRequest>>;
    /// Every request of `username` overlapping `[from, to]`.
    async fn leave_between(
        &self,
        username: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<LeaveRequest>>;
    /// Applies only to pending requests; `None` when nothing was pending.
    async fn decide_leave(&self, id: u64, decision: &LeaveDecision) -> StoreResult<Option<LeaveRequest>>;

    // timesheets
    /// Inserts and drops the draft with the same (username, week) key.
    async fn submit_timesheet(&self, timesheet: NewTimesheet) -> StoreResult<Timesheet>;
    async fn get_timesheet(&self, id: u64) -> StoreResult<Option<Timesheet>>;
    async fn timesheet_for_week(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<Timesheet>>;
    /// Ordered by week start, optionally bounded.
    async fn list_timesheets(
        &self,
        username: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Timesheet>>;
    /// Rewrites a timesheet and puts it back to unapproved. Fails with
    /// [`StoreError::VersionMismatch`] unless `expected_version` is current.
    async fn update_timesheet(
        &self,
        id: u64,
        expected_version: i64,
        changes: TimesheetChanges,
    ) -> StoreResult<Option<Timesheet>>;
    /// Applies only to unapproved timesheets; `None` when nothing changed.
    async fn decide_timesheet(
        &self,
        id: u64,
        decision: &TimesheetDecision,
    ) -> StoreResult<Option<Timesheet>>;
    async fn adjust_remaining_hours(&self, username: &str, delta: Decimal) -> StoreResult<()>;

    // drafts
    /// Upserts by (username, week). Fails with [`StoreError::Duplicate`]
    /// once that week has a timesheet; the check and the write are atomic.
    async fn save_draft(&self, draft: TimesheetDraft) -> StoreResult<TimesheetDraft>;
    async fn get_draft(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<TimesheetDraft>>;
}
