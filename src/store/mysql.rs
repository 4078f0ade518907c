use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use super::{Page, Pagination, Store, StoreError, StoreResult};
use crate::model::leave_request::{LeaveDecision, LeaveQuery, LeaveRequest, NewLeave};
use crate::model::timesheet::{
    NewTimesheet, Timesheet, TimesheetChanges, TimesheetDecision, TimesheetDraft,
};
use crate::model::user::{NewUser, User, UserChanges, UserCredentials, UserQuery};

/// MySQL unique-constraint violation.
const DUPLICATE_KEY: &str = "23000";

const USER_COLUMNS: &str = "id, username, name, email, password, role, designation, is_active, \
     hourly_rate, allocated_hours, remaining_hours, allocation_year, created_at";

const LEAVE_COLUMNS: &str = "id, username, email, leave_type, from_date, to_date, reason, \
     working_days, status, rejection_reason, created_at, updated_at";

const TIMESHEET_COLUMNS: &str = "id, username, week_start_date, entries, work_description, \
     day_status, status, rejection_reason, version, created_at, updated_at";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn duplicate_or(err: sqlx::Error, what: impl Into<String>) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(DUPLICATE_KEY) {
            return StoreError::Duplicate(what.into());
        }
    }
    StoreError::Database(err)
}

fn parse_enum<T: FromStr>(raw: &str) -> StoreResult<T> {
    T::from_str(raw).map_err(|_| StoreError::Corrupt(raw.to_string()))
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    name: String,
    email: String,
    password: String,
    role: String,
    designation: String,
    is_active: bool,
    hourly_rate: Decimal,
    allocated_hours: Decimal,
    remaining_hours: Decimal,
    allocation_year: i32,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> StoreResult<UserCredentials> {
        Ok(UserCredentials {
            user: User {
                id: self.id,
                username: self.username,
                name: self.name,
                email: self.email,
                role: parse_enum(&self.role)?,
                designation: self.designation,
                active: self.is_active,
                hourly_rate: self.hourly_rate,
                allocated_hours: self.allocated_hours,
                remaining_hours: self.remaining_hours,
                allocation_year: self.allocation_year,
                created_at: self.created_at,
            },
            password_hash: self.password,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    username: String,
    email: String,
    leave_type: String,
    from_date: NaiveDate,
    to_date: NaiveDate,
    reason: String,
    working_days: u32,
    status: String,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> StoreResult<Self> {
        Ok(LeaveRequest {
            id: row.id,
            username: row.username,
            email: row.email,
            leave_type: parse_enum(&row.leave_type)?,
            from: row.from_date,
            to: row.to_date,
            reason: row.reason,
            working_days: row.working_days,
            status: parse_enum(&row.status)?,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TimesheetRow {
    id: u64,
    username: String,
    week_start_date: NaiveDate,
    entries: String,
    work_description: String,
    day_status: String,
    status: String,
    rejection_reason: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TimesheetRow> for Timesheet {
    type Error = StoreError;

    fn try_from(row: TimesheetRow) -> StoreResult<Self> {
        Ok(Timesheet {
            id: row.id,
            username: row.username,
            week_start_date: row.week_start_date,
            entries: serde_json::from_str(&row.entries)?,
            work_description: row.work_description,
            day_status: serde_json::from_str(&row.day_status)?,
            status: parse_enum(&row.status)?,
            rejection_reason: row.rejection_reason,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DraftRow {
    username: String,
    week_start_date: NaiveDate,
    entries: String,
    work_description: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DraftRow> for TimesheetDraft {
    type Error = StoreError;

    fn try_from(row: DraftRow) -> StoreResult<Self> {
        Ok(TimesheetDraft {
            username: row.username,
            week_start_date: row.week_start_date,
            entries: serde_json::from_str(&row.entries)?,
            work_description: row.work_description,
            updated_at: row.updated_at,
        })
    }
}

fn push_user_filters(builder: &mut QueryBuilder<'_, MySql>, query: &UserQuery) {
    if let Some(role) = query.role {
        builder.push(" AND role = ").push_bind(role.as_ref().to_string());
    }
    if let Some(active) = query.active {
        builder.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = &query.search {
        let like = format!("%{}%", search);
        builder
            .push(" AND (username LIKE ")
            .push_bind(like.clone())
            .push(" OR name LIKE ")
            .push_bind(like.clone())
            .push(" OR email LIKE ")
            .push_bind(like)
            .push(")");
    }
}

fn push_leave_filters(builder: &mut QueryBuilder<'_, MySql>, query: &LeaveQuery) {
    if let Some(username) = &query.username {
        builder.push(" AND username = ").push_bind(username.clone());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    if let Some(leave_type) = query.leave_type {
        builder
            .push(" AND leave_type = ")
            .push_bind(leave_type.as_ref().to_string());
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users
                (username, name, email, password, role, designation, is_active,
                 hourly_rate, allocated_hours, remaining_hours, allocation_year, created_at)
            VALUES (?, ?, ?, ?, ?, ?, TRUE, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .bind(&user.designation)
        .bind(user.hourly_rate)
        .bind(user.allocated_hours)
        .bind(user.allocated_hours)
        .bind(user.allocation_year)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "username or email"))?;

        self.get_user(&user.username)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("user {} vanished after insert", user.username)))
    }

    async fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_credentials().map(|c| c.user)).transpose()
    }

    async fn find_credentials(&self, login: &str) -> StoreResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = ? OR email = ? LIMIT 1",
            USER_COLUMNS
        ))
        .bind(login)
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_credentials).transpose()
    }

    async fn list_users(&self, query: &UserQuery, page: Pagination) -> StoreResult<Page<User>> {
        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM users WHERE 1=1");
        push_user_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(format!("SELECT {} FROM users WHERE 1=1", USER_COLUMNS));
        push_user_filters(&mut data, query);
        data.push(" ORDER BY username LIMIT ")
            .push_bind(i64::from(page.per_page))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows = data.build_query_as::<UserRow>().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(|r| r.into_credentials().map(|c| c.user))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    async fn update_user(&self, username: &str, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut builder = QueryBuilder::<MySql>::new("UPDATE users SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(name) = changes.name {
            builder.push(", name = ").push_bind(name);
        }
        if let Some(email) = changes.email {
            builder.push(", email = ").push_bind(email);
        }
        if let Some(role) = changes.role {
            builder.push(", role = ").push_bind(role.as_ref().to_string());
        }
        if let Some(designation) = changes.designation {
            builder.push(", designation = ").push_bind(designation);
        }
        if let Some(active) = changes.active {
            builder.push(", is_active = ").push_bind(active);
        }
        if let Some(rate) = changes.hourly_rate {
            builder.push(", hourly_rate = ").push_bind(rate);
        }
        if let Some((hours, year)) = changes.allocation {
            builder
                .push(", allocated_hours = ")
                .push_bind(hours)
                .push(", remaining_hours = ")
                .push_bind(hours)
                .push(", allocation_year = ")
                .push_bind(year);
        }
        builder.push(" WHERE username = ").push_bind(username.to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate_or(e, "email"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_user(username).await
    }

    async fn record_login(&self, username: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE username = ?")
            .bind(Utc::now())
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        username: &str,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (username, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ?
            AND revoked = FALSE
            AND expires_at > ?
            "#,
        )
        .bind(jti)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (username, email, leave_type, from_date, to_date, reason,
                 working_days, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&leave.username)
        .bind(&leave.email)
        .bind(leave.leave_type.as_ref())
        .bind(leave.from)
        .bind(leave.to)
        .bind(&leave.reason)
        .bind(leave.working_days)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.get_leave(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("leave {} vanished after insert", id)))
    }

    async fn get_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let row = sqlx::query_as::<_, LeaveRow>(&format!(
            "SELECT {} FROM leave_requests WHERE id = ?",
            LEAVE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LeaveRequest::try_from).transpose()
    }

    async fn list_leave(&self, query: &LeaveQuery, page: Pagination) -> StoreResult<Page<LeaveRequest>> {
        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM leave_requests WHERE 1=1");
        push_leave_filters(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM leave_requests WHERE 1=1",
            LEAVE_COLUMNS
        ));
        push_leave_filters(&mut data, query);
        data.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.per_page))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
        let rows = data.build_query_as::<LeaveRow>().fetch_all(&self.pool).await?;

        let items = rows
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page { items, total })
    }

    async fn leave_between(
        &self,
        username: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let rows = sqlx::query_as::<_, LeaveRow>(&format!(
            r#"
            SELECT {}
            FROM leave_requests
            WHERE username = ?
            AND from_date <= ?
            AND to_date >= ?
            ORDER BY from_date
            "#,
            LEAVE_COLUMNS
        ))
        .bind(username)
        .bind(to)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn decide_leave(&self, id: u64, decision: &LeaveDecision) -> StoreResult<Option<LeaveRequest>> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, rejection_reason = ?, updated_at = ?
            WHERE id = ?
            AND status = 'pending'
            "#,
        )
        .bind(decision.status().as_ref())
        .bind(decision.rejection_reason())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_leave(id).await
    }

    async fn submit_timesheet(&self, timesheet: NewTimesheet) -> StoreResult<Timesheet> {
        let now = Utc::now();
        let entries = serde_json::to_string(&timesheet.entries)?;
        let day_status = serde_json::to_string(&timesheet.day_status)?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO timesheets
                (username, week_start_date, entries, work_description, day_status,
                 status, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'unapproved', 1, ?, ?)
            "#,
        )
        .bind(&timesheet.username)
        .bind(timesheet.week_start_date)
        .bind(entries)
        .bind(&timesheet.work_description)
        .bind(day_status)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_or(e, format!("timesheet for week {}", timesheet.week_start_date)))?;

        sqlx::query("DELETE FROM timesheet_drafts WHERE username = ? AND week_start_date = ?")
            .bind(&timesheet.username)
            .bind(timesheet.week_start_date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let id = result.last_insert_id();
        self.get_timesheet(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("timesheet {} vanished after insert", id)))
    }

    async fn get_timesheet(&self, id: u64) -> StoreResult<Option<Timesheet>> {
        let row = sqlx::query_as::<_, TimesheetRow>(&format!(
            "SELECT {} FROM timesheets WHERE id = ?",
            TIMESHEET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Timesheet::try_from).transpose()
    }

    async fn timesheet_for_week(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<Timesheet>> {
        let row = sqlx::query_as::<_, TimesheetRow>(&format!(
            "SELECT {} FROM timesheets WHERE username = ? AND week_start_date = ?",
            TIMESHEET_COLUMNS
        ))
        .bind(username)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Timesheet::try_from).transpose()
    }

    async fn list_timesheets(
        &self,
        username: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Timesheet>> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM timesheets WHERE 1=1",
            TIMESHEET_COLUMNS
        ));
        if let Some(username) = username {
            builder.push(" AND username = ").push_bind(username.to_string());
        }
        if let Some(from) = from {
            builder.push(" AND week_start_date >= ").push_bind(from);
        }
        if let Some(to) = to {
            builder.push(" AND week_start_date <= ").push_bind(to);
        }
        builder.push(" ORDER BY week_start_date, id");

        let rows = builder.build_query_as::<TimesheetRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Timesheet::try_from).collect()
    }

    async fn update_timesheet(
        &self,
        id: u64,
        expected_version: i64,
        changes: TimesheetChanges,
    ) -> StoreResult<Option<Timesheet>> {
        let result = sqlx::query(
            r#"
            UPDATE timesheets
            SET entries = ?, work_description = ?, day_status = ?,
                status = 'unapproved', rejection_reason = NULL,
                version = version + 1, updated_at = ?
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(serde_json::to_string(&changes.entries)?)
        .bind(&changes.work_description)
        .bind(serde_json::to_string(&changes.day_status)?)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        let current = self.get_timesheet(id).await?;
        match current {
            Some(timesheet) if result.rows_affected() == 0 => Err(StoreError::VersionMismatch {
                current: timesheet.version,
            }),
            other => Ok(other),
        }
    }

    async fn decide_timesheet(
        &self,
        id: u64,
        decision: &TimesheetDecision,
    ) -> StoreResult<Option<Timesheet>> {
        let result = sqlx::query(
            r#"
            UPDATE timesheets
            SET status = ?, rejection_reason = ?, version = version + 1, updated_at = ?
            WHERE id = ?
            AND status = 'unapproved'
            "#,
        )
        .bind(decision.status().as_ref())
        .bind(decision.rejection_reason())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_timesheet(id).await
    }

    async fn adjust_remaining_hours(&self, username: &str, delta: Decimal) -> StoreResult<()> {
        sqlx::query("UPDATE users SET remaining_hours = remaining_hours + ? WHERE username = ?")
            .bind(delta)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_draft(&self, draft: TimesheetDraft) -> StoreResult<TimesheetDraft> {
        let mut tx = self.pool.begin().await?;

        // locks the (username, week) slot so a concurrent submit waits for us
        let submitted: Option<u64> = sqlx::query_scalar(
            "SELECT id FROM timesheets WHERE username = ? AND week_start_date = ? FOR UPDATE",
        )
        .bind(&draft.username)
        .bind(draft.week_start_date)
        .fetch_optional(&mut *tx)
        .await?;
        if submitted.is_some() {
            return Err(StoreError::Duplicate(format!(
                "timesheet for week {}",
                draft.week_start_date
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO timesheet_drafts
                (username, week_start_date, entries, work_description, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                entries = VALUES(entries),
                work_description = VALUES(work_description),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(&draft.username)
        .bind(draft.week_start_date)
        .bind(serde_json::to_string(&draft.entries)?)
        .bind(&draft.work_description)
        .bind(draft.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(draft)
    }

    async fn get_draft(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<TimesheetDraft>> {
        let row = sqlx::query_as::<_, DraftRow>(
            r#"
            SELECT username, week_start_date, entries, work_description, updated_at
            FROM timesheet_drafts
            WHERE username = ?
            AND week_start_date = ?
            "#,
        )
        .bind(username)
        .bind(week_start)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TimesheetDraft::try_from).transpose()
    }
}
