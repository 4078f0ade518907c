use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::{Page, Pagination, Store, StoreError, StoreResult};
use crate::model::leave_request::{
    LeaveDecision, LeaveQuery, LeaveRequest, LeaveStatus, NewLeave,
};
use crate::model::timesheet::{
    ApprovalStatus, NewTimesheet, Timesheet, TimesheetChanges, TimesheetDecision, TimesheetDraft,
};
use crate::model::user::{NewUser, User, UserChanges, UserCredentials, UserQuery};

struct RefreshToken {
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    refresh_tokens: HashMap<String, RefreshToken>,
    leaves: Vec<LeaveRequest>,
    timesheets: Vec<Timesheet>,
    drafts: BTreeMap<(String, NaiveDate), TimesheetDraft>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store for development runs and tests. Nothing survives a
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: Pagination) -> Page<T> {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.per_page as usize)
        .collect();
    Page { items, total }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.write();
        if tables.users.iter().any(|c| {
            c.user.username.eq_ignore_ascii_case(&user.username)
                || c.user.email.eq_ignore_ascii_case(&user.email)
        }) {
            return Err(StoreError::Duplicate("username or email".to_string()));
        }

        let created = User {
            id: tables.next_id(),
            username: user.username,
            name: user.name,
            email: user.email,
            role: user.role,
            designation: user.designation,
            active: true,
            hourly_rate: user.hourly_rate,
            allocated_hours: user.allocated_hours,
            remaining_hours: user.allocated_hours,
            allocation_year: user.allocation_year,
            created_at: Utc::now(),
        };
        tables.users.push(UserCredentials {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|c| c.user.username == username)
            .map(|c| c.user.clone()))
    }

    async fn find_credentials(&self, login: &str) -> StoreResult<Option<UserCredentials>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|c| c.user.username == login || c.user.email.eq_ignore_ascii_case(login))
            .cloned())
    }

    async fn list_users(&self, query: &UserQuery, page: Pagination) -> StoreResult<Page<User>> {
        let search = query.search.as_deref().map(str::to_lowercase);
        let users: Vec<User> = self
            .read()
            .users
            .iter()
            .map(|c| &c.user)
            .filter(|u| query.role.is_none_or(|role| u.role == role))
            .filter(|u| query.active.is_none_or(|active| u.active == active))
            .filter(|u| {
                search.as_deref().is_none_or(|needle| {
                    u.username.to_lowercase().contains(needle)
                        || u.name.to_lowercase().contains(needle)
                        || u.email.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();
        Ok(paginate(users, page))
    }

    async fn update_user(&self, username: &str, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tables = self.write();
        if let Some(email) = &changes.email {
            if tables
                .users
                .iter()
                .any(|c| c.user.username != username && c.user.email.eq_ignore_ascii_case(email))
            {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }

        let Some(credentials) = tables.users.iter_mut().find(|c| c.user.username == username) else {
            return Ok(None);
        };
        let user = &mut credentials.user;
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(designation) = changes.designation {
            user.designation = designation;
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        if let Some(rate) = changes.hourly_rate {
            user.hourly_rate = rate;
        }
        if let Some((hours, year)) = changes.allocation {
            user.allocated_hours = hours;
            user.remaining_hours = hours;
            user.allocation_year = year;
        }
        Ok(Some(user.clone()))
    }

    async fn record_login(&self, _username: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        _username: &str,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.write().refresh_tokens.insert(
            jti.to_string(),
            RefreshToken {
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let mut tables = self.write();
        match tables.refresh_tokens.get_mut(jti) {
            Some(token) if !token.revoked && token.expires_at > Utc::now() => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_leave(&self, leave: NewLeave) -> StoreResult<LeaveRequest> {
        let mut tables = self.write();
        let now = Utc::now();
        let created = LeaveRequest {
            id: tables.next_id(),
            username: leave.username,
            email: leave.email,
            leave_type: leave.leave_type,
            from: leave.from,
            to: leave.to,
            reason: leave.reason,
            working_days: leave.working_days,
            status: LeaveStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        tables.leaves.push(created.clone());
        Ok(created)
    }

    async fn get_leave(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.read().leaves.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leave(&self, query: &LeaveQuery, page: Pagination) -> StoreResult<Page<LeaveRequest>> {
        let mut leaves: Vec<LeaveRequest> = self
            .read()
            .leaves
            .iter()
            .filter(|l| query.username.as_deref().is_none_or(|u| l.username == u))
            .filter(|l| query.status.is_none_or(|s| l.status == s))
            .filter(|l| query.leave_type.is_none_or(|t| l.leave_type == t))
            .cloned()
            .collect();
        leaves.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(leaves, page))
    }

    async fn leave_between(
        &self,
        username: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .read()
            .leaves
            .iter()
            .filter(|l| l.username == username && l.from <= to && l.to >= from)
            .cloned()
            .collect())
    }

    async fn decide_leave(&self, id: u64, decision: &LeaveDecision) -> StoreResult<Option<LeaveRequest>> {
        let mut tables = self.write();
        let Some(leave) = tables
            .leaves
            .iter_mut()
            .find(|l| l.id == id && l.status == LeaveStatus::Pending)
        else {
            return Ok(None);
        };
        leave.status = decision.status();
        leave.rejection_reason = decision.rejection_reason().map(str::to_string);
        leave.updated_at = Utc::now();
        Ok(Some(leave.clone()))
    }

    async fn submit_timesheet(&self, timesheet: NewTimesheet) -> StoreResult<Timesheet> {
        let mut tables = self.write();
        if tables
            .timesheets
            .iter()
            .any(|t| t.username == timesheet.username && t.week_start_date == timesheet.week_start_date)
        {
            return Err(StoreError::Duplicate(format!(
                "timesheet for week {}",
                timesheet.week_start_date
            )));
        }

        let now = Utc::now();
        let created = Timesheet {
            id: tables.next_id(),
            username: timesheet.username,
            week_start_date: timesheet.week_start_date,
            entries: timesheet.entries,
            work_description: timesheet.work_description,
            day_status: timesheet.day_status,
            status: ApprovalStatus::Unapproved,
            rejection_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        tables
            .drafts
            .remove(&(created.username.clone(), created.week_start_date));
        tables.timesheets.push(created.clone());
        Ok(created)
    }

    async fn get_timesheet(&self, id: u64) -> StoreResult<Option<Timesheet>> {
        Ok(self.read().timesheets.iter().find(|t| t.id == id).cloned())
    }

    async fn timesheet_for_week(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<Timesheet>> {
        Ok(self
            .read()
            .timesheets
            .iter()
            .find(|t| t.username == username && t.week_start_date == week_start)
            .cloned())
    }

    async fn list_timesheets(
        &self,
        username: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Timesheet>> {
        let mut timesheets: Vec<Timesheet> = self
            .read()
            .timesheets
            .iter()
            .filter(|t| username.is_none_or(|u| t.username == u))
            .filter(|t| from.is_none_or(|f| t.week_start_date >= f))
            .filter(|t| to.is_none_or(|end| t.week_start_date <= end))
            .cloned()
            .collect();
        timesheets.sort_by(|a, b| a.week_start_date.cmp(&b.week_start_date).then(a.id.cmp(&b.id)));
        Ok(timesheets)
    }

    async fn update_timesheet(
        &self,
        id: u64,
        expected_version: i64,
        changes: TimesheetChanges,
    ) -> StoreResult<Option<Timesheet>> {
        let mut tables = self.write();
        let Some(timesheet) = tables.timesheets.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if timesheet.version != expected_version {
            return Err(StoreError::VersionMismatch {
                current: timesheet.version,
            });
        }
        timesheet.entries = changes.entries;
        timesheet.work_description = changes.work_description;
        timesheet.day_status = changes.day_status;
        timesheet.status = ApprovalStatus::Unapproved;
        timesheet.rejection_reason = None;
        timesheet.version += 1;
        timesheet.updated_at = Utc::now();
        Ok(Some(timesheet.clone()))
    }

    async fn decide_timesheet(
        &self,
        id: u64,
        decision: &TimesheetDecision,
    ) -> StoreResult<Option<Timesheet>> {
        let mut tables = self.write();
        let Some(timesheet) = tables
            .timesheets
            .iter_mut()
            .find(|t| t.id == id && t.status == ApprovalStatus::Unapproved)
        else {
            return Ok(None);
        };
        timesheet.status = decision.status();
        timesheet.rejection_reason = decision.rejection_reason().map(str::to_string);
        timesheet.version += 1;
        timesheet.updated_at = Utc::now();
        Ok(Some(timesheet.clone()))
    }

    async fn adjust_remaining_hours(&self, username: &str, delta: Decimal) -> StoreResult<()> {
        let mut tables = self.write();
        if let Some(credentials) = tables.users.iter_mut().find(|c| c.user.username == username) {
            credentials.user.remaining_hours += delta;
        }
        Ok(())
    }

    async fn save_draft(&self, draft: TimesheetDraft) -> StoreResult<TimesheetDraft> {
        let mut tables = self.write();
        if tables
            .timesheets
            .iter()
            .any(|t| t.username == draft.username && t.week_start_date == draft.week_start_date)
        {
            return Err(StoreError::Duplicate(format!(
                "timesheet for week {}",
                draft.week_start_date
            )));
        }
        tables
            .drafts
            .insert((draft.username.clone(), draft.week_start_date), draft.clone());
        Ok(draft)
    }

    async fn get_draft(&self, username: &str, week_start: NaiveDate) -> StoreResult<Option<TimesheetDraft>> {
        Ok(self
            .read()
            .drafts
            .get(&(username.to_string(), week_start))
            .cloned())
    }
}
