//! End-to-end tests over the real routes, backed by the in-memory store and
//! a fixed bank-holiday feed (Christmas and Boxing Day 2024).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::web::Data;
use actix_web::App;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use crate::api::users::bootstrap_admin;
use crate::auth::jwt::generate_access_token;
use crate::auth::password::hash_password;
use crate::calendar::Week;
use crate::config::{AdminSeed, Config};
use crate::holidays::{FixedFeed, HolidayError, HolidayFeed, HolidayService};
use crate::model::bank_holiday::BankHoliday;
use crate::model::role::Role;
use crate::model::timesheet::{NewTimesheet, TimesheetEntry};
use crate::model::user::{NewUser, User};
use crate::models::TokenPair;
use crate::notify::{LogNotifier, Notifier};
use crate::routes;
use crate::store::{MemoryStore, Store};

const PASSWORD: &str = "password123";

struct Fixture {
    config: Config,
    store: Data<dyn Store>,
    holidays: Data<HolidayService>,
    notifier: Data<dyn Notifier>,
    admin: User,
    alice: User,
    bob: User,
}

struct DownFeed;

#[async_trait]
impl HolidayFeed for DownFeed {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError> {
        Err(HolidayError::MissingRegion("england-and-wales".to_string()))
    }
}

/// Christmas feed that counts how often it is read.
#[derive(Default)]
struct CountingFeed {
    calls: AtomicUsize,
}

#[async_trait]
impl HolidayFeed for CountingFeed {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        christmas_feed().fetch().await
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn holiday(title: &str, day: NaiveDate) -> BankHoliday {
    BankHoliday {
        title: title.to_string(),
        date: day,
        notes: String::new(),
        bunting: true,
    }
}

fn christmas_feed() -> Arc<dyn HolidayFeed> {
    Arc::new(FixedFeed(vec![
        holiday("Christmas Day", date(2024, 12, 25)),
        holiday("Boxing Day", date(2024, 12, 26)),
    ]))
}

async fn seed_user(store: &dyn Store, username: &str, role: Role) -> User {
    store
        .create_user(NewUser {
            username: username.to_string(),
            name: username.to_string(),
            email: format!("{}@company.com", username),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            designation: String::new(),
            hourly_rate: dec!(20),
            allocated_hours: dec!(100),
            allocation_year: 2024,
        })
        .await
        .unwrap()
}

async fn fixture_with_feed(feed: Arc<dyn HolidayFeed>) -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let admin = seed_user(store.as_ref(), "admin", Role::Admin).await;
    let alice = seed_user(store.as_ref(), "alice", Role::User).await;
    let bob = seed_user(store.as_ref(), "bob", Role::User).await;

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    Fixture {
        config: Config::for_tests(),
        store: Data::from(store),
        holidays: Data::new(HolidayService::new(feed, Duration::from_secs(60))),
        notifier: Data::from(notifier),
        admin,
        alice,
        bob,
    }
}

async fn fixture() -> Fixture {
    fixture_with_feed(christmas_feed()).await
}

macro_rules! test_app {
    ($f:expr) => {{
        let config = $f.config.clone();
        test::init_service(
            App::new()
                .app_data($f.store.clone())
                .app_data($f.holidays.clone())
                .app_data($f.notifier.clone())
                .app_data(Data::new($f.config.clone()))
                .configure(move |cfg| routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn token(f: &Fixture, user: &User) -> String {
    generate_access_token(user, &f.config.jwt_secret, f.config.access_token_ttl).unwrap()
}

fn get(f: &Fixture, user: &User, uri: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {}", token(f, user))))
}

fn post(f: &Fixture, user: &User, uri: &str, body: Value) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {}", token(f, user))))
        .set_json(body)
}

fn put(f: &Fixture, user: &User, uri: &str, body: Value) -> TestRequest {
    TestRequest::put()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {}", token(f, user))))
        .set_json(body)
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

fn christmas_week_entries() -> Value {
    json!([{
        "id": "row-1",
        "client": "Acme",
        "project": "Website",
        "subject": "Development",
        "hours": { "2024-12-23": "8", "2024-12-24": "7.5" }
    }])
}

/* =========================
Auth
========================= */

#[actix_web::test]
async fn rejects_requests_without_a_bearer_token() {
    let f = fixture().await;
    let app = test_app!(f);

    let req = TestRequest::get().uri("/api/me").peer_addr(peer()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn refresh_tokens_rotate_and_cannot_be_reused() {
    let f = fixture().await;
    let app = test_app!(f);

    let req = TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer())
        .set_json(json!({ "login": "alice@company.com", "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let first: TokenPair = test::read_body_json(resp).await;

    // refresh tokens never open the API
    let req = TestRequest::get()
        .uri("/api/me")
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {}", first.refresh_token)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let refresh = |token: &str| {
        TestRequest::post()
            .uri("/auth/refresh")
            .peer_addr(peer())
            .set_json(json!({ "refreshToken": token }))
            .to_request()
    };

    let resp = test::call_service(&app, refresh(&first.refresh_token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: TokenPair = test::read_body_json(resp).await;

    let resp = test::call_service(&app, refresh(&first.refresh_token)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::get()
        .uri("/api/me")
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {}", second.access_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["username"], "alice");
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let f = fixture().await;
    let app = test_app!(f);

    let req = TestRequest::post()
        .uri("/auth/login")
        .peer_addr(peer())
        .set_json(json!({ "login": "alice", "password": "not-the-password" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn bootstrap_admin_is_created_once() {
    let store = MemoryStore::new();
    let seed = AdminSeed {
        username: "root".to_string(),
        email: "Root@Company.com".to_string(),
        password: "change-me-now".to_string(),
    };

    bootstrap_admin(&store, &seed).await.unwrap();
    bootstrap_admin(&store, &seed).await.unwrap();

    let root = store.get_user("root").await.unwrap().unwrap();
    assert_eq!(root.role, Role::Admin);
    assert_eq!(root.email, "root@company.com");
}

/* =========================
Users
========================= */

#[actix_web::test]
async fn only_admins_manage_users() {
    let f = fixture().await;
    let app = test_app!(f);

    let new_user = json!({
        "username": "carol",
        "name": "Carol",
        "email": "carol@company.com",
        "password": "long-enough",
        "hourlyRate": "30"
    });

    let resp = test::call_service(&app, post(&f, &f.alice, "/api/users", new_user.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, post(&f, &f.admin, "/api/users", new_user.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["role"], "user");
    assert!(created.get("password").is_none());

    let resp = test::call_service(&app, post(&f, &f.admin, "/api/users", new_user).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, get(&f, &f.alice, "/api/users/bob").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, get(&f, &f.alice, "/api/users/alice").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

/* =========================
Leave
========================= */

#[actix_web::test]
async fn christmas_week_is_three_working_days() {
    let f = fixture().await;
    let app = test_app!(f);

    let body = json!({
        "leaveType": "holiday",
        "from": "2024-12-23",
        "to": "2024-12-29",
        "reason": "Christmas",
        "workingDays": 7
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let leave: Value = test::read_body_json(resp).await;
    assert_eq!(leave["workingDays"], 3);
    assert_eq!(leave["status"], "pending");
    assert_eq!(leave["username"], "alice");
}

#[actix_web::test]
async fn leave_needs_a_reason_and_an_ordered_range() {
    let f = fixture().await;
    let app = test_app!(f);

    let no_reason = json!({ "leaveType": "holiday", "from": "2024-12-23", "reason": "  " });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", no_reason).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let inverted = json!({
        "leaveType": "holiday",
        "from": "2024-12-27",
        "to": "2024-12-23",
        "reason": "Backwards"
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", inverted).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_RANGE");
    assert_eq!(body["details"]["from"], "2024-12-27");
}

#[actix_web::test]
async fn leave_may_span_at_most_a_year() {
    let f = fixture().await;
    let app = test_app!(f);

    // 2024 is a leap year: 366 days inclusive
    let whole_year = json!({ "leaveType": "work_from_home", "from": "2024-01-01", "to": "2024-12-31", "reason": "Remote" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", whole_year).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let one_more = json!({ "leaveType": "work_from_home", "from": "2024-01-01", "to": "2025-01-01", "reason": "Remote" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", one_more).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_RANGE");
    assert_eq!(body["details"]["days"], 367);
}

#[actix_web::test]
async fn half_day_counts_as_half_in_the_summary() {
    let f = fixture().await;
    let app = test_app!(f);

    let body = json!({ "leaveType": "half_day", "from": "2024-03-05", "reason": "Dentist" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", body).to_request()).await;
    let leave: Value = test::read_body_json(resp).await;
    let id = leave["id"].as_u64().unwrap();

    let uri = format!("/api/leave/{}/approve", id);
    let resp = test::call_service(&app, put(&f, &f.admin, &uri, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, get(&f, &f.alice, "/api/leave/summary?year=2024").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = test::read_body_json(resp).await;
    assert_eq!(decimal(&summary["daysOff"]), dec!(0.5));
    assert_eq!(summary["approved"], 1);
}

#[actix_web::test]
async fn decisions_are_admin_only_and_happen_once() {
    let f = fixture().await;
    let app = test_app!(f);

    let body = json!({ "leaveType": "sick_leave", "from": "2024-12-23", "to": "2024-12-24", "reason": "Flu" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", body).to_request()).await;
    let leave: Value = test::read_body_json(resp).await;
    let id = leave["id"].as_u64().unwrap();

    let reject = format!("/api/leave/{}/reject", id);
    let resp = test::call_service(&app, put(&f, &f.alice, &reject, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(
        &app,
        put(&f, &f.admin, &reject, json!({ "reason": "Overlaps the release" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rejected: Value = test::read_body_json(resp).await;
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["rejectionReason"], "Overlaps the release");

    let approve = format!("/api/leave/{}/approve", id);
    let resp = test::call_service(&app, put(&f, &f.admin, &approve, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, put(&f, &f.admin, "/api/leave/9999/approve", json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn users_only_see_their_own_leave() {
    let f = fixture().await;
    let app = test_app!(f);

    let body = json!({ "leaveType": "holiday", "from": "2024-12-23", "reason": "Family" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", body).to_request()).await;
    let leave: Value = test::read_body_json(resp).await;
    let uri = format!("/api/leave/{}", leave["id"]);

    let resp = test::call_service(&app, get(&f, &f.bob, &uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, get(&f, &f.bob, "/api/leave?username=alice").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, get(&f, &f.bob, "/api/leave").to_request()).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list["total"], 0);

    let resp = test::call_service(&app, get(&f, &f.admin, "/api/leave").to_request()).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list["total"], 1);
}

#[actix_web::test]
async fn leave_fails_upstream_when_the_feed_is_down() {
    let f = fixture_with_feed(Arc::new(DownFeed)).await;
    let app = test_app!(f);

    let body = json!({ "leaveType": "holiday", "from": "2024-12-23", "reason": "Family" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}

/* =========================
Timesheets
========================= */

#[actix_web::test]
async fn submitting_a_week_removes_its_draft() {
    let f = fixture().await;
    let app = test_app!(f);

    let draft = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, put(&f, &f.alice, "/api/timesheets/drafts", draft).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/week?date=2024-12-27").to_request(),
    )
    .await;
    let view: Value = test::read_body_json(resp).await;
    assert_eq!(view["source"], "draft");

    let submit = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let timesheet: Value = test::read_body_json(resp).await;
    assert_eq!(timesheet["status"], "unapproved");
    assert_eq!(timesheet["dayStatus"]["2024-12-25"], "bank-holiday");

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/drafts?weekStartDate=2024-12-23").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/week?date=2024-12-27").to_request(),
    )
    .await;
    let view: Value = test::read_body_json(resp).await;
    assert_eq!(view["source"], "timesheet");
    assert_eq!(decimal(&view["totals"]["total"]), dec!(15.5));
}

#[actix_web::test]
async fn week_must_start_on_monday_and_hours_stay_in_range() {
    let f = fixture().await;
    let app = test_app!(f);

    let tuesday = json!({ "weekStartDate": "2024-12-24", "entries": [] });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", tuesday).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let too_long = json!({
        "weekStartDate": "2024-12-23",
        "entries": [{ "client": "Acme", "project": "Web", "subject": "Dev", "hours": { "2024-12-23": "25" } }]
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", too_long).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let next_week = json!({
        "weekStartDate": "2024-12-23",
        "entries": [{ "client": "Acme", "project": "Web", "subject": "Dev", "hours": { "2024-12-30": "8" } }]
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", next_week).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn stale_version_is_a_conflict_with_the_current_version() {
    let f = fixture().await;
    let app = test_app!(f);

    let submit = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit).to_request()).await;
    let timesheet: Value = test::read_body_json(resp).await;
    let uri = format!("/api/timesheets/{}", timesheet["id"]);
    let version = timesheet["version"].as_i64().unwrap();

    let edit = json!({ "version": version, "entries": christmas_week_entries(), "workDescription": "v2" });
    let resp = test::call_service(&app, put(&f, &f.alice, &uri, edit.clone()).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["version"], version + 1);

    let resp = test::call_service(&app, put(&f, &f.alice, &uri, edit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VERSION_MISMATCH");
    assert_eq!(body["details"]["currentVersion"], version + 1);

    let resp = test::call_service(&app, get(&f, &f.bob, &uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn empty_week_shows_holidays_and_weekends() {
    let f = fixture().await;
    let app = test_app!(f);

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/timesheets/week?date=2024-12-25").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = test::read_body_json(resp).await;
    assert_eq!(view["source"], "empty");
    assert_eq!(view["weekStartDate"], "2024-12-23");
    assert_eq!(view["weekEndDate"], "2024-12-29");
    assert_eq!(view["dayStatus"]["2024-12-23"], "working");
    assert_eq!(view["dayStatus"]["2024-12-26"], "bank-holiday");
    assert_eq!(view["dayStatus"]["2024-12-28"], "not-working");
}

#[actix_web::test]
async fn approval_feeds_budget_and_payroll() {
    let f = fixture().await;
    let app = test_app!(f);

    let submit = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit).to_request()).await;
    let timesheet: Value = test::read_body_json(resp).await;

    // nothing approved yet
    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/payroll/summary?year=2024").to_request(),
    )
    .await;
    let summary: Value = test::read_body_json(resp).await;
    assert_eq!(summary["lines"].as_array().unwrap().len(), 0);

    let approve = format!("/api/timesheets/{}/approve", timesheet["id"]);
    let resp = test::call_service(&app, put(&f, &f.admin, &approve, json!({})).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/payroll/summary?year=2024&period=monthly").to_request(),
    )
    .await;
    let summary: Value = test::read_body_json(resp).await;
    let lines = summary["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["periodStart"], "2024-12-01");
    assert_eq!(lines[0]["periodEnd"], "2024-12-31");
    assert_eq!(decimal(&summary["totalHours"]), dec!(15.5));
    assert_eq!(decimal(&summary["totalPay"]), dec!(310));

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/payroll/budget?date=2024-12-01").to_request(),
    )
    .await;
    let budget: Value = test::read_body_json(resp).await;
    assert_eq!(budget["financialYear"], "2024-2025");
    assert_eq!(decimal(&budget["allocatedHours"]), dec!(100));
    assert_eq!(decimal(&budget["remainingHours"]), dec!(84.5));
    assert_eq!(decimal(&budget["loggedHours"]), dec!(15.5));

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/payroll/summary?username=alice").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn weekly_report_lists_every_week_in_range() {
    let f = fixture().await;
    let app = test_app!(f);

    let submit = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit).to_request()).await;

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/report?from=2024-12-18&to=2025-01-02").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;
    let weeks = report["weeks"].as_array().unwrap();
    assert_eq!(weeks.len(), 3);
    assert_eq!(weeks[1]["weekStartDate"], "2024-12-23");
    assert_eq!(weeks[1]["status"], "unapproved");
    assert!(weeks[0]["status"].is_null());
    assert_eq!(decimal(&report["totalHours"]), dec!(15.5));
}

#[actix_web::test]
async fn sent_day_statuses_cover_exactly_the_week() {
    let f = fixture().await;
    let app = test_app!(f);

    let foreign = json!({
        "weekStartDate": "2024-12-23",
        "entries": christmas_week_entries(),
        "dayStatus": { "1999-01-01": "sick" }
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", foreign).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let partial = json!({
        "weekStartDate": "2024-12-23",
        "entries": christmas_week_entries(),
        "dayStatus": { "2024-12-24": "sick" }
    });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", partial).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let timesheet: Value = test::read_body_json(resp).await;
    let status = timesheet["dayStatus"].as_object().unwrap();
    assert_eq!(status.len(), 7);
    assert_eq!(status["2024-12-23"], "working");
    assert_eq!(status["2024-12-24"], "sick");
    assert_eq!(status["2024-12-29"], "not-working");

    let uri = format!("/api/timesheets/{}", timesheet["id"]);
    let edit = json!({
        "version": timesheet["version"],
        "entries": christmas_week_entries(),
        "dayStatus": { "2024-12-23": "holiday" }
    });
    let resp = test::call_service(&app, put(&f, &f.alice, &uri, edit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["dayStatus"]["2024-12-23"], "holiday");
    assert_eq!(updated["dayStatus"]["2024-12-24"], "sick");

    let edit = json!({
        "version": updated["version"],
        "entries": christmas_week_entries(),
        "dayStatus": { "2024-12-30": "holiday" }
    });
    let resp = test::call_service(&app, put(&f, &f.alice, &uri, edit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn drafts_are_refused_for_a_submitted_week() {
    let f = fixture().await;
    let app = test_app!(f);

    let submit = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/timesheets", submit).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let draft = json!({ "weekStartDate": "2024-12-23", "entries": christmas_week_entries() });
    let resp = test::call_service(&app, put(&f, &f.alice, "/api/timesheets/drafts", draft).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/drafts?weekStartDate=2024-12-23").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn week_matched_by_entry_dates_gets_statuses_for_the_asked_week() {
    let f = fixture().await;
    let app = test_app!(f);

    // stored under the previous Monday, but its hours fall in Christmas week
    let stored_week = Week::starting(date(2024, 12, 16)).unwrap();
    f.store
        .submit_timesheet(NewTimesheet {
            username: "alice".to_string(),
            week_start_date: stored_week.start(),
            entries: vec![TimesheetEntry {
                id: "legacy".to_string(),
                client: "Acme".to_string(),
                project: "Website".to_string(),
                subject: "Support".to_string(),
                hours: BTreeMap::from([("2024-12-24".to_string(), "6".to_string())]),
            }],
            work_description: String::new(),
            day_status: stored_week.default_day_status(),
        })
        .await
        .unwrap();

    let resp = test::call_service(
        &app,
        get(&f, &f.alice, "/api/timesheets/week?date=2024-12-25").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = test::read_body_json(resp).await;
    assert_eq!(view["source"], "timesheet");
    assert_eq!(view["timesheet"]["weekStartDate"], "2024-12-16");

    let status = view["dayStatus"].as_object().unwrap();
    assert_eq!(status.len(), 7);
    assert!(!status.contains_key("2024-12-16"));
    assert_eq!(status["2024-12-25"], "bank-holiday");
    assert_eq!(decimal(&view["totals"]["total"]), dec!(6));
}

#[actix_web::test]
async fn dates_beyond_four_digit_years_are_bad_requests() {
    let f = fixture().await;
    let app = test_app!(f);

    for uri in [
        "/api/calendar/week?date=%2B262142-12-31",
        "/api/timesheets/week?date=%2B262142-12-31",
        "/api/timesheets/report?from=2024-12-23&to=%2B262142-12-31",
        "/api/calendar/working-days?from=%2B262142-12-31",
    ] {
        let resp = test::call_service(&app, get(&f, &f.alice, uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    let draft = json!({ "weekStartDate": "+262142-12-31", "entries": [] });
    let resp = test::call_service(&app, put(&f, &f.alice, "/api/timesheets/drafts", draft).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let leave = json!({ "leaveType": "holiday", "from": "+262142-12-31", "reason": "Far away" });
    let resp = test::call_service(&app, post(&f, &f.alice, "/api/leave", leave).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

/* =========================
Calendar
========================= */

#[actix_web::test]
async fn calendar_endpoints_use_the_holiday_feed() {
    let f = fixture().await;
    let app = test_app!(f);

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/calendar/working-days?from=2024-12-23&to=2024-12-29").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let days: Value = test::read_body_json(resp).await;
    assert_eq!(days["workingDays"], 3);
    assert_eq!(days["holidays"].as_array().unwrap().len(), 2);

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/calendar/working-days?from=2024-12-25&leaveType=bank_holiday").to_request(),
    )
    .await;
    let days: Value = test::read_body_json(resp).await;
    assert_eq!(days["workingDays"], 1);

    let resp = test::call_service(&app, get(&f, &f.bob, "/api/holidays?year=2024").to_request()).await;
    let holidays: Value = test::read_body_json(resp).await;
    assert_eq!(holidays["holidays"][0]["title"], "Christmas Day");

    let resp = test::call_service(&app, get(&f, &f.bob, "/api/calendar/week?date=2024-12-25").to_request()).await;
    let week: Value = test::read_body_json(resp).await;
    assert_eq!(week["weekStartDate"], "2024-12-23");
    assert_eq!(week["dates"].as_array().unwrap().len(), 7);
}

#[actix_web::test]
async fn long_ranges_are_refused_and_the_feed_is_read_once() {
    let feed = Arc::new(CountingFeed::default());
    let f = fixture_with_feed(feed.clone()).await;
    let app = test_app!(f);

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/calendar/working-days?from=2000-01-01&to=2999-12-31").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_RANGE");
    assert_eq!(feed.calls.load(Ordering::SeqCst), 0);

    for uri in [
        "/api/calendar/working-days?from=2024-06-01&to=2025-05-31",
        "/api/calendar/working-days?from=2030-01-01&to=2030-12-31",
        "/api/holidays?year=1999",
        "/api/calendar/week?date=2024-12-25",
    ] {
        let resp = test::call_service(&app, get(&f, &f.bob, uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
    }
    assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn half_day_on_a_bank_holiday_takes_nothing_off() {
    let f = fixture().await;
    let app = test_app!(f);

    let resp = test::call_service(
        &app,
        get(&f, &f.bob, "/api/calendar/working-days?from=2024-12-25&leaveType=half_day").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let days: Value = test::read_body_json(resp).await;
    assert_eq!(days["workingDays"], 0);
    assert_eq!(decimal(&days["daysOff"]), Decimal::ZERO);
}
