use crate::{
    api::{calendar, holidays, leave_request, payroll, timesheet, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use tracing::warn;

/// Malformed bodies, queries and paths come back in the usual error shape.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let burst = requests_per_min.max(1);
        let per_ms = (60_000 / burst as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(|| {
                warn!(requests_per_min, "Invalid rate limit, using governor defaults");
                GovernorConfig::default()
            });
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.configure(extractor_config);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/users")
                    // /users
                    .service(
                        web::resource("")
                            .route(web::get().to(users::list_users))
                            .route(web::post().to(users::create_user)),
                    )
                    // /users/{username}
                    .service(
                        web::resource("/{username}")
                            .route(web::get().to(users::get_user))
                            .route(web::put().to(users::update_user)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/summary, before /leave/{id}
                    .service(
                        web::resource("/summary").route(web::get().to(leave_request::leave_summary)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/timesheets")
                    // /timesheets
                    .service(
                        web::resource("")
                            .route(web::get().to(timesheet::list_timesheets))
                            .route(web::post().to(timesheet::submit_timesheet)),
                    )
                    .service(web::resource("/week").route(web::get().to(timesheet::week_view)))
                    .service(web::resource("/report").route(web::get().to(timesheet::weekly_report)))
                    .service(
                        web::resource("/drafts")
                            .route(web::get().to(timesheet::get_draft))
                            .route(web::put().to(timesheet::save_draft)),
                    )
                    // /timesheets/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(timesheet::get_timesheet))
                            .route(web::put().to(timesheet::update_timesheet)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(timesheet::approve_timesheet)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(timesheet::reject_timesheet)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(web::resource("/summary").route(web::get().to(payroll::payroll_summary)))
                    .service(web::resource("/budget").route(web::get().to(payroll::hours_budget))),
            )
            .service(
                web::scope("/calendar")
                    .service(
                        web::resource("/working-days").route(web::get().to(calendar::working_days)),
                    )
                    .service(web::resource("/week").route(web::get().to(calendar::week))),
            )
            .service(web::resource("/holidays").route(web::get().to(holidays::list_holidays))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, the old refresh token is revoked
