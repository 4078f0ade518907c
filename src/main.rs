use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod calendar;
mod config;
mod db;
mod docs;
mod error;
mod holidays;
mod model;
mod models;
mod notify;
mod routes;
mod store;

#[cfg(test)]
mod tests;

use config::{Config, StoreBackend};
use db::init_db;
use holidays::{HolidayService, warmup_holidays};
use store::{MemoryStore, MySqlStore, Store};

use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Timesheet service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(backend = ?config.store_backend, "Server starting...");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Mysql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORE_BACKEND=mysql")?;
            Arc::new(MySqlStore::new(init_db(url).await?))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(seed) = &config.bootstrap_admin {
        api::users::bootstrap_admin(store.as_ref(), seed).await?;
    }

    let holidays = Arc::new(HolidayService::from_config(&config));
    let notifier = notify::from_config(&config);

    let holidays_for_warmup = holidays.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_holidays(holidays_for_warmup).await {
            warn!(error = %e, "Failed to warm up bank holidays");
        }
    });

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let store_data = Data::from(store);
    let holiday_data = Data::from(holidays);
    let notifier_data = Data::from(notifier);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store_data.clone())
            .app_data(holiday_data.clone())
            .app_data(notifier_data.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}
