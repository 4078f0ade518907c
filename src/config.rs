use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use strum_macros::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Mysql,
    Memory,
}

/// First admin account, created at start-up when no user has that name.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub store_backend: StoreBackend,
    /// Required when the backend is MySQL.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Bank holidays
    pub bank_holiday_url: String,
    pub bank_holiday_region: String,
    pub bank_holiday_file: Option<String>,
    pub holiday_cache_ttl: u64,

    pub notify_webhook_url: Option<String>,

    pub bootstrap_admin: Option<AdminSeed>,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(key, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = parse_var::<StoreBackend>("STORE_BACKEND", "mysql")?;
        let database_url = optional_var("DATABASE_URL");
        if store_backend == StoreBackend::Mysql && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=mysql");
        }

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }

        let api_prefix = var_or("API_PREFIX", "/api");
        if !api_prefix.starts_with('/') {
            bail!("API_PREFIX must start with '/'");
        }

        let bootstrap_admin = match (
            optional_var("BOOTSTRAP_ADMIN_USERNAME"),
            optional_var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(AdminSeed {
                email: var_or("BOOTSTRAP_ADMIN_EMAIL", &format!("{}@localhost.localdomain", username)),
                username,
                password,
            }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080"),
            store_backend,
            database_url,
            jwt_secret,
            access_token_ttl: parse_var("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parse_var("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parse_var("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: parse_var("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parse_var("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix,

            bank_holiday_url: var_or("BANK_HOLIDAY_URL", "https://www.gov.uk/bank-holidays.json"),
            bank_holiday_region: var_or("BANK_HOLIDAY_REGION", "england-and-wales"),
            bank_holiday_file: optional_var("BANK_HOLIDAY_FILE"),
            holiday_cache_ttl: parse_var("HOLIDAY_CACHE_TTL", "86400")?,

            notify_webhook_url: optional_var("NOTIFY_WEBHOOK_URL"),

            bootstrap_admin,

            log_dir: var_or("LOG_DIR", "logs"),
            log_level: parse_var("LOG_LEVEL", "info")?,
        })
    }

    /// Settings for in-process runs and the HTTP tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt_secret: "test-secret-with-enough-length".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_protected_per_min: 10_000,
            api_prefix: "/api".to_string(),
            bank_holiday_url: String::new(),
            bank_holiday_region: "england-and-wales".to_string(),
            bank_holiday_file: None,
            holiday_cache_ttl: 60,
            notify_webhook_url: None,
            bootstrap_admin: None,
            log_dir: "logs".to_string(),
            log_level: tracing::Level::DEBUG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-wide.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const KEYS: [&str; 9] = [
        "STORE_BACKEND",
        "DATABASE_URL",
        "JWT_SECRET",
        "ACCESS_TOKEN_TTL",
        "API_PREFIX",
        "LOG_LEVEL",
        "BOOTSTRAP_ADMIN_USERNAME",
        "BOOTSTRAP_ADMIN_PASSWORD",
        "BOOTSTRAP_ADMIN_EMAIL",
    ];

    fn with_env(vars: &[(&str, &str)], check: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        // SAFETY: serialised by ENV_LOCK and no other thread reads these keys.
        unsafe {
            for key in KEYS {
                env::remove_var(key);
            }
            for (key, value) in vars {
                env::set_var(key, value);
            }
        }
        check();
        unsafe {
            for key in KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn memory_backend_needs_no_database() {
        with_env(
            &[("STORE_BACKEND", "memory"), ("JWT_SECRET", "0123456789abcdef")],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.store_backend, StoreBackend::Memory);
                assert!(config.database_url.is_none());
                assert_eq!(config.access_token_ttl, 900);
                assert_eq!(config.api_prefix, "/api");
                assert_eq!(config.log_level, tracing::Level::INFO);
            },
        );
    }

    #[test]
    fn mysql_backend_requires_database_url() {
        with_env(&[("JWT_SECRET", "0123456789abcdef")], || {
            let err = Config::from_env().err().unwrap();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }

    #[test]
    fn rejects_malformed_numbers() {
        with_env(
            &[
                ("STORE_BACKEND", "memory"),
                ("JWT_SECRET", "0123456789abcdef"),
                ("ACCESS_TOKEN_TTL", "soon"),
            ],
            || {
                let err = Config::from_env().err().unwrap();
                assert!(err.to_string().contains("ACCESS_TOKEN_TTL"));
            },
        );
    }

    #[test]
    fn rejects_short_secret() {
        with_env(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", "short")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn bootstrap_admin_needs_both_name_and_password() {
        with_env(
            &[
                ("STORE_BACKEND", "memory"),
                ("JWT_SECRET", "0123456789abcdef"),
                ("BOOTSTRAP_ADMIN_USERNAME", "root"),
            ],
            || assert!(Config::from_env().is_err()),
        );

        with_env(
            &[
                ("STORE_BACKEND", "memory"),
                ("JWT_SECRET", "0123456789abcdef"),
                ("BOOTSTRAP_ADMIN_USERNAME", "root"),
                ("BOOTSTRAP_ADMIN_PASSWORD", "change-me-now"),
            ],
            || {
                let seed = Config::from_env().unwrap().bootstrap_admin.unwrap();
                assert_eq!(seed.username, "root");
                assert_eq!(seed.email, "root@localhost.localdomain");
            },
        );
    }
}
