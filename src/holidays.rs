//! Bank holidays from the public feed. The whole feed is cached as one
//! entry and filtered in memory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calendar::HolidayCalendar;
use crate::config::Config;
use crate::model::bank_holiday::{BankHoliday, HolidayFeedDocument};

#[derive(Debug, Error)]
pub enum HolidayError {
    #[error("holiday feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("holiday file could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("holiday feed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("holiday feed has no '{0}' region")]
    MissingRegion(String),

    #[error(transparent)]
    Shared(#[from] Arc<HolidayError>),
}

/// Source of every known bank holiday for one region.
#[async_trait]
pub trait HolidayFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError>;
}

fn events_for_region(
    document: HolidayFeedDocument,
    region: &str,
) -> Result<Vec<BankHoliday>, HolidayError> {
    let division = document
        .into_iter()
        .find(|(key, _)| key == region)
        .map(|(_, division)| division)
        .ok_or_else(|| HolidayError::MissingRegion(region.to_string()))?;

    debug!(
        region,
        division = %division.division,
        events = division.events.len(),
        "Holiday feed parsed"
    );
    Ok(division.events)
}

pub struct GovUkFeed {
    client: reqwest::Client,
    url: String,
    region: String,
}

impl GovUkFeed {
    pub fn new(url: impl Into<String>, region: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("timesheet-hr/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl HolidayFeed for GovUkFeed {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError> {
        let document = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<HolidayFeedDocument>()
            .await?;

        events_for_region(document, &self.region)
    }
}

/// Same document shape as the public feed, read from disk.
pub struct FileFeed {
    path: PathBuf,
    region: String,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl HolidayFeed for FileFeed {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let document: HolidayFeedDocument = serde_json::from_str(&raw)?;
        events_for_region(document, &self.region)
    }
}

/// Fixed list, for tests.
#[cfg(test)]
pub struct FixedFeed(pub Vec<BankHoliday>);

#[cfg(test)]
#[async_trait]
impl HolidayFeed for FixedFeed {
    async fn fetch(&self) -> Result<Vec<BankHoliday>, HolidayError> {
        Ok(self.0.clone())
    }
}

pub struct HolidayService {
    feed: Arc<dyn HolidayFeed>,
    cache: Cache<(), Arc<Vec<BankHoliday>>>,
}

impl HolidayService {
    pub fn new(feed: Arc<dyn HolidayFeed>, ttl: Duration) -> Self {
        Self {
            feed,
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let feed: Arc<dyn HolidayFeed> = match &config.bank_holiday_file {
            Some(path) => {
                info!(path = %path, "Using bank holidays from file");
                Arc::new(FileFeed::new(path, config.bank_holiday_region.clone()))
            }
            None => Arc::new(GovUkFeed::new(
                config.bank_holiday_url.clone(),
                config.bank_holiday_region.clone(),
            )),
        };
        Self::new(feed, Duration::from_secs(config.holiday_cache_ttl))
    }

    /// Every holiday the feed knows. Failed fetches are not cached.
    async fn all(&self) -> Result<Arc<Vec<BankHoliday>>, HolidayError> {
        let feed = self.feed.clone();
        let holidays = self
            .cache
            .try_get_with((), async move {
                let all = feed.fetch().await?;
                debug!(count = all.len(), "Bank holidays loaded");
                Ok::<_, HolidayError>(Arc::new(all))
            })
            .await?;
        Ok(holidays)
    }

    /// Holidays dated in `year`, in feed order.
    pub async fn holidays_for_year(&self, year: i32) -> Result<Vec<BankHoliday>, HolidayError> {
        let all = self.all().await?;
        Ok(all.iter().filter(|h| h.date.year() == year).cloned().collect())
    }

    /// Holidays dated in `[from, to]`, in feed order. An inverted range
    /// yields nothing; range checks belong to the caller.
    pub async fn holidays_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BankHoliday>, HolidayError> {
        let all = self.all().await?;
        Ok(all
            .iter()
            .filter(|h| h.date >= from && h.date <= to)
            .cloned()
            .collect())
    }

    pub async fn calendar_for_year(&self, year: i32) -> Result<HolidayCalendar, HolidayError> {
        let holidays = self.holidays_for_year(year).await?;
        Ok(HolidayCalendar::from_bank_holidays(holidays.iter()))
    }

    pub async fn calendar_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HolidayCalendar, HolidayError> {
        let holidays = self.holidays_between(from, to).await?;
        Ok(HolidayCalendar::from_bank_holidays(holidays.iter()))
    }
}

/// Loads this year and next into the cache so the first leave request
/// does not wait on the feed.
pub async fn warmup_holidays(service: Arc<HolidayService>) -> Result<()> {
    let year = Utc::now().year();
    let results =
        futures::future::join_all([year, year + 1].map(|y| service.calendar_for_year(y))).await;

    for (offset, result) in results.into_iter().enumerate() {
        let y = year + offset as i32;
        match result {
            Ok(calendar) if calendar.is_empty() => warn!(year = y, "Holiday feed has no dates"),
            Ok(calendar) => info!(year = y, count = calendar.len(), "Holiday cache warmed"),
            Err(e) => return Err(anyhow::anyhow!("holiday warmup for {} failed: {}", y, e)),
        }
    }
    Ok(())
}
