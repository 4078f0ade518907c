//! Best-effort notifications after a state change. A failure here is
//! logged and never undoes the change that triggered it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::model::leave_request::LeaveRequest;
use crate::model::timesheet::Timesheet;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    LeaveSubmitted { leave: LeaveRequest },
    LeaveDecided { leave: LeaveRequest },
    TimesheetDecided { timesheet: Timesheet },
}

impl Notification {
    fn recipient(&self) -> &str {
        match self {
            Notification::LeaveSubmitted { leave } | Notification::LeaveDecided { leave } => {
                &leave.username
            }
            Notification::TimesheetDecided { timesheet } => &timesheet.username,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Sends and swallows any failure.
pub async fn notify(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.deliver(&notification).await {
        warn!(
            error = %e,
            recipient = notification.recipient(),
            "Notification failed, change kept"
        );
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            recipient = notification.recipient(),
            payload = %serde_json::to_string(notification)?,
            "Notification"
        );
        Ok(())
    }
}

/// Posts the notification as JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("timesheet-hr/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub fn from_config(config: &Config) -> Arc<dyn Notifier> {
    match &config.notify_webhook_url {
        Some(url) => {
            info!(url = %url, "Notifications go to webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    }
}
