//! Outbound notifications to the care team.
//!
//! Delivery is one attempt on a spawned task. A failed notification is
//! logged and never affects the request that triggered it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::consultation::Consultation;

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Post events to `webhook_url` instead of only logging them.
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// A new consultation request awaiting a clinician.
///
/// Carries identifiers only; the complaint text stays in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultationEvent {
    pub event: &'static str,
    pub consultation_id: String,
    pub membership_id: String,
    pub person_id: String,
    pub created_at: String,
}

impl From<&Consultation> for ConsultationEvent {
    fn from(consultation: &Consultation) -> Self {
        Self {
            event: "consultation.requested",
            consultation_id: consultation.id.clone(),
            membership_id: consultation.membership_id.clone(),
            person_id: consultation.person_id.clone(),
            created_at: consultation.created_at.clone(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn consultation_requested(&self, event: &ConsultationEvent) -> Result<()>;
}

/// Writes events to the log only.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn consultation_requested(&self, event: &ConsultationEvent) -> Result<()> {
        info!(
            consultation_id = %event.consultation_id,
            membership_id = %event.membership_id,
            "Consultation requested"
        );
        Ok(())
    }
}

/// Posts events as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn consultation_requested(&self, event: &ConsultationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Webhook {} responded with {}", self.url, status);
        }
        Ok(())
    }
}

/// Build the notifier described by `config`.
pub fn from_config(config: &NotificationsConfig) -> Result<Arc<dyn Notifier>> {
    match (&config.webhook_url, config.enabled) {
        (Some(url), true) => {
            let timeout = Duration::from_secs(config.timeout_secs.max(1));
            Ok(Arc::new(WebhookNotifier::new(url.clone(), timeout)?))
        }
        (None, true) => {
            warn!("Notifications enabled without webhook_url, logging only");
            Ok(Arc::new(LogNotifier))
        }
        _ => Ok(Arc::new(LogNotifier)),
    }
}

/// Send `event` on a background task.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: ConsultationEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = notifier.consultation_requested(&event).await {
            warn!(
                consultation_id = %event.consultation_id,
                "Notification failed: {err:#}"
            );
        }
    })
}
