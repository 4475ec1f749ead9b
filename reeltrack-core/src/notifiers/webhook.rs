use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::{LibraryBatching, LibraryNotifier, LibraryTarget};

/// Webhook endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub batching: LibraryBatching,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Serialize)]
struct LibraryUpdatePayload<'a> {
    event: &'static str,
    show_name: &'a str,
    location: String,
}

/// Posts library updates as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LibraryNotifier for WebhookNotifier {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn updates_library(&self) -> bool {
        true
    }

    fn batching(&self) -> LibraryBatching {
        self.config.batching
    }

    async fn update_library(&self, target: &LibraryTarget) -> Result<()> {
        let payload = LibraryUpdatePayload {
            event: "library_update",
            show_name: &target.show_name,
            location: target.location.to_string_lossy().into_owned(),
        };
        self.client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        debug!(notifier = %self.config.id, show = %target.show_name, "webhook delivered");
        Ok(())
    }
}
