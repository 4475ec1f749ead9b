//! Maintenance stages delegated to an external service over HTTP.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

use super::maintenance::{MaintenanceStep, Stage};

/// A maintenance hook: which stage it runs in and where to POST.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaintenanceHookConfig {
    pub stage: Stage,
    pub name: String,
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Serialize)]
struct HookPayload<'a> {
    event: &'static str,
    stage: Stage,
    step: &'a str,
}

/// Runs a stage by POSTing to the configured endpoint. Any non-2xx answer
/// fails the step.
pub struct HttpHookStep {
    config: MaintenanceHookConfig,
    client: reqwest::Client,
}

impl fmt::Debug for HttpHookStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpHookStep")
            .field("stage", &self.config.stage)
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl HttpHookStep {
    pub fn new(config: MaintenanceHookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn stage(&self) -> Stage {
        self.config.stage
    }
}

#[async_trait]
impl MaintenanceStep for HttpHookStep {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self) -> Result<()> {
        let payload = HookPayload {
            event: "maintenance",
            stage: self.config.stage,
            step: &self.config.name,
        };
        self.client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        debug!(stage = ?self.config.stage, step = %self.config.name, "maintenance hook done");
        Ok(())
    }
}
