//! Shared-config synchronization with the supervised process.
//!
//! The ensemble-wide shared config is owned by the supervisor; the
//! framework only injects per-deployment overrides. The sync loop polls
//! the supervisor's state endpoint and, whenever the observed config
//! changes, overlays the overrides and pushes the result back.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ExecutorResult;

/// Polls `GET /exhibitor/v1/config/get-state` and pushes overridden configs
/// through `POST /exhibitor/v1/config/set`.
pub struct SharedConfigSync {
    client: reqwest::Client,
    /// Supervisor base URL, e.g. `http://127.0.0.1:31000`.
    base_url: String,
    overrides: HashMap<String, String>,
    backoff: Duration,
    last_seen: Option<Map<String, Value>>,
}

impl SharedConfigSync {
    pub fn new(base_url: String, overrides: HashMap<String, String>, backoff: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            overrides,
            backoff,
            last_seen: None,
        }
    }

    /// Run the poll loop until shutdown is signaled.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(backoff = ?self.backoff, "shared-config sync started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {
                    if let Err(e) = self.sync_once().await {
                        warn!(error = %e, "shared-config sync failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("shared-config sync stopping");
                    break;
                }
            }
        }
    }

    /// One poll: fetch the current shared config and push overrides when it
    /// changed since the last observation.
    async fn sync_once(&mut self) -> ExecutorResult<()> {
        let state: Value = self
            .client
            .get(format!("{}/exhibitor/v1/config/get-state", self.base_url))
            .send()
            .await?
            .json()
            .await?;
        let config = state
            .get("config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        if self.last_seen.as_ref() == Some(&config) {
            return Ok(());
        }
        debug!("shared config changed");

        let desired = apply_overrides(&config, &self.overrides);
        if desired != config {
            self.client
                .post(format!("{}/exhibitor/v1/config/set", self.base_url))
                .json(&Value::Object(desired))
                .send()
                .await?;
            info!(overrides = self.overrides.len(), "pushed shared-config overrides");
        }

        self.last_seen = Some(config);
        Ok(())
    }
}

/// Shallow overlay of string overrides onto the observed shared config.
pub fn apply_overrides(
    config: &Map<String, Value>,
    overrides: &HashMap<String, String>,
) -> Map<String, Value> {
    let mut merged = config.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    merged
}
