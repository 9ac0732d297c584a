//! Per-server desired configuration and the serialized task payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::range::{format_ranges, Range};

/// Supervisor option keys the control plane recognizes.
pub const EXHIBITOR_OPTION_KEYS: &[&str] = &[
    "configtype",
    "zkconfigconnect",
    "zkconfigzpath",
    "s3credentials",
    "s3region",
    "s3config",
    "s3configprefix",
];

/// Shared-config override keys the control plane recognizes.
pub const SHARED_OVERRIDE_KEYS: &[&str] = &[
    "zookeeper-install-directory",
    "zookeeper-data-directory",
];

/// Desired configuration for one supervised server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Passthrough options handed to the supervisor process.
    pub exhibitor_options: HashMap<String, String>,
    /// Overrides injected into the ensemble-wide shared config.
    pub shared_override: HashMap<String, String>,
    pub cpus: f64,
    /// Memory in MiB.
    pub mem: f64,
    /// Acceptable ports. Empty means any offered port will do.
    pub ports: Vec<Range>,
    /// Delay between shared-config polls on the executor, in milliseconds.
    pub shared_config_change_backoff: u64,
    /// Hostname of the node the server was placed on.
    pub hostname: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            exhibitor_options: HashMap::new(),
            shared_override: HashMap::new(),
            cpus: 0.2,
            mem: 256.0,
            ports: Vec::new(),
            shared_config_change_backoff: 10_000,
            hostname: None,
        }
    }
}

/// The task payload handed to the executor. The cluster manager treats it
/// as opaque bytes; the executor parses it back with [`TaskPayload::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(rename = "exhibitorConfig")]
    pub exhibitor_config: HashMap<String, String>,
    #[serde(rename = "sharedConfigOverride")]
    pub shared_config_override: HashMap<String, String>,
    pub id: String,
    pub hostname: String,
    #[serde(rename = "sharedConfigChangeBackoff")]
    pub shared_config_change_backoff: u64,
    pub cpu: f64,
    pub mem: f64,
    /// Comma-range string, e.g. `"31000,31100-31110"`.
    pub ports: String,
}

impl TaskPayload {
    /// Snapshot a placed server's configuration into its payload form.
    pub fn for_server(id: &str, config: &ServerConfig) -> Self {
        Self {
            exhibitor_config: config.exhibitor_options.clone(),
            shared_config_override: config.shared_override.clone(),
            id: id.to_string(),
            hostname: config.hostname.clone().unwrap_or_default(),
            shared_config_change_backoff: config.shared_config_change_backoff,
            cpu: config.cpus,
            mem: config.mem,
            ports: format_ranges(&config.ports),
        }
    }

    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
