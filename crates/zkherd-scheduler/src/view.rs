//! Operator-facing snapshots of server state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use zkherd_model::{format_constraints, format_ranges, Server, ServerConfig, ServerState, Task};

/// A JSON-serializable snapshot of one server, as returned by the control
/// API. Ids the cluster does not know are reported as a synthetic server in
/// [`ServerState::Unknown`] rather than an error, preserving the response
/// shape for operator tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerView {
    pub id: String,
    pub state: ServerState,
    pub cpu: f64,
    pub mem: f64,
    /// Comma-range string; empty when any offered port is acceptable.
    pub ports: String,
    /// Canonical constraint spec, e.g. `hostname=unique`.
    pub constraints: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exhibitor_options: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub shared_override: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    /// The supervised node's own view of the ensemble, when reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<serde_json::Value>,
}

impl ServerView {
    /// Synthetic view for an id the cluster does not know.
    pub fn unknown(id: &str) -> Self {
        let defaults = ServerConfig::default();
        Self {
            id: id.to_string(),
            state: ServerState::Unknown,
            cpu: defaults.cpus,
            mem: defaults.mem,
            ports: String::new(),
            constraints: String::new(),
            exhibitor_options: HashMap::new(),
            shared_override: HashMap::new(),
            hostname: None,
            task: None,
            ensemble: None,
        }
    }
}

impl From<&Server> for ServerView {
    fn from(server: &Server) -> Self {
        Self {
            id: server.id.clone(),
            state: server.state,
            cpu: server.config.cpus,
            mem: server.config.mem,
            ports: format_ranges(&server.config.ports),
            constraints: format_constraints(&server.constraints),
            exhibitor_options: server.config.exhibitor_options.clone(),
            shared_override: server.config.shared_override.clone(),
            hostname: server.config.hostname.clone(),
            task: server.last_task.clone(),
            ensemble: None,
        }
    }
}
