//! Value types for the cluster-manager callback surface.
//!
//! The cluster manager's own RPC framing is out of scope; these are the
//! values its callbacks deliver (offers, status updates) and the
//! descriptors the scheduler emits back (task launches).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::range::Range;

/// An advertisement of currently-available resources on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub agent_id: String,
    pub hostname: String,
    pub cpus: f64,
    /// Free memory in MiB.
    pub mem: f64,
    /// Offered port ranges. Empty means the offer carries no ports resource.
    pub ports: Vec<Range>,
    /// Text-valued node attributes.
    pub attributes: HashMap<String, String>,
}

/// Task lifecycle states reported by the cluster manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    /// Whether the task can no longer transition to another state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Killed | Self::Lost | Self::Error
        )
    }
}

/// A status update for a previously launched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_id: String,
    pub agent_id: String,
    pub state: TaskState,
    pub message: Option<String>,
}

/// Everything the cluster manager needs to launch one server against an
/// offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub name: String,
    pub agent_id: String,
    pub cpus: f64,
    pub mem: f64,
    /// The single port assigned to the server; emitted as the ranges
    /// resource `[port, port]`.
    pub port: u64,
    /// Serialized [`crate::config::TaskPayload`], opaque to the cluster
    /// manager.
    pub payload: String,
    pub executor: ExecutorDescriptor,
}

/// Descriptor for the per-node executor that owns the launched task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    pub executor_id: String,
    /// Shell command that launches the executor entry point.
    pub command: String,
    /// Artifact URIs fetched into the task sandbox before launch.
    pub uris: Vec<String>,
}
