//! A single supervised server: identity, lifecycle state, offer matching,
//! and task building.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ServerConfig, TaskPayload};
use crate::constraint::Constraint;
use crate::error::{ModelError, ModelResult};
use crate::offer::{ExecutorDescriptor, Offer, TaskDescriptor};
use crate::range::{format_ranges, Range};

/// Prefix shared by every task id this framework mints.
const TASK_ID_PREFIX: &str = "exhibitor";

/// Lifecycle state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    /// Declared but not yet eligible for offers.
    Added,
    /// Eligible for offers; the next matching offer launches it.
    Stopped,
    /// Launched, waiting for the cluster manager to report it running.
    Staging,
    Running,
    /// Awaiting a status update after a reconnect or restart.
    Reconciling,
    /// Synthetic state reported by the API for ids the cluster does not
    /// know. Never stored.
    Unknown,
}

/// The last task launched for a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub agent_id: String,
    pub executor_id: String,
    /// Hostname plus text attributes of the node the task was placed on.
    pub attributes: HashMap<String, String>,
}

/// Artifact file names the executor fetches, plus the endpoint serving them.
///
/// `s3credentials` and `defaultconfig` are optional; their URIs are only
/// attached to executors when the deployment provides those files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Base URL of the artifact endpoint, e.g. `http://10.0.0.1:6666`.
    pub base_url: String,
    pub jar: String,
    pub exhibitor: String,
    pub zookeeper: String,
    pub jdk: String,
    pub s3credentials: Option<String>,
    pub defaultconfig: Option<String>,
}

/// A single supervised server tracked by the scheduler.
#[derive(Debug, Clone)]
pub struct Server {
    pub id: String,
    pub state: ServerState,
    pub config: ServerConfig,
    /// Attribute name → constraints, all of which must hold at placement.
    pub constraints: BTreeMap<String, Vec<Constraint>>,
    pub last_task: Option<Task>,
    /// An operator stop was issued; the terminal status (the kill ack) lands
    /// the server in `Added` instead of `Stopped`.
    pub stop_requested: bool,
}

impl Server {
    /// Create a server in `Added` with the default `hostname=unique`
    /// constraint.
    ///
    /// Ids must be non-empty and free of `-`: task ids embed the server id
    /// between dashes and the middle segment is the authoritative back-link.
    pub fn new(id: &str) -> ModelResult<Self> {
        if id.is_empty() || id.contains('-') {
            return Err(ModelError::InvalidServerId(id.to_string()));
        }
        let mut constraints = BTreeMap::new();
        constraints.insert("hostname".to_string(), vec![Constraint::Unique]);
        Ok(Self {
            id: id.to_string(),
            state: ServerState::Added,
            config: ServerConfig::default(),
            constraints,
            last_task: None,
            stop_requested: false,
        })
    }

    /// Judge an offer against this server.
    ///
    /// Returns `None` when the offer satisfies it, otherwise the reason it
    /// was rejected. Checks run in a fixed order, each short-circuiting:
    /// port, cpus, mem, then attribute constraints (judged against
    /// `peer_attrs`, the values other servers have already bound).
    pub fn matches(
        &self,
        offer: &Offer,
        peer_attrs: &HashMap<String, Vec<String>>,
    ) -> Option<String> {
        if self.suitable_port(&offer.ports).is_none() {
            return Some(format!(
                "no suitable port in offered [{}]",
                format_ranges(&offer.ports)
            ));
        }
        if offer.cpus < self.config.cpus {
            return Some(format!("cpus {} < {}", offer.cpus, self.config.cpus));
        }
        if offer.mem < self.config.mem {
            return Some(format!("mem {} < {}", offer.mem, self.config.mem));
        }

        let mut attrs: HashMap<&str, &str> = HashMap::new();
        attrs.insert("hostname", &offer.hostname);
        for (name, value) in &offer.attributes {
            attrs.insert(name, value);
        }

        let empty = Vec::new();
        for (attr, constraints) in &self.constraints {
            let Some(value) = attrs.get(attr.as_str()) else {
                return Some(format!("offer has no attribute {attr}"));
            };
            let history = peer_attrs.get(attr).unwrap_or(&empty);
            for constraint in constraints {
                if !constraint.matches(value, history) {
                    return Some(format!("{attr} doesn't match {constraint}"));
                }
            }
        }

        None
    }

    /// Build the launch descriptor for an offer that passed [`Server::matches`].
    ///
    /// Picks the same port the match did, injects it into the supervisor
    /// options, records the placement hostname, and mints a fresh task id.
    pub fn build_task(
        &mut self,
        offer: &Offer,
        artifacts: &ArtifactSet,
    ) -> ModelResult<TaskDescriptor> {
        let port = self
            .suitable_port(&offer.ports)
            .ok_or_else(|| ModelError::NoSuitablePort(self.id.clone()))?;

        self.config
            .exhibitor_options
            .insert("port".to_string(), port.to_string());
        self.config.hostname = Some(offer.hostname.clone());

        let task_id = next_task_id(&self.id);
        let payload = TaskPayload::for_server(&self.id, &self.config).to_json()?;

        Ok(TaskDescriptor {
            task_id,
            name: format!("{TASK_ID_PREFIX}-{}", self.id),
            agent_id: offer.agent_id.clone(),
            cpus: self.config.cpus,
            mem: self.config.mem,
            port,
            payload,
            executor: executor_descriptor(&self.id, artifacts),
        })
    }

    /// The node attributes a launched task binds for constraint history:
    /// the offer's hostname plus its text attributes.
    pub fn placement_attributes(offer: &Offer) -> HashMap<String, String> {
        let mut attrs = offer.attributes.clone();
        attrs.insert("hostname".to_string(), offer.hostname.clone());
        attrs
    }

    /// Lowest offered port acceptable to this server.
    ///
    /// With no configured ranges any offered port qualifies; otherwise the
    /// configured ranges are tried in order and the first one intersecting
    /// the offer wins.
    fn suitable_port(&self, offered: &[Range]) -> Option<u64> {
        if offered.is_empty() {
            return None;
        }
        if self.config.ports.is_empty() {
            return offered.iter().map(|r| r.start).min();
        }
        for own in &self.config.ports {
            let lowest = offered
                .iter()
                .filter_map(|o| own.overlap(*o))
                .map(|r| r.start)
                .min();
            if lowest.is_some() {
                return lowest;
            }
        }
        None
    }
}

/// Mint a fresh task id: `exhibitor-<serverId>-<uuid>`.
pub fn next_task_id(server_id: &str) -> String {
    format!("{TASK_ID_PREFIX}-{server_id}-{}", Uuid::new_v4())
}

/// Recover the server id from a task id minted by [`next_task_id`].
///
/// The middle segment is authoritative; server ids never contain `-`.
pub fn id_from_task_id(task_id: &str) -> Option<&str> {
    let mut parts = task_id.splitn(3, '-');
    let prefix = parts.next()?;
    let id = parts.next()?;
    let rest = parts.next()?;
    (prefix == TASK_ID_PREFIX && !id.is_empty() && !rest.is_empty()).then_some(id)
}

/// Executor descriptor for a server: fetch artifacts into the sandbox, put
/// the JDK on `PATH`, run the executor entry point.
fn executor_descriptor(id: &str, artifacts: &ArtifactSet) -> ExecutorDescriptor {
    let mut uris = vec![
        format!("{}/jar/{}", artifacts.base_url, artifacts.jar),
        format!("{}/exhibitor/{}", artifacts.base_url, artifacts.exhibitor),
        format!("{}/zookeeper/{}", artifacts.base_url, artifacts.zookeeper),
        format!("{}/jdk/{}", artifacts.base_url, artifacts.jdk),
    ];
    if let Some(name) = &artifacts.s3credentials {
        uris.push(format!("{}/s3credentials/{}", artifacts.base_url, name));
    }
    if let Some(name) = &artifacts.defaultconfig {
        uris.push(format!("{}/defaultconfig/{}", artifacts.base_url, name));
    }

    let command = format!(
        "export PATH=$(find jdk* -maxdepth 0 -type d)/bin:$PATH && ./{} executor",
        artifacts.jar
    );

    ExecutorDescriptor {
        executor_id: id.to_string(),
        command,
        uris,
    }
}
