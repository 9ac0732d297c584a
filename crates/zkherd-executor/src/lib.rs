//! zkherd-executor — the per-node supervisor driver.
//!
//! Owns exactly one task: it parses the task payload the scheduler built,
//! execs the packaged supervisor binary (Exhibitor fronting one ZooKeeper
//! server), and keeps the ensemble-wide shared config in sync with the
//! deployment's overrides. Quorum and the shared-config merge itself are
//! the supervised process's business, not ours.

pub mod config_sync;
pub mod error;
pub mod supervisor;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use zkherd_model::TaskPayload;

pub use config_sync::{apply_overrides, SharedConfigSync};
pub use error::{ExecutorError, ExecutorResult};
pub use supervisor::{Supervisor, SupervisorSpec};

/// Parse the task payload the scheduler serialized into the launch.
pub fn parse_payload(raw: &str) -> ExecutorResult<TaskPayload> {
    Ok(TaskPayload::from_json(raw)?)
}

/// The port the scheduler assigned, from the payload's option map.
pub fn assigned_port(payload: &TaskPayload) -> ExecutorResult<u16> {
    payload
        .exhibitor_config
        .get("port")
        .and_then(|p| p.parse().ok())
        .ok_or(ExecutorError::MissingPort)
}

/// Run one task to completion: spawn the supervisor, sync shared config,
/// tear down on shutdown or child exit.
pub async fn run(
    payload: TaskPayload,
    supervisor_bin: PathBuf,
    shutdown: watch::Receiver<bool>,
) -> ExecutorResult<()> {
    let port = assigned_port(&payload)?;
    info!(server = %payload.id, host = %payload.hostname, port, "executor starting");

    let spec = SupervisorSpec {
        binary: supervisor_bin,
        port,
        options: payload
            .exhibitor_config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    };
    let mut supervisor = Supervisor::spawn(&spec)?;

    let mut sync = SharedConfigSync::new(
        format!("http://127.0.0.1:{port}"),
        payload.shared_config_override.clone(),
        Duration::from_millis(payload.shared_config_change_backoff),
    );

    tokio::select! {
        status = supervisor.wait() => {
            let status = status?;
            warn!(server = %payload.id, %status, "supervisor exited");
        }
        _ = sync.run(shutdown) => {
            supervisor.shutdown().await?;
        }
    }

    info!(server = %payload.id, "executor stopped");
    Ok(())
}
