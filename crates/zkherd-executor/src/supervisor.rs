//! The supervised child process.
//!
//! The executor does not embed the supervisor library; it execs the
//! packaged supervisor binary and drives it over its HTTP surface.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::process::{Child, Command};
use tracing::info;

use crate::error::ExecutorResult;

/// How to launch the supervisor binary.
#[derive(Debug, Clone)]
pub struct SupervisorSpec {
    pub binary: PathBuf,
    /// Port the supervisor's HTTP surface listens on.
    pub port: u16,
    /// Passthrough options, each emitted as `--key value`.
    pub options: BTreeMap<String, String>,
}

impl SupervisorSpec {
    /// Command-line arguments, deterministic in option order. The `port`
    /// option is pinned from `self.port` rather than the passthrough map.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--port".to_string(), self.port.to_string()];
        for (key, value) in &self.options {
            if key == "port" {
                continue;
            }
            args.push(format!("--{key}"));
            args.push(value.clone());
        }
        args
    }
}

/// A running supervisor child process.
pub struct Supervisor {
    child: Child,
}

impl Supervisor {
    /// Spawn the supervisor. The child is killed if the executor drops it.
    pub fn spawn(spec: &SupervisorSpec) -> ExecutorResult<Self> {
        let mut command = Command::new(&spec.binary);
        command.args(spec.args()).kill_on_drop(true);

        let child = command.spawn()?;
        info!(
            binary = %spec.binary.display(),
            port = spec.port,
            pid = child.id(),
            "supervisor spawned"
        );
        Ok(Self { child })
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> ExecutorResult<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Kill the child and reap it.
    pub async fn shutdown(mut self) -> ExecutorResult<()> {
        info!("stopping supervisor");
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_pin_port_and_pass_options_through() {
        let spec = SupervisorSpec {
            binary: PathBuf::from("/opt/exhibitor"),
            port: 31000,
            options: BTreeMap::from([
                ("configtype".to_string(), "zookeeper".to_string()),
                ("port".to_string(), "9999".to_string()),
                ("zkconfigconnect".to_string(), "zk1:2181".to_string()),
            ]),
        };

        let expected = [
            "--port",
            "31000",
            "--configtype",
            "zookeeper",
            "--zkconfigconnect",
            "zk1:2181",
        ];
        assert_eq!(spec.args(), expected);
    }
}
