//! zkherdd — the zkherd daemon.
//!
//! Single binary with two modes:
//!
//! - **scheduler** — the framework controller: control-plane API, artifact
//!   endpoint, offer/status event loop
//! - **executor** — the per-node supervisor driver, launched inside a task
//!   sandbox
//!
//! # Usage
//!
//! ```text
//! zkherdd scheduler --api-port 6666 --jar ./zkherd.bin \
//!     --exhibitor ./exhibitor.tar.gz --zookeeper ./zookeeper.tar.gz \
//!     --jdk ./jdk.tar.gz
//! zkherdd executor --payload payload.json --supervisor-bin ./exhibitor
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, info};

use zkherd_api::ApiState;
use zkherd_artifact::ArtifactIndex;
use zkherd_scheduler::{FrameworkSettings, QueueDriver, Scheduler};

#[derive(Parser)]
#[command(name = "zkherdd", about = "ZooKeeper ensemble scheduler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the framework controller (control API + artifact endpoint).
    Scheduler {
        /// HTTP port for the control API and artifact routes.
        #[arg(long, default_value = "6666")]
        api_port: u16,

        /// Advertised base URL executors use to fetch artifacts.
        #[arg(long, default_value = "http://127.0.0.1:6666")]
        api_url: String,

        /// Framework binary served to executors.
        #[arg(long)]
        jar: PathBuf,

        /// Exhibitor distribution archive.
        #[arg(long)]
        exhibitor: PathBuf,

        /// ZooKeeper distribution archive.
        #[arg(long)]
        zookeeper: PathBuf,

        /// JDK archive placed on the executor PATH.
        #[arg(long)]
        jdk: PathBuf,

        /// Optional S3 credentials file served to executors.
        #[arg(long)]
        s3credentials: Option<PathBuf>,

        /// Optional default supervisor config served to executors.
        #[arg(long)]
        defaultconfig: Option<PathBuf>,

        /// Framework name advertised at registration.
        #[arg(long, default_value = "exhibitor")]
        framework_name: String,

        /// OS user tasks run as (empty = cluster-manager default).
        #[arg(long, default_value = "")]
        framework_user: String,

        /// Seconds the cluster manager keeps tasks alive while the
        /// scheduler is away.
        #[arg(long, default_value = "2592000")]
        failover_timeout: f64,

        /// How long a server may sit in Reconciling before it is reported.
        #[arg(long, default_value = "300")]
        reconcile_report_interval: u64,
    },

    /// Run the per-node supervisor driver.
    Executor {
        /// Path to the task payload JSON.
        #[arg(long, default_value = "payload.json")]
        payload: PathBuf,

        /// Path to the supervisor binary to exec.
        #[arg(long)]
        supervisor_bin: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zkherdd=debug,zkherd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scheduler {
            api_port,
            api_url,
            jar,
            exhibitor,
            zookeeper,
            jdk,
            s3credentials,
            defaultconfig,
            framework_name,
            framework_user,
            failover_timeout,
            reconcile_report_interval,
        } => {
            run_scheduler(SchedulerOptions {
                api_port,
                api_url,
                jar,
                exhibitor,
                zookeeper,
                jdk,
                s3credentials,
                defaultconfig,
                framework_name,
                framework_user,
                failover_timeout,
                reconcile_report_interval,
            })
            .await
        }
        Command::Executor { payload, supervisor_bin } => {
            run_executor(payload, supervisor_bin).await
        }
    }
}

struct SchedulerOptions {
    api_port: u16,
    api_url: String,
    jar: PathBuf,
    exhibitor: PathBuf,
    zookeeper: PathBuf,
    jdk: PathBuf,
    s3credentials: Option<PathBuf>,
    defaultconfig: Option<PathBuf>,
    framework_name: String,
    framework_user: String,
    failover_timeout: f64,
    reconcile_report_interval: u64,
}

async fn run_scheduler(opts: SchedulerOptions) -> anyhow::Result<()> {
    info!("zkherd scheduler starting");

    // Artifacts must be resolvable before anything is launched; a missing
    // file is fatal.
    let index = ArtifactIndex::new(
        opts.jar,
        opts.exhibitor,
        opts.zookeeper,
        opts.jdk,
        opts.s3credentials,
        opts.defaultconfig,
    )?;
    let artifacts = index.artifact_set(&opts.api_url)?;

    let settings = FrameworkSettings {
        name: opts.framework_name,
        user: opts.framework_user,
        failover_timeout: opts.failover_timeout,
        artifacts,
    };
    let (driver, mut calls) = QueueDriver::new();
    let scheduler = Scheduler::new(settings, Box::new(driver));
    info!("scheduler initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────────

    // Driver submissions; the cluster-manager transport binding consumes
    // this queue in a full deployment.
    let mut drain_shutdown = shutdown_rx.clone();
    let drain_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                call = calls.recv() => match call {
                    Some(call) => debug!(?call, "driver submission"),
                    None => break,
                },
                _ = drain_shutdown.changed() => break,
            }
        }
    });

    // Stale-reconciliation reporter.
    let report_scheduler = scheduler.clone();
    let report_interval = Duration::from_secs(opts.reconcile_report_interval);
    let mut report_shutdown = shutdown_rx.clone();
    let report_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(report_interval) => {
                    let stuck = report_scheduler.stale_reconciling(report_interval).await;
                    if !stuck.is_empty() {
                        info!(servers = ?stuck, "servers awaiting reconciliation");
                    }
                }
                _ = report_shutdown.changed() => break,
            }
        }
    });

    // ── HTTP surface ───────────────────────────────────────────────

    let router = zkherd_api::build_router(ApiState::new(scheduler))
        .merge(zkherd_artifact::build_router(index));
    let addr = SocketAddr::from(([0, 0, 0, 0], opts.api_port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = drain_handle.await;
    let _ = report_handle.await;

    info!("zkherd scheduler stopped");
    Ok(())
}

async fn run_executor(payload_path: PathBuf, supervisor_bin: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&payload_path)?;
    let payload = zkherd_executor::parse_payload(&raw)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    zkherd_executor::run(payload, supervisor_bin, shutdown_rx).await?;
    Ok(())
}
