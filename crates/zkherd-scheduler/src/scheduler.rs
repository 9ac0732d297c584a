//! The event-driven control loop.
//!
//! One `Scheduler` value owns the cluster and reacts to two event sources:
//! the cluster-manager callbacks (offers, status updates, registration) and
//! the operator's control API. Both run under a single critical section, so
//! no two threads ever observe or mutate a server simultaneously. Driver
//! submissions are non-blocking and are emitted while the section is held,
//! preserving "decision implies side-effect" ordering.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use zkherd_model::{
    id_from_task_id, ArtifactSet, Cluster, Constraint, ModelResult, Offer, Server, ServerState,
    StatusUpdate, Task, TaskState,
};

use crate::driver::SchedulerDriver;
use crate::view::ServerView;

/// Framework-level settings the scheduler carries.
#[derive(Debug, Clone)]
pub struct FrameworkSettings {
    /// Framework name advertised at registration.
    pub name: String,
    /// OS user tasks run as; empty means the cluster manager's default.
    pub user: String,
    /// Seconds the cluster manager keeps tasks alive while the scheduler is
    /// away.
    pub failover_timeout: f64,
    /// Artifact endpoint and file names baked into executor descriptors.
    pub artifacts: ArtifactSet,
}

/// Parameters for declaring a new server.
#[derive(Debug, Clone, Default)]
pub struct AddServerRequest {
    pub id: String,
    pub cpus: Option<f64>,
    pub mem: Option<f64>,
    /// Constraint spec, e.g. `hostname=unique,rack=groupBy:3`. Absent keeps
    /// the default `hostname=unique`.
    pub constraints: Option<String>,
    /// Shared-config poll backoff in milliseconds.
    pub config_change_backoff: Option<u64>,
}

struct Inner {
    cluster: Cluster,
    driver: Box<dyn SchedulerDriver>,
    settings: FrameworkSettings,
    framework_id: Option<String>,
    reconcile_requested_at: Option<Instant>,
}

/// The scheduler. Cheap to clone; all clones share one critical section.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Mutex<Inner>>,
    /// Bumped on every server state transition; `wait_for` subscribes.
    transitions: watch::Sender<u64>,
}

impl Scheduler {
    pub fn new(settings: FrameworkSettings, driver: Box<dyn SchedulerDriver>) -> Self {
        let (transitions, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                cluster: Cluster::new(),
                driver,
                settings,
                framework_id: None,
                reconcile_requested_at: None,
            })),
            transitions,
        }
    }

    // ── Cluster-manager callbacks ──────────────────────────────────

    /// Registration acknowledged. The framework id is held in memory only;
    /// an immediate reconcile answers for any tasks launched before a
    /// restart.
    pub async fn on_registered(&self, framework_id: &str) {
        {
            let mut inner = self.inner.lock().await;
            inner.framework_id = Some(framework_id.to_string());
            info!(%framework_id, "framework registered");
        }
        self.reconcile().await;
    }

    pub async fn on_reregistered(&self) {
        info!("framework re-registered");
        self.reconcile().await;
    }

    /// Disconnects are survivable: in-memory state is kept and the next
    /// (re-)registration reconciles.
    pub async fn on_disconnected(&self) {
        warn!("disconnected from cluster manager");
    }

    /// A fatal cluster-manager error. The binary exits non-zero on this.
    pub async fn on_error(&self, message: &str) {
        error!(%message, "cluster manager error");
    }

    /// Dispatch a batch of resource offers.
    ///
    /// For each offer the cluster is walked in insertion order; the first
    /// server in `Stopped` that the offer satisfies is launched. One offer
    /// launches at most one task; an offer that launches nothing is
    /// declined.
    pub async fn on_offers(&self, offers: &[Offer]) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        for offer in offers {
            if !Self::try_launch(inner, offer) {
                debug!(offer = %offer.id, host = %offer.hostname, "declining offer");
                inner.driver.decline_offer(&offer.id);
            }
        }
        drop(guard);
        self.notify();
    }

    fn try_launch(inner: &mut Inner, offer: &Offer) -> bool {
        let candidates: Vec<String> = inner
            .cluster
            .servers()
            .iter()
            .filter(|s| s.state == ServerState::Stopped)
            .map(|s| s.id.clone())
            .collect();

        for id in candidates {
            let peers = inner.cluster.peer_attributes(&id);
            let Inner { cluster, driver, settings, .. } = inner;
            let Some(server) = cluster.get_mut(&id) else {
                continue;
            };

            if let Some(reason) = server.matches(offer, &peers) {
                debug!(server = %id, host = %offer.hostname, %reason, "offer rejected");
                continue;
            }

            match server.build_task(offer, &settings.artifacts) {
                Ok(task) => {
                    server.last_task = Some(Task {
                        task_id: task.task_id.clone(),
                        agent_id: offer.agent_id.clone(),
                        executor_id: task.executor.executor_id.clone(),
                        attributes: Server::placement_attributes(offer),
                    });
                    server.state = ServerState::Staging;
                    info!(
                        server = %id,
                        host = %offer.hostname,
                        port = task.port,
                        task = %task.task_id,
                        "launching server"
                    );
                    driver.launch_task(&offer.id, &task);
                    return true;
                }
                Err(e) => {
                    warn!(server = %id, error = %e, "task build failed");
                }
            }
        }
        false
    }

    /// Apply a task status update.
    ///
    /// The server id is decoded from the task id's middle segment. Updates
    /// for tasks no server claims are acknowledged by killing the task when
    /// it is still alive, and dropped otherwise (this covers `remove`
    /// racing the kill ack).
    pub async fn on_status(&self, update: &StatusUpdate) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Inner { cluster, driver, .. } = inner;

        let server = id_from_task_id(&update.task_id).and_then(|id| cluster.get_mut(id));
        let Some(server) = server else {
            if !update.state.is_terminal() {
                info!(task = %update.task_id, state = ?update.state, "task without server, killing");
                driver.kill_task(&update.task_id);
            } else {
                debug!(task = %update.task_id, state = ?update.state, "dropping status for unknown task");
            }
            return;
        };

        match update.state {
            TaskState::Running => {
                server.state = ServerState::Running;
                if server.last_task.is_none() {
                    // Rebuilding after a scheduler restart: the update is all
                    // we know about the placement.
                    server.last_task = Some(Task {
                        task_id: update.task_id.clone(),
                        agent_id: update.agent_id.clone(),
                        executor_id: server.id.clone(),
                        attributes: HashMap::new(),
                    });
                }
                info!(server = %server.id, task = %update.task_id, "server running");
            }
            TaskState::Staging | TaskState::Starting => {
                if !matches!(server.state, ServerState::Staging | ServerState::Reconciling) {
                    debug!(server = %server.id, state = ?server.state, "ignoring staging update");
                }
            }
            TaskState::Finished
            | TaskState::Failed
            | TaskState::Killed
            | TaskState::Lost
            | TaskState::Error => {
                let next = if server.stop_requested {
                    ServerState::Added
                } else {
                    ServerState::Stopped
                };
                info!(
                    server = %server.id,
                    task = %update.task_id,
                    terminal = ?update.state,
                    next = ?next,
                    reason = update.message.as_deref().unwrap_or(""),
                    "task terminal"
                );
                server.state = next;
                server.stop_requested = false;
                server.last_task = None;
            }
        }

        drop(guard);
        self.notify();
    }

    /// Ask the cluster manager to re-report every task we believe is alive.
    /// Affected servers sit in `Reconciling` until a status update answers;
    /// there is no hard timeout.
    pub async fn reconcile(&self) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut task_ids = Vec::new();
        for server in inner.cluster.servers_mut() {
            if matches!(server.state, ServerState::Added | ServerState::Stopped) {
                continue;
            }
            if let Some(task) = &server.last_task {
                server.state = ServerState::Reconciling;
                task_ids.push(task.task_id.clone());
            }
        }

        if !task_ids.is_empty() {
            info!(tasks = task_ids.len(), "requesting reconciliation");
            inner.reconcile_requested_at = Some(Instant::now());
            inner.driver.reconcile_tasks(&task_ids);
        }
        drop(guard);
        self.notify();
    }

    /// Ids of servers still `Reconciling` after `older_than` since the last
    /// reconcile request. Reported, never auto-killed.
    pub async fn stale_reconciling(&self, older_than: Duration) -> Vec<String> {
        let inner = self.inner.lock().await;
        let Some(requested_at) = inner.reconcile_requested_at else {
            return Vec::new();
        };
        if requested_at.elapsed() < older_than {
            return Vec::new();
        }
        let stuck: Vec<String> = inner
            .cluster
            .servers()
            .iter()
            .filter(|s| s.state == ServerState::Reconciling)
            .map(|s| s.id.clone())
            .collect();
        for id in &stuck {
            warn!(server = %id, elapsed = ?requested_at.elapsed(), "still reconciling");
        }
        stuck
    }

    // ── Operator entry points ──────────────────────────────────────

    /// Declare a new server in `Added`.
    pub async fn add_server(&self, req: &AddServerRequest) -> ModelResult<ServerView> {
        let mut server = Server::new(&req.id)?;
        if let Some(cpus) = req.cpus {
            server.config.cpus = cpus;
        }
        if let Some(mem) = req.mem {
            server.config.mem = mem;
        }
        if let Some(backoff) = req.config_change_backoff {
            server.config.shared_config_change_backoff = backoff;
        }
        if let Some(spec) = &req.constraints {
            server.constraints = Constraint::parse(spec)?;
        }

        let view = ServerView::from(&server);
        let mut inner = self.inner.lock().await;
        inner.cluster.add(server)?;
        info!(server = %req.id, "server added");
        Ok(view)
    }

    /// Make a server eligible for offers: `Added` → `Stopped`. A server
    /// already past `Added` is left alone.
    pub async fn start_server(&self, id: &str) -> Option<ServerView> {
        let mut inner = self.inner.lock().await;
        let server = inner.cluster.get_mut(id)?;
        if server.state == ServerState::Added {
            server.state = ServerState::Stopped;
            info!(server = %id, "server started (eligible for offers)");
        }
        let view = ServerView::from(&*server);
        drop(inner);
        self.notify();
        Some(view)
    }

    /// Stop a server. An active task is killed and the terminal status (the
    /// kill ack) lands the server back in `Added`. Stopping a server in
    /// `Added` or `Stopped` is a no-op that still returns it.
    pub async fn stop_server(&self, id: &str) -> Option<ServerView> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Inner { cluster, driver, .. } = inner;
        let server = cluster.get_mut(id)?;

        if matches!(
            server.state,
            ServerState::Staging | ServerState::Running | ServerState::Reconciling
        ) {
            server.stop_requested = true;
            if let Some(task) = &server.last_task {
                info!(server = %id, task = %task.task_id, "stopping server, killing task");
                driver.kill_task(&task.task_id);
            }
        } else {
            debug!(server = %id, state = ?server.state, "stop is a no-op");
        }
        Some(ServerView::from(&*server))
    }

    /// Stop a server if needed, then remove it from the cluster.
    pub async fn remove_server(&self, id: &str) -> Option<ServerView> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Inner { cluster, driver, .. } = inner;

        let active_task = cluster.get(id).and_then(|s| {
            matches!(
                s.state,
                ServerState::Staging | ServerState::Running | ServerState::Reconciling
            )
            .then(|| s.last_task.clone())
            .flatten()
        });
        if let Some(task) = active_task {
            info!(server = %id, task = %task.task_id, "killing task before removal");
            driver.kill_task(&task.task_id);
        }

        let server = cluster.remove(id)?;
        info!(server = %id, "server removed");
        drop(guard);
        self.notify();
        Some(ServerView::from(&server))
    }

    /// Merge recognized option keys into the server's supervisor options or
    /// shared-config overrides. Unknown keys are logged and ignored.
    pub async fn configure_server(
        &self,
        id: &str,
        options: &BTreeMap<String, String>,
    ) -> Option<ServerView> {
        let mut inner = self.inner.lock().await;
        let server = inner.cluster.get_mut(id)?;

        for (key, value) in options {
            if zkherd_model::EXHIBITOR_OPTION_KEYS.contains(&key.as_str()) {
                info!(server = %id, %key, %value, "supervisor option set");
                server
                    .config
                    .exhibitor_options
                    .insert(key.clone(), value.clone());
            } else if zkherd_model::SHARED_OVERRIDE_KEYS.contains(&key.as_str()) {
                info!(server = %id, %key, %value, "shared-config override set");
                server
                    .config
                    .shared_override
                    .insert(key.clone(), value.clone());
            } else {
                warn!(server = %id, %key, "unrecognized option ignored");
            }
        }
        Some(ServerView::from(&*server))
    }

    pub async fn server_view(&self, id: &str) -> Option<ServerView> {
        let inner = self.inner.lock().await;
        inner.cluster.get(id).map(ServerView::from)
    }

    /// Snapshots of all servers in insertion order.
    pub async fn cluster_view(&self) -> Vec<ServerView> {
        let inner = self.inner.lock().await;
        inner.cluster.servers().iter().map(ServerView::from).collect()
    }

    pub async fn framework_id(&self) -> Option<String> {
        self.inner.lock().await.framework_id.clone()
    }

    // ── Waiting ────────────────────────────────────────────────────

    /// Wait until the server reaches `state` or the timeout elapses.
    /// Absent ids count as [`ServerState::Unknown`]. Driven by the
    /// transition signal, not by polling.
    pub async fn wait_for(&self, id: &str, state: ServerState, timeout: Duration) -> bool {
        let mut rx = self.transitions.subscribe();
        let deadline = Instant::now() + timeout;
        loop {
            if self.current_state(id).await == state {
                return true;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                // Sender gone or deadline hit: one final check.
                Ok(Err(_)) => return self.current_state(id).await == state,
                Err(_) => return self.current_state(id).await == state,
            }
        }
    }

    async fn current_state(&self, id: &str) -> ServerState {
        let inner = self.inner.lock().await;
        inner
            .cluster
            .get(id)
            .map(|s| s.state)
            .unwrap_or(ServerState::Unknown)
    }

    fn notify(&self) {
        self.transitions.send_modify(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;
    use crate::driver::DriverCall;
    use zkherd_model::{parse_ranges, TaskDescriptor};

    /// Records every submission for assertions.
    #[derive(Clone, Default)]
    struct RecordingDriver {
        calls: Arc<StdMutex<Vec<DriverCall>>>,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<DriverCall> {
            self.calls.lock().unwrap().clone()
        }

        fn last_launch(&self) -> Option<TaskDescriptor> {
            self.calls().into_iter().rev().find_map(|c| match c {
                DriverCall::Launch { task, .. } => Some(task),
                _ => None,
            })
        }
    }

    impl SchedulerDriver for RecordingDriver {
        fn launch_task(&mut self, offer_id: &str, task: &TaskDescriptor) {
            self.calls.lock().unwrap().push(DriverCall::Launch {
                offer_id: offer_id.to_string(),
                task: task.clone(),
            });
        }

        fn decline_offer(&mut self, offer_id: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(DriverCall::Decline { offer_id: offer_id.to_string() });
        }

        fn kill_task(&mut self, task_id: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(DriverCall::Kill { task_id: task_id.to_string() });
        }

        fn reconcile_tasks(&mut self, task_ids: &[String]) {
            self.calls
                .lock()
                .unwrap()
                .push(DriverCall::Reconcile { task_ids: task_ids.to_vec() });
        }
    }

    fn test_settings() -> FrameworkSettings {
        FrameworkSettings {
            name: "exhibitor".to_string(),
            user: String::new(),
            failover_timeout: 30.0,
            artifacts: ArtifactSet {
                base_url: "http://10.0.0.1:6666".to_string(),
                jar: "zkherd.bin".to_string(),
                exhibitor: "exhibitor.tar.gz".to_string(),
                zookeeper: "zookeeper.tar.gz".to_string(),
                jdk: "jdk.tar.gz".to_string(),
                s3credentials: None,
                defaultconfig: None,
            },
        }
    }

    fn test_scheduler() -> (Scheduler, RecordingDriver) {
        let driver = RecordingDriver::default();
        let scheduler = Scheduler::new(test_settings(), Box::new(driver.clone()));
        (scheduler, driver)
    }

    fn offer(id: &str, hostname: &str, ports: &str) -> Offer {
        Offer {
            id: id.to_string(),
            agent_id: format!("agent@{hostname}"),
            hostname: hostname.to_string(),
            cpus: 1.0,
            mem: 512.0,
            ports: parse_ranges(ports).unwrap(),
            attributes: HashMap::new(),
        }
    }

    async fn add_started(scheduler: &Scheduler, id: &str) {
        scheduler
            .add_server(&AddServerRequest { id: id.to_string(), ..Default::default() })
            .await
            .unwrap();
        scheduler.start_server(id).await.unwrap();
    }

    fn running_update(task_id: &str, state: TaskState) -> StatusUpdate {
        StatusUpdate {
            task_id: task_id.to_string(),
            agent_id: "agent@h1".to_string(),
            state,
            message: None,
        }
    }

    #[tokio::test]
    async fn offer_launches_stopped_server_on_lowest_port() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;

        let task = driver.last_launch().expect("launch expected");
        assert_eq!(task.port, 31000);
        let view = scheduler.server_view("zk0").await.unwrap();
        assert_eq!(view.state, ServerState::Staging);
        assert!(view.task.is_some());
    }

    #[tokio::test]
    async fn offer_respects_configured_port_ranges() {
        let (scheduler, driver) = test_scheduler();
        scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .unwrap();
        {
            // Configure ports before starting.
            let mut inner = scheduler.inner.lock().await;
            inner.cluster.get_mut("zk0").unwrap().config.ports =
                parse_ranges("31010-31020").unwrap();
        }
        scheduler.start_server("zk0").await.unwrap();

        scheduler
            .on_offers(&[offer("o1", "h1", "31000-31005,31015-31018")])
            .await;

        assert_eq!(driver.last_launch().unwrap().port, 31015);
    }

    #[tokio::test]
    async fn added_server_is_not_launchable() {
        let (scheduler, driver) = test_scheduler();
        scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .unwrap();

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;

        assert_eq!(
            driver.calls(),
            vec![DriverCall::Decline { offer_id: "o1".to_string() }]
        );
    }

    #[tokio::test]
    async fn one_offer_launches_at_most_one_task() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        add_started(&scheduler, "zk1").await;

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;

        let launches = driver
            .calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Launch { .. }))
            .count();
        assert_eq!(launches, 1);
        assert_eq!(
            scheduler.server_view("zk1").await.unwrap().state,
            ServerState::Stopped
        );
    }

    #[tokio::test]
    async fn unique_hostname_declines_second_server_on_same_host() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        add_started(&scheduler, "zk1").await;

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        // zk0 staged on h1; another offer from h1 must not place zk1.
        scheduler.on_offers(&[offer("o2", "h1", "31000-31005")]).await;

        assert!(driver
            .calls()
            .contains(&DriverCall::Decline { offer_id: "o2".to_string() }));
        assert_eq!(
            scheduler.server_view("zk1").await.unwrap().state,
            ServerState::Stopped
        );

        // A different host is fine.
        scheduler.on_offers(&[offer("o3", "h2", "31000-31005")]).await;
        assert_eq!(
            scheduler.server_view("zk1").await.unwrap().state,
            ServerState::Staging
        );
    }

    #[tokio::test]
    async fn group_by_spreads_across_attribute_values() {
        let (scheduler, driver) = test_scheduler();
        for id in ["zk0", "zk1", "zk2"] {
            scheduler
                .add_server(&AddServerRequest {
                    id: id.to_string(),
                    constraints: Some("rack=groupBy".to_string()),
                    ..Default::default()
                })
                .await
                .unwrap();
            scheduler.start_server(id).await.unwrap();
        }

        let rack_offer = |id: &str, host: &str, rack: &str| {
            let mut o = offer(id, host, "31000-31005");
            o.attributes.insert("rack".to_string(), rack.to_string());
            o
        };

        scheduler.on_offers(&[rack_offer("o1", "h1", "A")]).await;
        scheduler.on_offers(&[rack_offer("o2", "h2", "B")]).await;
        // Rack A again: declined while a third rack is still owed.
        scheduler.on_offers(&[rack_offer("o3", "h3", "A")]).await;
        assert!(driver
            .calls()
            .contains(&DriverCall::Decline { offer_id: "o3".to_string() }));

        scheduler.on_offers(&[rack_offer("o4", "h4", "C")]).await;
        assert_eq!(
            scheduler.server_view("zk2").await.unwrap().state,
            ServerState::Staging
        );
    }

    #[tokio::test]
    async fn task_lifecycle_to_running_and_back_on_loss() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        let task_id = driver.last_launch().unwrap().task_id;

        scheduler
            .on_status(&running_update(&task_id, TaskState::Staging))
            .await;
        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Staging
        );

        scheduler
            .on_status(&running_update(&task_id, TaskState::Running))
            .await;
        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Running
        );

        scheduler
            .on_status(&running_update(&task_id, TaskState::Lost))
            .await;
        let view = scheduler.server_view("zk0").await.unwrap();
        assert_eq!(view.state, ServerState::Stopped);
        assert!(view.task.is_none());

        // Next matching offer re-launches.
        scheduler.on_offers(&[offer("o2", "h2", "31000-31005")]).await;
        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Staging
        );
    }

    #[tokio::test]
    async fn status_for_unknown_running_task_kills_it() {
        let (scheduler, driver) = test_scheduler();
        scheduler
            .on_status(&running_update("exhibitor-ghost-1234", TaskState::Running))
            .await;
        assert_eq!(
            driver.calls(),
            vec![DriverCall::Kill { task_id: "exhibitor-ghost-1234".to_string() }]
        );
    }

    #[tokio::test]
    async fn status_for_unknown_terminal_task_is_dropped() {
        let (scheduler, driver) = test_scheduler();
        scheduler
            .on_status(&running_update("exhibitor-ghost-1234", TaskState::Failed))
            .await;
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn stop_kills_active_task_and_lands_in_added() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        let task_id = driver.last_launch().unwrap().task_id;
        scheduler
            .on_status(&running_update(&task_id, TaskState::Running))
            .await;

        let view = scheduler.stop_server("zk0").await.unwrap();
        assert_eq!(view.state, ServerState::Running); // kill ack pending
        assert!(driver
            .calls()
            .contains(&DriverCall::Kill { task_id: task_id.clone() }));

        scheduler
            .on_status(&running_update(&task_id, TaskState::Killed))
            .await;
        let view = scheduler.server_view("zk0").await.unwrap();
        assert_eq!(view.state, ServerState::Added);
        assert!(view.task.is_none());
    }

    #[tokio::test]
    async fn stop_is_idempotent_on_inactive_servers() {
        let (scheduler, driver) = test_scheduler();
        scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .unwrap();

        let view = scheduler.stop_server("zk0").await.unwrap();
        assert_eq!(view.state, ServerState::Added);
        assert!(driver.calls().is_empty());

        assert!(scheduler.stop_server("nope").await.is_none());
    }

    #[tokio::test]
    async fn stop_between_launch_and_running_still_stops() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        let task_id = driver.last_launch().unwrap().task_id;

        // Operator stops while the task is still staging.
        scheduler.stop_server("zk0").await.unwrap();
        scheduler
            .on_status(&running_update(&task_id, TaskState::Lost))
            .await;

        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Added
        );
    }

    #[tokio::test]
    async fn remove_kills_and_forgets() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        let task_id = driver.last_launch().unwrap().task_id;

        let removed = scheduler.remove_server("zk0").await.unwrap();
        assert_eq!(removed.id, "zk0");
        assert!(driver
            .calls()
            .contains(&DriverCall::Kill { task_id: task_id.clone() }));
        assert!(scheduler.server_view("zk0").await.is_none());

        // The kill ack arrives after removal and is dropped.
        scheduler
            .on_status(&running_update(&task_id, TaskState::Killed))
            .await;
        assert!(scheduler.server_view("zk0").await.is_none());
    }

    #[tokio::test]
    async fn reconcile_marks_active_servers_and_requests_tasks() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        add_started(&scheduler, "zk1").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        let task_id = driver.last_launch().unwrap().task_id;
        scheduler
            .on_status(&running_update(&task_id, TaskState::Running))
            .await;

        scheduler.reconcile().await;

        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Reconciling
        );
        // zk1 never launched: untouched.
        assert_eq!(
            scheduler.server_view("zk1").await.unwrap().state,
            ServerState::Stopped
        );
        assert!(driver
            .calls()
            .contains(&DriverCall::Reconcile { task_ids: vec![task_id.clone()] }));

        // The status update confirms and the server leaves Reconciling.
        scheduler
            .on_status(&running_update(&task_id, TaskState::Running))
            .await;
        assert_eq!(
            scheduler.server_view("zk0").await.unwrap().state,
            ServerState::Running
        );
    }

    #[tokio::test]
    async fn registration_schedules_reconcile() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;

        scheduler.on_registered("fw-1").await;

        assert_eq!(scheduler.framework_id().await.as_deref(), Some("fw-1"));
        assert!(driver
            .calls()
            .iter()
            .any(|c| matches!(c, DriverCall::Reconcile { .. })));
    }

    #[tokio::test]
    async fn stale_reconciling_reports_without_killing() {
        let (scheduler, driver) = test_scheduler();
        add_started(&scheduler, "zk0").await;
        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        scheduler.reconcile().await;

        let stuck = scheduler.stale_reconciling(Duration::ZERO).await;
        assert_eq!(stuck, vec!["zk0".to_string()]);
        assert!(!driver
            .calls()
            .iter()
            .any(|c| matches!(c, DriverCall::Kill { .. })));
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_bad_ids() {
        let (scheduler, _) = test_scheduler();
        scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .unwrap();
        assert!(scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .is_err());
        assert!(scheduler
            .add_server(&AddServerRequest { id: "zk-0".to_string(), ..Default::default() })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn configure_merges_known_keys_only() {
        let (scheduler, _) = test_scheduler();
        scheduler
            .add_server(&AddServerRequest { id: "zk0".to_string(), ..Default::default() })
            .await
            .unwrap();

        let mut options = BTreeMap::new();
        options.insert("configtype".to_string(), "zookeeper".to_string());
        options.insert(
            "zookeeper-install-directory".to_string(),
            "/opt/zk".to_string(),
        );
        options.insert("bogus".to_string(), "x".to_string());

        let view = scheduler.configure_server("zk0", &options).await.unwrap();
        assert_eq!(view.exhibitor_options["configtype"], "zookeeper");
        assert_eq!(view.shared_override["zookeeper-install-directory"], "/opt/zk");
        assert!(!view.exhibitor_options.contains_key("bogus"));
        assert!(!view.shared_override.contains_key("bogus"));
    }

    #[tokio::test]
    async fn wait_for_observes_transitions() {
        let (scheduler, _) = test_scheduler();
        add_started(&scheduler, "zk0").await;

        let waiter = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .wait_for("zk0", ServerState::Staging, Duration::from_secs(5))
                    .await
            })
        };

        scheduler.on_offers(&[offer("o1", "h1", "31000-31005")]).await;
        assert!(waiter.await.unwrap());

        // Timeout path.
        assert!(
            !scheduler
                .wait_for("zk0", ServerState::Running, Duration::from_millis(20))
                .await
        );
    }
}
