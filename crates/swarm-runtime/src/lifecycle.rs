//! C7: the lifecycle controller — the swarm entry point.
//!
//! Owns the channel group, the swarm state, and every spawned process for
//! one swarm instance at a time. Grounded on `swarm::executor::SwarmExecutor::execute`'s
//! `tokio::select!` event-funnel pattern (an mpsc channel racing child
//! exit against incoming messages), generalized from "one subprocess, one
//! HTTP callback server" to "N subprocesses, N channel connections".

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use swarm_common::{AgentStatus, ChatRecord, Envelope, MessageData, Role};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::channel::ChannelClient;
use crate::error::LifecycleError;
use crate::group::ChannelGroup;
use crate::notification::{LoggingSink, Notification, NotificationSink, Severity};
use crate::relay::{self, ParentLink};
use crate::router;
use crate::spawner::{spawn_agent, AgentDefinition, PreDefinedAgentConfig, SpawnContext};
use crate::state::{AgentRecord, StatusUpdate, SwarmStateHandle};
use crate::transport::Framing;

/// Tunables for one `LifecycleController`.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub base_dir: PathBuf,
    pub claude_cmd: String,
    pub registration_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub shutdown_poll: Duration,
    pub kill_grace: Duration,
    pub framing: Framing,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/tmp/pi-swarm"),
            claude_cmd: "claude".to_string(),
            registration_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            shutdown_poll: Duration::from_millis(2_000),
            kill_grace: Duration::from_secs(5),
            framing: Framing::LengthPrefixed,
        }
    }
}

/// An entry in the roster the controller is asked to spawn.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub def: AgentDefinition,
}

/// A routed message fed into the dispatch loop by a per-channel reader
/// task; `origin_channel` drives the `inbox-queen`-vs-`general`
/// deduplication rule.
struct Routed {
    origin_channel: String,
    envelope: Envelope,
}

struct ActiveSwarm {
    swarm_id: String,
    state: SwarmStateHandle,
    group: ChannelGroup,
    channel_senders: HashMap<String, mpsc::Sender<Envelope>>,
    reader_tasks: Vec<JoinHandle<()>>,
    exit_monitors: Vec<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
    registration_timeout_task: Option<JoinHandle<()>>,
}

/// The swarm entry point. Construct one per queen process; a coordinator
/// constructs its own nested instance with `parent` set to a
/// [`ParentLink`] back to the outer queen.
pub struct LifecycleController {
    config: LifecycleConfig,
    generation_counter: Arc<AtomicU64>,
    active: Arc<RwLock<Option<ActiveSwarm>>>,
    notification_sink: Arc<dyn NotificationSink>,
    parent: Option<ParentLink>,
}

impl LifecycleController {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            generation_counter: Arc::new(AtomicU64::new(0)),
            active: Arc::new(RwLock::new(None)),
            notification_sink: Arc::new(LoggingSink),
            parent: None,
        }
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = sink;
        self
    }

    pub fn with_parent_link(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Is there an active swarm with at least one non-terminal agent?
    pub async fn has_active_swarm(&self) -> bool {
        let guard = self.active.read().await;
        match guard.as_ref() {
            None => false,
            Some(active) => {
                let agents = active.state.all_agents().await;
                agents.iter().any(|a| !a.status.is_terminal())
            }
        }
    }

    pub async fn swarm_state(&self) -> Option<SwarmStateHandle> {
        self.active.read().await.as_ref().map(|a| a.state.clone())
    }

    /// Start a swarm from a roster of agent definitions, following the
    /// setup sequence in SPEC_FULL §4.7. If a prior swarm exists and every
    /// agent in it is terminal, it is cleaned up first; if any agent is
    /// still active, this returns `SwarmAlreadyActive`.
    pub async fn start_swarm(
        &self,
        agents: Vec<AgentSpec>,
        predefined: &HashMap<String, PreDefinedAgentConfig>,
        task_dir: Option<PathBuf>,
    ) -> Result<(), LifecycleError> {
        if self.has_active_swarm().await {
            return Err(LifecycleError::SwarmAlreadyActive);
        }
        if self.active.read().await.is_some() {
            self.cleanup_swarm().await;
        }

        let swarm_id = hex::encode(uuid::Uuid::new_v4().as_bytes()[..4].to_vec());
        let group_dir = self.config.base_dir.join(&swarm_id);

        let distinct_swarms: std::collections::HashSet<&str> =
            agents.iter().map(|a| a.def.swarm.as_str()).collect();
        let mut channel_names = vec![
            swarm_common::sanitize::GENERAL_CHANNEL.to_string(),
            swarm_common::sanitize::QUEEN_INBOX_CHANNEL.to_string(),
        ];
        for agent in &agents {
            channel_names.push(swarm_common::sanitize::inbox_channel(&agent.def.name));
        }
        if distinct_swarms.len() >= 2 {
            for swarm in &distinct_swarms {
                channel_names.push(swarm_common::sanitize::topic_channel(swarm));
            }
        }
        channel_names.sort();
        channel_names.dedup();

        let mut group = ChannelGroup::new(group_dir.clone(), &channel_names, self.config.framing);
        group.start().await?;

        let state = SwarmStateHandle::new(Arc::clone(&self.generation_counter));
        let generation = state.generation().await;

        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Routed>(1024);
        let mut channel_senders = HashMap::new();
        let mut reader_tasks = Vec::new();
        for name in &channel_names {
            let path = group.socket_path(name).expect("channel just created");
            let client = ChannelClient::connect(&path, self.config.framing)
                .await
                .map_err(|source| LifecycleError::QueenConnectFailed {
                    name: name.clone(),
                    source,
                })?;
            let (send_tx, task) = spawn_queen_channel_task(name.clone(), client, dispatch_tx.clone());
            channel_senders.insert(name.clone(), send_tx);
            reader_tasks.push(task);
        }

        for agent in &agents {
            state
                .register_agent(AgentRecord::new(
                    agent.def.name.clone(),
                    agent.def.role,
                    agent.def.swarm.clone(),
                    agent.def.task.clone(),
                ))
                .await;
        }

        let mut exit_monitors = Vec::new();
        for agent in &agents {
            let merged = agent.def.clone().merged_with(
                agent
                    .def
                    .pre_defined_agent
                    .as_ref()
                    .and_then(|name| predefined.get(name)),
            );
            let topic_channel = if distinct_swarms.len() >= 2 {
                Some(swarm_common::sanitize::topic_channel(&merged.swarm))
            } else {
                None
            };
            let spawn_ctx = SpawnContext {
                claude_cmd: self.config.claude_cmd.clone(),
                channels_group_dir: group_dir.clone(),
                subscribe_channels: vec![swarm_common::sanitize::GENERAL_CHANNEL.to_string()],
                topic_channel,
                task_dir: if merged.role == Role::Coordinator { task_dir.clone() } else { None },
            };

            match spawn_agent(&merged, &spawn_ctx).await {
                Ok(spawned) => {
                    state.set_pid(&merged.name, spawned.pid()).await;
                    let monitor = spawn_exit_monitor(
                        spawned,
                        state.clone(),
                        generation,
                        channel_senders
                            .get(swarm_common::sanitize::GENERAL_CHANNEL)
                            .cloned(),
                        Arc::clone(&self.notification_sink),
                    );
                    exit_monitors.push(monitor);
                }
                Err(e) => {
                    warn!(agent = %merged.name, error = %e, "failed to spawn agent");
                    state
                        .update_agent_status(&merged.name, AgentStatus::Crashed, StatusUpdate::default())
                        .await;
                    self.notification_sink.notify(Notification {
                        agent: merged.name.clone(),
                        summary: "failed to spawn".to_string(),
                        detail: Some(e.to_string()),
                        severity: Severity::Warning,
                    });
                }
            }
        }

        let dispatch_task = spawn_dispatch_loop(
            dispatch_rx,
            state.clone(),
            generation,
            channel_senders.clone(),
            self.parent.clone(),
            Arc::clone(&self.notification_sink),
        );

        let registration_timeout_task = spawn_registration_timeout(
            state.clone(),
            generation,
            self.config.registration_timeout,
            Arc::clone(&self.notification_sink),
        );

        *self.active.write().await = Some(ActiveSwarm {
            swarm_id,
            state,
            group,
            channel_senders,
            reader_tasks,
            exit_monitors,
            dispatch_task: Some(dispatch_task),
            registration_timeout_task: Some(registration_timeout_task),
        });

        Ok(())
    }

    /// Broadcast an instruct on `general` asking every agent to wrap up,
    /// then poll until every agent is terminal or `shutdown_timeout`
    /// elapses, then run `cleanup_swarm`. Aborts silently if a newer
    /// swarm replaces this one while waiting (generation guard).
    pub async fn graceful_shutdown(&self, instruction: &str) {
        let (state, general_tx, generation) = {
            let guard = self.active.read().await;
            let Some(active) = guard.as_ref() else { return };
            (
                active.state.clone(),
                active.channel_senders.get(swarm_common::sanitize::GENERAL_CHANNEL).cloned(),
                active.state.generation().await,
            )
        };

        if let Some(tx) = general_tx {
            let envelope = Envelope::new(
                "wrap up",
                MessageData::Instruct {
                    from: "queen".to_string(),
                    instruction: instruction.to_string(),
                    to: None,
                    swarm: None,
                },
            );
            let _ = tx.send(envelope).await;
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        loop {
            if state.live_generation() != generation {
                return;
            }
            let agents = state.all_agents().await;
            if agents.iter().all(|a| a.status.is_terminal()) {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.config.shutdown_poll).await;
        }

        if state.live_generation() == generation {
            self.cleanup_swarm().await;
        }
    }

    /// SIGTERM every tracked process group, schedule SIGKILL after
    /// `kill_grace`, disconnect queen channel clients, stop the channel
    /// group with directory removal, and clear the swarm state. Idempotent.
    pub async fn cleanup_swarm(&self) {
        let mut guard = self.active.write().await;
        let Some(mut active) = guard.take() else { return };
        drop(guard);

        if let Some(task) = active.dispatch_task.take() {
            task.abort();
        }
        if let Some(task) = active.registration_timeout_task.take() {
            task.abort();
        }
        for task in active.reader_tasks.drain(..) {
            task.abort();
        }

        let agents = active.state.all_agents().await;
        for agent in &agents {
            if let Some(pid) = agent.pid {
                kill_process_group(pid, self.config.kill_grace);
            }
        }

        active.group.stop(true).await;
        info!(swarm_id = %active.swarm_id, "swarm cleaned up");
    }
}

fn spawn_queen_channel_task(
    name: String,
    mut client: ChannelClient,
    dispatch_tx: mpsc::Sender<Routed>,
) -> (mpsc::Sender<Envelope>, JoinHandle<()>) {
    let (send_tx, mut send_rx) = mpsc::channel::<Envelope>(256);
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                incoming = client.recv() => {
                    match incoming {
                        Some(Ok(envelope)) => {
                            if dispatch_tx.send(Routed { origin_channel: name.clone(), envelope }).await.is_err() {
                                return;
                            }
                        }
                        Some(Err(_)) => continue,
                        None => return,
                    }
                }
                outgoing = send_rx.recv() => {
                    match outgoing {
                        Some(envelope) => { let _ = client.send(envelope).await; }
                        None => return,
                    }
                }
            }
        }
    });
    (send_tx, task)
}

/// Lines of raw stdout activity kept for a crash notification (SPEC_FULL
/// §4.7: the lifecycle controller's minimal built-in implementation of the
/// JSON-stdout-to-activity-event contract).
const MAX_LAST_ACTIVITY_LINES: usize = 10;

fn spawn_exit_monitor(
    mut agent: crate::spawner::SpawnedAgent,
    state: SwarmStateHandle,
    generation: u64,
    general_tx: Option<mpsc::Sender<Envelope>>,
    notifications: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    let stdout = agent.stdout.take();
    tokio::spawn(async move {
        let activity = tokio::spawn(watch_stdout(stdout, agent.name.clone()));
        let status = agent.child.wait().await;
        agent.cleanup();
        let last_activity = activity.await.unwrap_or_default();

        if state.live_generation() != generation {
            return;
        }

        let name = agent.name.clone();
        let exit_code = match &status {
            Ok(s) if s.success() => 0,
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => -1,
        };

        if exit_code == 0 {
            state.update_agent_status(&name, AgentStatus::Done, StatusUpdate::default()).await;
        } else {
            state.update_agent_status(&name, AgentStatus::Crashed, StatusUpdate::default()).await;
            notifications.notify(Notification {
                agent: name.clone(),
                summary: format!("agent crashed, exit code {exit_code}"),
                detail: Some(last_activity.join("\n")),
                severity: Severity::Warning,
            });
            if let Some(tx) = general_tx {
                let envelope = Envelope::new(
                    "agent crashed",
                    MessageData::AgentCrashed {
                        from: "system".to_string(),
                        agent: name,
                        exit_code,
                        last_activity: Some(last_activity),
                        error: None,
                    },
                );
                let _ = tx.send(envelope).await;
            }
        }
        state.check_all_done().await;
    })
}

/// Drain an agent's stdout, keeping the last [`MAX_LAST_ACTIVITY_LINES`]
/// lines. A line containing a JSON object (per `extract_json_object`) is
/// recorded as the extracted object rather than the raw line, matching the
/// JSON-stdout-to-activity-event contract this crate only partially
/// implements (full event typing is out of scope, see SPEC_FULL §4.7).
async fn watch_stdout(stdout: Option<tokio::process::ChildStdout>, agent_name: String) -> Vec<String> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let Some(stdout) = stdout else { return Vec::new() };
    let mut lines = BufReader::new(stdout).lines();
    let mut buf: std::collections::VecDeque<String> = std::collections::VecDeque::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let recorded = swarm_common::extract_json_object(&line).unwrap_or(line);
        tracing::trace!(agent = %agent_name, activity = %recorded, "agent activity");
        buf.push_back(recorded);
        while buf.len() > MAX_LAST_ACTIVITY_LINES {
            buf.pop_front();
        }
    }
    buf.into_iter().collect()
}

fn spawn_registration_timeout(
    state: SwarmStateHandle,
    generation: u64,
    timeout: Duration,
    notifications: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if state.live_generation() != generation {
            return;
        }
        for agent in state.all_agents().await {
            if agent.status == AgentStatus::Starting {
                state
                    .update_agent_status(&agent.name, AgentStatus::Crashed, StatusUpdate::default())
                    .await;
                notifications.notify(Notification {
                    agent: agent.name,
                    summary: "registration timed out".to_string(),
                    detail: None,
                    severity: Severity::Warning,
                });
            }
        }
        state.check_all_done().await;
    })
}

fn spawn_dispatch_loop(
    mut rx: mpsc::Receiver<Routed>,
    state: SwarmStateHandle,
    generation: u64,
    channel_senders: HashMap<String, mpsc::Sender<Envelope>>,
    parent: Option<ParentLink>,
    notifications: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(routed) = rx.recv().await {
            if state.live_generation() != generation {
                return;
            }
            handle_routed_message(&routed, &state, &channel_senders, &parent, &notifications).await;
        }
    })
}

async fn handle_routed_message(
    routed: &Routed,
    state: &SwarmStateHandle,
    channel_senders: &HashMap<String, mpsc::Sender<Envelope>>,
    parent: &Option<ParentLink>,
    notifications: &Arc<dyn NotificationSink>,
) {
    let data = &routed.envelope.data;

    // done/blocker/register are double-published to inbox-queen and
    // general; only act on the inbox-queen copy to avoid double effects.
    if data.is_deduplicated_on_general() && routed.origin_channel != swarm_common::sanitize::QUEEN_INBOX_CHANNEL {
        return;
    }

    match data {
        MessageData::Register { from, .. } => {
            let applied = state
                .update_agent_status(from, AgentStatus::Running, StatusUpdate::default())
                .await;
            if applied {
                notifications.notify(Notification {
                    agent: from.clone(),
                    summary: "registered".to_string(),
                    detail: None,
                    severity: Severity::Info,
                });
            }
        }
        MessageData::Done { from, summary } => {
            state
                .update_agent_status(
                    from,
                    AgentStatus::Done,
                    StatusUpdate {
                        done_summary: Some(summary.clone()),
                        ..Default::default()
                    },
                )
                .await;
            if let Some(parent) = parent {
                parent
                    .relay_event(
                        swarm_common::RelayEvent::Done,
                        from,
                        Role::Agent,
                        None,
                        Some(summary.clone()),
                        None,
                        None,
                    )
                    .await;
            }
        }
        MessageData::Blocker { from, description } => {
            state
                .update_agent_status(
                    from,
                    AgentStatus::Blocked,
                    StatusUpdate {
                        blocker_description: Some(description.clone()),
                        ..Default::default()
                    },
                )
                .await;
            if let Some(parent) = parent {
                parent
                    .relay_event(
                        swarm_common::RelayEvent::Blocked,
                        from,
                        Role::Agent,
                        None,
                        None,
                        Some(description.clone()),
                        None,
                    )
                    .await;
            }
        }
        MessageData::Message { from, content, progress, .. } => {
            if let Some(p) = progress {
                state.set_progress(from, p.phase.clone(), p.percent, None).await;
            }
            state
                .push_chat(ChatRecord {
                    from: from.clone(),
                    content: content.clone(),
                    timestamp: chrono::Utc::now(),
                    to: data.to().map(str::to_string),
                    channel: routed.origin_channel.clone(),
                })
                .await;
            if let Some(parent) = parent {
                parent
                    .relay_event(swarm_common::RelayEvent::Message, from, Role::Agent, None, None, None, Some(content.clone()))
                    .await;
            }
        }
        MessageData::Relay { relay } => {
            let identity_swarm = relay.swarm.clone();
            state.ensure_relayed_agent(&relay.name, relay.role, identity_swarm.clone()).await;
            if let Some(new_status) = relay::status_for_event(relay.event) {
                state
                    .update_agent_status(&relay.name, new_status, StatusUpdate::default())
                    .await;
            }
            if let Some(parent) = parent {
                parent.passthrough(routed.envelope.clone()).await;
            }
        }
        MessageData::Instruct { .. } => {
            // redelivery (to the resolved recipients' own inbox channels)
            // happens below, once for both `instruct` and `message`.
        }
        MessageData::Progress { .. } | MessageData::AgentCrashed { .. } => {
            // informational only; nothing else to do at the dispatch layer.
        }
    }

    if matches!(data, MessageData::Instruct { .. } | MessageData::Message { .. }) {
        redeliver_scoped(routed, data, state, channel_senders).await;
    }

    state.check_all_done().await;
}

/// C4: `general`'s socket-level fan-out (in `channel.rs`) has no notion of
/// an explicit `to`/`swarm` target — every connected client gets every
/// message. A payload that *does* carry addressing is redelivered here,
/// straight onto its resolved recipients' own inbox channels, using the
/// same reachability rules a receiver would apply to itself.
async fn redeliver_scoped(
    routed: &Routed,
    data: &MessageData,
    state: &SwarmStateHandle,
    channel_senders: &HashMap<String, mpsc::Sender<Envelope>>,
) {
    if data.to().is_none() && data.instruct_swarm().is_none() {
        return;
    }

    let agents = state.all_agents().await;
    let candidates: Vec<swarm_common::Identity> = agents
        .iter()
        .map(|a| swarm_common::Identity {
            name: a.name.clone(),
            role: a.role,
            swarm: Some(a.swarm.clone()),
        })
        .collect();
    let sender = candidates
        .iter()
        .find(|c| c.name == data.from())
        .cloned()
        .unwrap_or_else(|| swarm_common::Identity::queen(data.from()));

    for recipient in router::get_recipients(&sender, data, candidates.iter()) {
        let inbox = swarm_common::sanitize::inbox_channel(&recipient.name);
        if inbox == routed.origin_channel {
            continue; // already delivered by that channel's own fan-out
        }
        if let Some(tx) = channel_senders.get(&inbox) {
            let _ = tx.send(routed.envelope.clone()).await;
        }
    }
}

fn kill_process_group(pid: u32, kill_grace: Duration) {
    // PID-recycle defense: verify the PID still answers to signal 0
    // before sending a real one. This still races against an arbitrary
    // reuse of the PID between the check and the kill (Open Question #3
    // in DESIGN.md); there is no portable fix without a pidfd API.
    unsafe {
        if libc::kill(pid as libc::pid_t, 0) != 0 {
            return;
        }
        let killed_group = libc::kill(-(pid as libc::pid_t), libc::SIGTERM);
        if killed_group != 0 {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }

    tokio::spawn(async move {
        tokio::time::sleep(kill_grace).await;
        unsafe {
            if libc::kill(pid as libc::pid_t, 0) == 0 {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
                libc::kill(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn agent_spec(name: &str, cmd_task: &str) -> AgentSpec {
        AgentSpec {
            def: AgentDefinition {
                name: name.to_string(),
                role: Role::Agent,
                swarm: "s1".to_string(),
                task: cmd_task.to_string(),
                model: None,
                tools: None,
                system_prompt: None,
                cwd: None,
                pre_defined_agent: None,
            },
        }
    }

    fn test_config(base: PathBuf) -> LifecycleConfig {
        LifecycleConfig {
            base_dir: base,
            claude_cmd: "true".to_string(),
            registration_timeout: Duration::from_millis(200),
            shutdown_timeout: Duration::from_millis(500),
            shutdown_poll: Duration::from_millis(20),
            kill_grace: Duration::from_millis(50),
            framing: Framing::LengthPrefixed,
        }
    }

    #[tokio::test]
    async fn rejects_starting_a_second_swarm_while_one_is_active() {
        let base = tempfile::tempdir().unwrap();
        let controller = LifecycleController::new(test_config(base.path().to_path_buf()));
        controller
            .start_swarm(vec![agent_spec("a1", "noop")], &Map::new(), None)
            .await
            .unwrap();

        let err = controller
            .start_swarm(vec![agent_spec("a2", "noop")], &Map::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::SwarmAlreadyActive));

        controller.cleanup_swarm().await;
    }

    #[tokio::test]
    async fn registration_timeout_marks_unregistered_agents_crashed() {
        let base = tempfile::tempdir().unwrap();
        let controller = LifecycleController::new(test_config(base.path().to_path_buf()));
        controller
            .start_swarm(vec![agent_spec("a1", "noop")], &Map::new(), None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let state = controller.swarm_state().await.unwrap();
        let agent = state.agent("a1").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Crashed);

        controller.cleanup_swarm().await;
    }

    #[tokio::test]
    async fn cleanup_swarm_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let controller = LifecycleController::new(test_config(base.path().to_path_buf()));
        controller
            .start_swarm(vec![agent_spec("a1", "noop")], &Map::new(), None)
            .await
            .unwrap();
        controller.cleanup_swarm().await;
        controller.cleanup_swarm().await; // second call is a no-op
        assert!(controller.swarm_state().await.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_the_channel_group_directory() {
        let base = tempfile::tempdir().unwrap();
        let controller = LifecycleController::new(test_config(base.path().to_path_buf()));
        controller
            .start_swarm(vec![agent_spec("a1", "noop")], &Map::new(), None)
            .await
            .unwrap();

        let entries_before: Vec<_> = std::fs::read_dir(base.path()).unwrap().collect();
        assert_eq!(entries_before.len(), 1);

        controller.cleanup_swarm().await;
        let entries_after: Vec<_> = std::fs::read_dir(base.path()).unwrap().collect();
        assert_eq!(entries_after.len(), 0);
    }

    #[tokio::test]
    async fn redeliver_scoped_forwards_swarm_scoped_instruct_to_its_members_inbox_only() {
        let state = SwarmStateHandle::new(Arc::new(AtomicU64::new(0)));
        state.register_agent(AgentRecord::new("a1", Role::Agent, "s1", "t")).await;
        state.register_agent(AgentRecord::new("a2", Role::Agent, "s2", "t")).await;

        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let mut senders = Map::new();
        senders.insert(swarm_common::sanitize::inbox_channel("a1"), tx1);
        senders.insert(swarm_common::sanitize::inbox_channel("a2"), tx2);

        let envelope = Envelope::new(
            "wrap up s1",
            MessageData::Instruct {
                from: "queen".to_string(),
                instruction: "wrap up".to_string(),
                to: None,
                swarm: Some("s1".to_string()),
            },
        );
        let routed = Routed {
            origin_channel: swarm_common::sanitize::GENERAL_CHANNEL.to_string(),
            envelope: envelope.clone(),
        };

        redeliver_scoped(&routed, &envelope.data, &state, &senders).await;

        let received = rx1.try_recv().unwrap();
        assert_eq!(received, envelope);
        assert!(rx2.try_recv().is_err(), "a2 is in a different swarm and must not receive the instruct");
    }

    #[tokio::test]
    async fn redeliver_scoped_is_a_no_op_for_unaddressed_payloads() {
        let state = SwarmStateHandle::new(Arc::new(AtomicU64::new(0)));
        state.register_agent(AgentRecord::new("a1", Role::Agent, "s1", "t")).await;

        let (tx1, mut rx1) = mpsc::channel(4);
        let mut senders = Map::new();
        senders.insert(swarm_common::sanitize::inbox_channel("a1"), tx1);

        let envelope = Envelope::new(
            "hi everyone",
            MessageData::Message {
                from: "a2".to_string(),
                role: Role::Agent,
                content: "hi".to_string(),
                to: None,
                progress: None,
            },
        );
        let routed = Routed {
            origin_channel: swarm_common::sanitize::GENERAL_CHANNEL.to_string(),
            envelope: envelope.clone(),
        };

        redeliver_scoped(&routed, &envelope.data, &state, &senders).await;
        assert!(rx1.try_recv().is_err(), "unscoped messages are already covered by the channel's own fan-out");
    }
}
