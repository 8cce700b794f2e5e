//! C5: the authoritative swarm state — agent registry, status transitions,
//! and the generation counter that invalidates callbacks from a replaced
//! swarm.
//!
//! This is a single owned object, not a global `static`: the
//! `LifecycleController` holds one `SwarmStateHandle` and clones it into
//! the async tasks that need to mutate it. Tests construct their own
//! isolated handle rather than sharing process-wide state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use swarm_common::{AgentStatus, ChatRecord, Role};
use tokio::sync::RwLock;

/// A tracked agent's mutable record.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub name: String,
    pub role: Role,
    pub swarm: String,
    pub task: String,
    pub status: AgentStatus,
    pub pid: Option<u32>,
    pub done_summary: Option<String>,
    pub blocker_description: Option<String>,
    pub progress_phase: Option<String>,
    pub progress_percent: Option<u32>,
    pub progress_detail: Option<String>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>, role: Role, swarm: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            swarm: swarm.into(),
            task: task.into(),
            status: AgentStatus::Starting,
            pid: None,
            done_summary: None,
            blocker_description: None,
            progress_phase: None,
            progress_percent: None,
            progress_detail: None,
        }
    }
}

/// Extra fields that may accompany a status update.
#[derive(Debug, Default, Clone)]
pub struct StatusUpdate {
    pub done_summary: Option<String>,
    pub blocker_description: Option<String>,
}

/// History plus the per-agent registry for one swarm instance.
struct SwarmStateInner {
    generation: u64,
    agents: Vec<AgentRecord>,
    message_history: VecDeque<ChatRecord>,
    all_done_fired: bool,
}

/// Maximum chat history entries retained in memory.
const MAX_HISTORY: usize = 2_000;

/// Shared, lock-guarded swarm state. Cheap to clone (an `Arc` internally).
#[derive(Clone)]
pub struct SwarmStateHandle {
    inner: Arc<RwLock<SwarmStateInner>>,
    generation_counter: Arc<AtomicU64>,
}

impl SwarmStateHandle {
    /// Create a fresh, empty swarm state and assign it the next
    /// generation. `generation_counter` is shared across swarm
    /// replacements within one `LifecycleController` so generations are
    /// strictly increasing even across `cleanup_swarm` → new swarm cycles.
    pub fn new(generation_counter: Arc<AtomicU64>) -> Self {
        let generation = generation_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            inner: Arc::new(RwLock::new(SwarmStateInner {
                generation,
                agents: Vec::new(),
                message_history: VecDeque::new(),
                all_done_fired: false,
            })),
            generation_counter,
        }
    }

    /// The live generation as of this handle's *current* counter — used by
    /// guarded callbacks to check they haven't been superseded.
    pub fn live_generation(&self) -> u64 {
        self.generation_counter.load(Ordering::SeqCst)
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Whether this handle is still the live swarm (no newer one has been
    /// created against the same counter).
    pub async fn is_live(&self) -> bool {
        self.generation().await == self.live_generation()
    }

    pub async fn register_agent(&self, record: AgentRecord) {
        let mut guard = self.inner.write().await;
        guard.agents.push(record);
    }

    pub async fn agent(&self, name: &str) -> Option<AgentRecord> {
        self.inner.read().await.agents.iter().find(|a| a.name == name).cloned()
    }

    pub async fn all_agents(&self) -> Vec<AgentRecord> {
        self.inner.read().await.agents.clone()
    }

    pub async fn set_pid(&self, name: &str, pid: u32) {
        let mut guard = self.inner.write().await;
        if let Some(agent) = guard.agents.iter_mut().find(|a| a.name == name) {
            agent.pid = Some(pid);
        }
    }

    /// Attempt `name`'s transition to `next`. Returns `true` iff the
    /// transition was valid and applied. An invalid transition leaves the
    /// record untouched (I2 in SPEC_FULL §8).
    pub async fn update_agent_status(&self, name: &str, next: AgentStatus, extra: StatusUpdate) -> bool {
        let mut guard = self.inner.write().await;
        let Some(agent) = guard.agents.iter_mut().find(|a| a.name == name) else {
            return false;
        };
        if !agent.status.can_transition_to(next) {
            return false;
        }
        agent.status = next;
        if let Some(summary) = extra.done_summary {
            agent.done_summary = Some(summary);
        }
        if let Some(desc) = extra.blocker_description {
            agent.blocker_description = Some(desc);
        }
        true
    }

    pub async fn set_progress(&self, name: &str, phase: Option<String>, percent: Option<u32>, detail: Option<String>) {
        let mut guard = self.inner.write().await;
        if let Some(agent) = guard.agents.iter_mut().find(|a| a.name == name) {
            if phase.is_some() {
                agent.progress_phase = phase;
            }
            if percent.is_some() {
                agent.progress_percent = percent;
            }
            if detail.is_some() {
                agent.progress_detail = detail;
            }
        }
    }

    /// Insert a synthesized record for a sub-agent relayed up from a
    /// nested coordinator, if it isn't already known (C8).
    pub async fn ensure_relayed_agent(&self, name: &str, role: Role, swarm: Option<String>) {
        let mut guard = self.inner.write().await;
        if guard.agents.iter().any(|a| a.name == name) {
            return;
        }
        guard.agents.push(AgentRecord::new(
            name,
            role,
            swarm.unwrap_or_default(),
            "(sub-agent)",
        ));
    }

    /// `true` once every tracked agent has reached a terminal status — and
    /// only the first caller to observe this transition gets `true` back,
    /// matching `onAllDone` firing exactly once (I3).
    pub async fn check_all_done(&self) -> bool {
        let mut guard = self.inner.write().await;
        if guard.all_done_fired || guard.agents.is_empty() {
            return false;
        }
        let all_terminal = guard.agents.iter().all(|a| a.status.is_terminal());
        if all_terminal {
            guard.all_done_fired = true;
        }
        all_terminal
    }

    pub async fn push_chat(&self, record: ChatRecord) {
        let mut guard = self.inner.write().await;
        guard.message_history.push_back(record);
        while guard.message_history.len() > MAX_HISTORY {
            guard.message_history.pop_front();
        }
    }

    pub async fn message_history(&self) -> Vec<ChatRecord> {
        self.inner.read().await.message_history.iter().cloned().collect()
    }
}
