//! Agent status and its enforced transition table.
//!
//! The table is the load-bearing invariant: several independent code paths
//! (process exit, a `done` message, the registration timeout) can race to
//! update the same agent, and only the first transition that is actually
//! valid from the agent's current state may take effect.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Running,
    Blocked,
    Done,
    Crashed,
    Disconnected,
}

impl AgentStatus {
    /// Whether `self` is a terminal status that never transitions again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentStatus::Done | AgentStatus::Crashed | AgentStatus::Disconnected
        )
    }

    /// Whether transitioning from `self` to `next` is permitted.
    ///
    /// This is the single source of truth for the table in the component
    /// design: every other call site (status.rs's own `transition`, the
    /// runtime's `updateAgentStatus`) must route through this function
    /// rather than re-deriving the table.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        match (self, next) {
            (Starting, Running) => true,
            (Starting, Crashed) => true,
            (Starting, Disconnected) => true,
            (Running, Blocked) => true,
            (Running, Done) => true,
            (Running, Crashed) => true,
            (Running, Disconnected) => true,
            (Blocked, Running) => true,
            (Blocked, Done) => true,
            (Blocked, Crashed) => true,
            (Blocked, Disconnected) => true,
            _ => false,
        }
    }
}
