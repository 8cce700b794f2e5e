//! Role and identity model, and the default reachability policy.

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// A process's place in the swarm hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Queen,
    Coordinator,
    Agent,
}

/// Immutable identity of one process within the swarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: Role,
    /// Required for `Coordinator`/`Agent`, absent for `Queen`.
    pub swarm: Option<String>,
}

impl Identity {
    pub fn queen(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Queen,
            swarm: None,
        }
    }

    pub fn new(name: impl Into<String>, role: Role, swarm: Option<String>) -> Result<Self, CommonError> {
        if role != Role::Queen && swarm.is_none() {
            return Err(CommonError::MissingSwarm);
        }
        Ok(Self {
            name: name.into(),
            role,
            swarm,
        })
    }
}

/// Pluggable reachability policy, so a peer-queen extension can widen what
/// a queen may subscribe to / publish to without touching call sites that
/// only know about the default role table.
pub trait SubscriptionPolicy {
    /// Whether `from` is permitted to address a message to `to` at all.
    fn can_reach(&self, from: &Identity, to: &Identity) -> bool;
}

/// The role table in the component design: queen reaches everyone,
/// coordinators reach the queen/each other/their own agents, agents reach
/// their own swarm's agents and coordinator but never the queen.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl SubscriptionPolicy for DefaultPolicy {
    fn can_reach(&self, from: &Identity, to: &Identity) -> bool {
        use Role::*;
        match (from.role, to.role) {
            (Queen, _) => true,
            (Coordinator, Queen) => true,
            (Coordinator, Coordinator) => true,
            (Coordinator, Agent) => to.swarm == from.swarm,
            (Agent, Agent) => to.swarm == from.swarm,
            (Agent, Coordinator) => to.swarm == from.swarm,
            (Agent, Queen) => false,
        }
    }
}

/// Free function wrapping [`DefaultPolicy`] for call sites that don't need
/// a pluggable policy (most of the runtime).
pub fn can_reach(from: &Identity, to: &Identity) -> bool {
    DefaultPolicy.can_reach(from, to)
}

/// Receiver-side filter: should `me` process a message authored by
/// `msg_from`, optionally targeted at `msg_to`, optionally scoped to
/// `msg_swarm` (only meaningful for `instruct` messages)?
pub fn should_process(
    me: &Identity,
    msg_from: Option<&str>,
    msg_to: Option<&str>,
    instruct_swarm: Option<&str>,
) -> bool {
    let Some(from) = msg_from else {
        return false;
    };
    if from == me.name {
        return false;
    }
    if let Some(swarm) = instruct_swarm {
        if me.swarm.as_deref() != Some(swarm) {
            return false;
        }
    }
    if let Some(to) = msg_to {
        if to != me.name {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str, role: Role, swarm: Option<&str>) -> Identity {
        Identity {
            name: name.to_string(),
            role,
            swarm: swarm.map(str::to_string),
        }
    }

    #[test]
    fn queen_reaches_everyone() {
        let queen = id("q", Role::Queen, None);
        let agent = id("a1", Role::Agent, Some("s1"));
        let coord = id("c1", Role::Coordinator, Some("s1"));
        assert!(can_reach(&queen, &agent));
        assert!(can_reach(&queen, &coord));
        assert!(can_reach(&queen, &queen));
    }

    #[test]
    fn reachability_is_not_symmetric() {
        let queen = id("q", Role::Queen, None);
        let agent = id("a1", Role::Agent, Some("s1"));
        assert!(can_reach(&queen, &agent));
        assert!(!can_reach(&agent, &queen));
    }

    #[test]
    fn coordinator_reaches_own_swarm_agents_only() {
        let coord = id("c1", Role::Coordinator, Some("s1"));
        let same_swarm_agent = id("a1", Role::Agent, Some("s1"));
        let other_swarm_agent = id("a2", Role::Agent, Some("s2"));
        assert!(can_reach(&coord, &same_swarm_agent));
        assert!(!can_reach(&coord, &other_swarm_agent));
    }

    #[test]
    fn agent_never_reaches_queen() {
        let agent = id("a1", Role::Agent, Some("s1"));
        let queen = id("q", Role::Queen, None);
        assert!(!can_reach(&agent, &queen));
    }

    #[test]
    fn agent_reaches_same_swarm_coordinator() {
        let agent = id("a1", Role::Agent, Some("s1"));
        let coord = id("c1", Role::Coordinator, Some("s1"));
        assert!(can_reach(&agent, &coord));
    }

    #[test]
    fn should_process_rejects_self_echo() {
        let me = id("a1", Role::Agent, Some("s1"));
        assert!(!should_process(&me, Some("a1"), None, None));
    }

    #[test]
    fn should_process_rejects_missing_from() {
        let me = id("a1", Role::Agent, Some("s1"));
        assert!(!should_process(&me, None, None, None));
    }

    #[test]
    fn should_process_instruct_is_swarm_scoped() {
        let me = id("a1", Role::Agent, Some("beta"));
        assert!(!should_process(&me, Some("q"), None, Some("alpha")));
        assert!(should_process(&me, Some("q"), None, Some("beta")));
    }

    #[test]
    fn should_process_accepts_unscoped_swarm_for_non_instruct() {
        let me = id("a1", Role::Agent, Some("s1"));
        assert!(should_process(&me, Some("a2"), None, None));
    }

    #[test]
    fn should_process_rejects_mismatched_explicit_target() {
        let me = id("a1", Role::Agent, Some("s1"));
        assert!(!should_process(&me, Some("q"), Some("a2"), None));
        assert!(should_process(&me, Some("q"), Some("a1"), None));
    }

    #[test]
    fn new_rejects_missing_swarm_for_non_queen() {
        assert!(Identity::new("a1", Role::Agent, None).is_err());
        assert!(Identity::new("c1", Role::Coordinator, None).is_err());
        assert!(Identity::new("q", Role::Queen, None).is_ok());
    }
}
