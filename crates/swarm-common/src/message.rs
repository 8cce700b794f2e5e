//! Wire-level message schema.
//!
//! The outer envelope is `{ msg, data }`; `data.type` selects one of a
//! closed set of payloads. Modeling `data` as a single `#[serde(tag =
//! "type")]` enum (rather than a string discriminator matched by hand at
//! every receiver) makes every dispatch site exhaustive at compile time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Role;

/// Optional progress attached to a `message` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub phase: Option<String>,
    pub percent: Option<u32>,
}

/// The event kind carried by a `relay` payload (see component design §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayEvent {
    Register,
    Done,
    Blocked,
    Disconnected,
    Message,
}

/// Body of a `relay` payload: a coordinator forwarding a sub-agent event to
/// its own parent queen, unchanged in meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub event: RelayEvent,
    pub name: String,
    pub role: Role,
    pub swarm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The `data` field of a message envelope: closed tagged variant over
/// `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageData {
    Register {
        from: String,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        swarm: Option<String>,
    },
    Done {
        from: String,
        summary: String,
    },
    Blocker {
        from: String,
        description: String,
    },
    Message {
        from: String,
        role: Role,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<ProgressInfo>,
    },
    Instruct {
        from: String,
        instruction: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        swarm: Option<String>,
    },
    Progress {
        from: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Relay {
        relay: RelayPayload,
    },
    AgentCrashed {
        #[serde(default = "system_sender")]
        from: String,
        agent: String,
        exit_code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_activity: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

fn system_sender() -> String {
    "system".to_string()
}

impl MessageData {
    /// The `from` field carried by every variant (`agent_crashed` always
    /// reports `"system"`).
    pub fn from(&self) -> &str {
        match self {
            MessageData::Register { from, .. } => from,
            MessageData::Done { from, .. } => from,
            MessageData::Blocker { from, .. } => from,
            MessageData::Message { from, .. } => from,
            MessageData::Instruct { from, .. } => from,
            MessageData::Progress { from, .. } => from,
            MessageData::Relay { relay } => &relay.name,
            MessageData::AgentCrashed { from, .. } => from,
        }
    }

    /// Explicit `to` target, when the payload carries one.
    pub fn to(&self) -> Option<&str> {
        match self {
            MessageData::Message { to, .. } => to.as_deref(),
            MessageData::Instruct { to, .. } => to.as_deref(),
            _ => None,
        }
    }

    /// Swarm scoping, meaningful only for `instruct` per the router rules.
    pub fn instruct_swarm(&self) -> Option<&str> {
        match self {
            MessageData::Instruct { swarm, .. } => swarm.as_deref(),
            _ => None,
        }
    }

    /// Should this type be deduplicated when received from both
    /// `inbox-queen` and `general`? Per the lifecycle controller's dispatch
    /// rules, only `register`/`done`/`blocker` are double-published.
    pub fn is_deduplicated_on_general(&self) -> bool {
        matches!(
            self,
            MessageData::Register { .. } | MessageData::Done { .. } | MessageData::Blocker { .. }
        )
    }
}

/// The full wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub msg: String,
    pub data: MessageData,
}

impl Envelope {
    pub fn new(msg: impl Into<String>, data: MessageData) -> Self {
        Self { msg: msg.into(), data }
    }
}

/// In-memory-only chat history record (not persisted across restarts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub from: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub channel: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_round_trips_through_json() {
        let env = Envelope::new(
            "register",
            MessageData::Register {
                from: "a1".to_string(),
                role: Role::Agent,
                swarm: Some("s1".to_string()),
            },
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn data_type_tag_is_snake_case() {
        let data = MessageData::AgentCrashed {
            from: system_sender(),
            agent: "a1".to_string(),
            exit_code: 137,
            last_activity: None,
            error: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "agent_crashed");
        assert_eq!(json["from"], "system");
    }

    #[test]
    fn agent_crashed_from_defaults_to_system_when_absent() {
        let json = r#"{"type":"agent_crashed","agent":"a1","exit_code":1}"#;
        let data: MessageData = serde_json::from_str(json).unwrap();
        assert_eq!(data.from(), "system");
    }

    #[test]
    fn from_accessor_covers_every_variant() {
        let relay = MessageData::Relay {
            relay: RelayPayload {
                event: RelayEvent::Done,
                name: "x1".to_string(),
                role: Role::Agent,
                swarm: Some("inner".to_string()),
                summary: Some("finished".to_string()),
                description: None,
                content: None,
            },
        };
        assert_eq!(relay.from(), "x1");
    }

    #[test]
    fn instruct_swarm_scoping_only_applies_to_instruct() {
        let instruct = MessageData::Instruct {
            from: "q".to_string(),
            instruction: "wrap up".to_string(),
            to: None,
            swarm: Some("s1".to_string()),
        };
        assert_eq!(instruct.instruct_swarm(), Some("s1"));

        let message = MessageData::Message {
            from: "a1".to_string(),
            role: Role::Agent,
            content: "hi".to_string(),
            to: None,
            progress: None,
        };
        assert_eq!(message.instruct_swarm(), None);
    }

    #[test]
    fn dedup_flag_matches_spec_table() {
        let done = MessageData::Done { from: "a".into(), summary: "s".into() };
        let blocker = MessageData::Blocker { from: "a".into(), description: "d".into() };
        let register = MessageData::Register { from: "a".into(), role: Role::Agent, swarm: None };
        let progress = MessageData::Progress { from: "a".into(), phase: None, percent: None, detail: None };
        assert!(done.is_deduplicated_on_general());
        assert!(blocker.is_deduplicated_on_general());
        assert!(register.is_deduplicated_on_general());
        assert!(!progress.is_deduplicated_on_general());
    }

    #[test]
    fn unknown_type_tag_fails_to_parse() {
        let json = r#"{"type":"unknown_thing","from":"a"}"#;
        assert!(serde_json::from_str::<MessageData>(json).is_err());
    }
}
