//! C8: relay/bridging from a coordinator's nested swarm up to its parent
//! queen.

use swarm_common::{Envelope, MessageData, RelayEvent, RelayPayload, Role};
use tokio::sync::mpsc;

/// How a coordinator reaches its own parent queen's `inbox-queen` channel.
/// Absent for the root queen, which has no parent to relay to.
#[derive(Clone)]
pub struct ParentLink {
    pub sender_tx: mpsc::Sender<Envelope>,
}

impl ParentLink {
    /// Forward a relay envelope unchanged, per SPEC_FULL §4.8's
    /// passthrough rule: every level forwards everything it learns from
    /// below.
    pub async fn passthrough(&self, envelope: Envelope) {
        let _ = self.sender_tx.send(envelope).await;
    }

    /// Build and forward a fresh relay envelope for an event this
    /// coordinator observed directly from one of its own sub-agents.
    pub async fn relay_event(
        &self,
        event: RelayEvent,
        name: &str,
        role: Role,
        swarm: Option<String>,
        summary: Option<String>,
        description: Option<String>,
        content: Option<String>,
    ) {
        let envelope = build_relay_envelope(event, name, role, swarm, summary, description, content);
        self.passthrough(envelope).await;
    }
}

pub fn build_relay_envelope(
    event: RelayEvent,
    name: &str,
    role: Role,
    swarm: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    content: Option<String>,
) -> Envelope {
    Envelope::new(
        format!("relay: {name}"),
        MessageData::Relay {
            relay: RelayPayload {
                event,
                name: name.to_string(),
                role,
                swarm,
                summary,
                description,
                content,
            },
        },
    )
}

/// Status implied by a relay event, for inserting a synthesized sub-agent
/// record the first time the queen hears about it.
pub fn status_for_event(event: RelayEvent) -> Option<swarm_common::AgentStatus> {
    use swarm_common::AgentStatus::*;
    match event {
        RelayEvent::Register => Some(Running),
        RelayEvent::Done => Some(Done),
        RelayEvent::Blocked => Some(Blocked),
        RelayEvent::Disconnected => Some(Disconnected),
        RelayEvent::Message => None,
    }
}
