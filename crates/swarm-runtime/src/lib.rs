//! Swarm coordination runtime: framed transport, fan-out channels, a
//! channel group, the identity router, the swarm state machine, the
//! process spawner, the lifecycle controller, and relay/bridging.
//!
//! See `SPEC_FULL.md` at the workspace root for the full component design.

pub mod channel;
pub mod error;
pub mod group;
pub mod lifecycle;
pub mod notification;
pub mod relay;
pub mod router;
pub mod spawner;
pub mod state;
pub mod transport;

pub use channel::{Channel, ChannelClient};
pub use group::ChannelGroup;
pub use lifecycle::{AgentSpec, LifecycleConfig, LifecycleController};
pub use notification::{LoggingSink, Notification, NotificationSink, Severity};
pub use relay::ParentLink;
pub use spawner::{AgentDefinition, PreDefinedAgentConfig, SpawnContext, SpawnedAgent};
pub use state::{AgentRecord, StatusUpdate, SwarmStateHandle};
pub use transport::{Framing, MessageCodec};
