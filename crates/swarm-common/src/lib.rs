//! Shared domain types for the swarm coordination core.
//!
//! This crate has no I/O of its own: it is the vocabulary (`Role`,
//! `Identity`, `AgentStatus`, the wire `Envelope`/`MessageData` schema, and
//! channel-name sanitization) that the transport, router, state machine,
//! and lifecycle controller in `swarm-runtime` are all built from.

pub mod error;
pub mod identity;
pub mod message;
pub mod sanitize;
pub mod status;
pub mod util;

pub use error::CommonError;
pub use identity::{can_reach, should_process, DefaultPolicy, Identity, Role, SubscriptionPolicy};
pub use message::{ChatRecord, Envelope, MessageData, ProgressInfo, RelayEvent, RelayPayload};
pub use status::AgentStatus;
pub use util::extract_json_object;
