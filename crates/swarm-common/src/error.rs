//! Errors shared by domain types that can themselves fail to construct.

use thiserror::Error;

/// Errors raised while parsing or validating shared domain values.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("agent role requires a swarm id")]
    MissingSwarm,

    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: crate::status::AgentStatus, to: crate::status::AgentStatus },

    #[error("channel name sanitizes to an empty string")]
    EmptyChannelName,
}
