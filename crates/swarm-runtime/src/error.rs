//! Typed error hierarchy for the runtime, one enum per subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the framed transport (C1).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame length {len} exceeds the maximum of {max}")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("malformed JSON frame: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("transport closed mid-frame")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from a single channel (C2).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("socket path {0} already exists")]
    SocketExists(PathBuf),

    #[error("failed to bind socket at {path}: {source}")]
    BindFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel is not running")]
    NotRunning,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from a channel group (C3).
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("failed to create channel group directory at {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel '{name}' failed to start: {source}")]
    ChannelStartFailed {
        name: String,
        #[source]
        source: ChannelError,
    },
}

/// Errors from the spawner (C6).
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to write prompt file at {path}: {source}")]
    PromptWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn process: {0}")]
    Exec(#[source] std::io::Error),

    #[error("failed to create temp directory: {0}")]
    TempDir(#[source] std::io::Error),
}

/// Top-level errors from the lifecycle controller (C7).
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("a swarm is already active")]
    SwarmAlreadyActive,

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("queen failed to connect to channel '{name}': {source}")]
    QueenConnectFailed {
        name: String,
        #[source]
        source: ChannelError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_frame_too_large_carries_both_sizes() {
        let err = TransportError::FrameTooLarge { len: 100, max: 50 };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn lifecycle_error_converts_from_group_error() {
        let inner = GroupError::CreateDirFailed {
            path: PathBuf::from("/tmp/pi-swarm/x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let err: LifecycleError = inner.into();
        assert!(matches!(err, LifecycleError::Group(_)));
    }

    #[test]
    fn channel_error_converts_from_transport_error() {
        let inner = TransportError::Closed;
        let err: ChannelError = inner.into();
        assert!(matches!(err, ChannelError::Transport(TransportError::Closed)));
    }

    #[test]
    fn swarm_already_active_message() {
        let err = LifecycleError::SwarmAlreadyActive;
        assert_eq!(err.to_string(), "a swarm is already active");
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&TransportError::Closed);
        assert_std_error(&ChannelError::NotRunning);
        assert_std_error(&SpawnError::TempDir(std::io::Error::other("x")));
        assert_std_error(&LifecycleError::SwarmAlreadyActive);
    }
}
