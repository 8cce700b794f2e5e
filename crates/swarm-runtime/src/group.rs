//! C3: a channel group — a directory of channels belonging to one swarm
//! instance, started and stopped atomically.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::channel::Channel;
use crate::error::GroupError;
use crate::transport::Framing;

/// A set of named channels sharing one directory.
pub struct ChannelGroup {
    path: PathBuf,
    framing: Framing,
    channels: Vec<Channel>,
}

impl ChannelGroup {
    /// Construct a group for the given channel names; directory mode is
    /// `0o700` once created in [`start`](Self::start).
    pub fn new(path: PathBuf, channel_names: &[String], framing: Framing) -> Self {
        let channels = channel_names
            .iter()
            .map(|name| Channel::new(name.clone(), path.join(format!("{name}.sock")), framing))
            .collect();
        Self {
            path,
            framing,
            channels,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(Channel::name).collect()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    pub fn socket_path(&self, name: &str) -> Option<PathBuf> {
        self.channel(name).map(|c| c.socket_path().to_path_buf())
    }

    /// Create the directory and start every channel. On any channel
    /// failing to bind, already-started channels are stopped and the
    /// directory is removed before returning the error.
    pub async fn start(&mut self) -> Result<(), GroupError> {
        create_group_dir(&self.path)?;

        for channel in &mut self.channels {
            if let Err(source) = channel.start().await {
                warn!(channel = channel.name(), error = %source, "channel failed to start, rolling back group");
                let name = channel.name().to_string();
                self.rollback_started().await;
                let _ = std::fs::remove_dir_all(&self.path);
                return Err(GroupError::ChannelStartFailed { name, source });
            }
        }

        info!(path = %self.path.display(), channels = self.channels.len(), "channel group started");
        Ok(())
    }

    async fn rollback_started(&mut self) {
        for channel in &mut self.channels {
            if channel.is_running() {
                channel.stop().await;
            }
        }
    }

    /// Stop every channel in parallel and optionally remove the directory.
    pub async fn stop(&mut self, remove_dir: bool) {
        let stops = self.channels.iter_mut().map(|c| c.stop());
        futures_util::future::join_all(stops).await;

        if remove_dir {
            let _ = std::fs::remove_dir_all(&self.path);
        }
        info!(path = %self.path.display(), "channel group stopped");
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

#[cfg(unix)]
fn create_group_dir(path: &Path) -> Result<(), GroupError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(path).map_err(|source| GroupError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut perms = std::fs::metadata(path)
        .map_err(|source| GroupError::CreateDirFailed {
            path: path.to_path_buf(),
            source,
        })?
        .permissions();
    perms.set_mode(0o700);
    std::fs::set_permissions(path, perms).map_err(|source| GroupError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn create_group_dir(path: &Path) -> Result<(), GroupError> {
    std::fs::create_dir_all(path).map_err(|source| GroupError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })
}
