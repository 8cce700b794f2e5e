//! C6: spawns agent child processes in their own process group, with
//! environment wiring and a scoped temp prompt file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use swarm_common::Role;
use tokio::process::{Child, Command};
#[cfg(unix)]
use tokio::process::CommandExt;
use tracing::{debug, info};

use crate::error::SpawnError;

/// What an agent is launched with, before merging a pre-defined config.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub role: Role,
    pub swarm: String,
    pub task: String,
    pub model: Option<String>,
    pub tools: Option<Vec<String>>,
    pub system_prompt: Option<String>,
    pub cwd: Option<PathBuf>,
    pub pre_defined_agent: Option<String>,
}

/// A reusable agent profile; definitions reference one by name and inherit
/// any field they don't set explicitly.
#[derive(Debug, Clone, Default)]
pub struct PreDefinedAgentConfig {
    pub model: Option<String>,
    pub tools: Option<Vec<String>>,
    pub system_prompt: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl AgentDefinition {
    /// Merge a pre-defined config: inline fields on `self` win, missing
    /// fields inherit from `predefined`.
    pub fn merged_with(mut self, predefined: Option<&PreDefinedAgentConfig>) -> Self {
        let Some(predefined) = predefined else {
            return self;
        };
        self.model = self.model.or_else(|| predefined.model.clone());
        self.tools = self.tools.or_else(|| predefined.tools.clone());
        self.system_prompt = self.system_prompt.or_else(|| predefined.system_prompt.clone());
        self.cwd = self.cwd.or_else(|| predefined.cwd.clone());
        self
    }
}

/// Inputs to spawning shared across every agent in a swarm.
#[derive(Debug, Clone)]
pub struct SpawnContext {
    pub claude_cmd: String,
    pub channels_group_dir: PathBuf,
    pub subscribe_channels: Vec<String>,
    pub topic_channel: Option<String>,
    /// Set only for coordinators spawning their own nested swarm.
    pub task_dir: Option<PathBuf>,
}

/// A scoped temp directory holding one agent's system-prompt file, removed
/// on drop (and explicitly on child exit via [`SpawnedAgent::cleanup`]).
struct TempPromptDir {
    dir: PathBuf,
    prompt_path: PathBuf,
}

impl TempPromptDir {
    fn create(agent_name: &str, system_prompt: &str) -> Result<Self, SpawnError> {
        let unique = format!("pi-prompt-{}-{}", agent_name, std::process::id());
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).map_err(SpawnError::TempDir)?;
        let prompt_path = dir.join("system-prompt.md");
        std::fs::write(&prompt_path, system_prompt).map_err(|source| SpawnError::PromptWriteFailed {
            path: prompt_path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = std::fs::metadata(&prompt_path) {
                let mut perms = meta.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(&prompt_path, perms);
            }
        }

        Ok(Self { dir, prompt_path })
    }

    fn remove(&self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

impl Drop for TempPromptDir {
    fn drop(&mut self) {
        self.remove();
    }
}

/// A spawned child process together with the temp resources it owns.
pub struct SpawnedAgent {
    pub name: String,
    pub child: Child,
    pub pid: u32,
    pub stdout: Option<tokio::process::ChildStdout>,
    temp_prompt: Option<TempPromptDir>,
}

impl SpawnedAgent {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Remove the temp prompt file/directory. Safe to call more than once;
    /// also runs automatically when this value is dropped.
    pub fn cleanup(&mut self) {
        if let Some(temp) = self.temp_prompt.take() {
            temp.remove();
        }
    }
}

/// Launch one agent as described by `def`, wiring the channel-subscription
/// environment and process-group isolation described in SPEC_FULL §4.6.
pub async fn spawn_agent(def: &AgentDefinition, ctx: &SpawnContext) -> Result<SpawnedAgent, SpawnError> {
    let system_prompt = def.system_prompt.clone().unwrap_or_default();
    let temp_prompt = TempPromptDir::create(&def.name, &system_prompt)?;

    let mut cmd = Command::new(&ctx.claude_cmd);
    cmd.arg("--mode").arg("json").arg("-p").arg("--no-session");
    if let Some(model) = &def.model {
        cmd.arg("--model").arg(model);
    }
    if let Some(tools) = &def.tools {
        cmd.arg("--tools").arg(tools.join(","));
    }
    cmd.arg("--append-system-prompt").arg(&temp_prompt.prompt_path);
    cmd.arg(format!("Task: {}", def.task));

    if let Some(cwd) = &def.cwd {
        cmd.current_dir(cwd);
    }

    let inbox = swarm_common::sanitize::inbox_channel(&def.name);
    let mut subscribe = ctx.subscribe_channels.clone();
    if !subscribe.contains(&swarm_common::sanitize::GENERAL_CHANNEL.to_string()) {
        subscribe.push(swarm_common::sanitize::GENERAL_CHANNEL.to_string());
    }

    let mut env: HashMap<&str, String> = HashMap::new();
    env.insert("PI_CHANNELS_GROUP", ctx.channels_group_dir.display().to_string());
    env.insert("PI_CHANNELS_INBOX", inbox);
    env.insert("PI_CHANNELS_SUBSCRIBE", subscribe.join(","));
    env.insert("PI_CHANNELS_NAME", def.name.clone());
    env.insert("PI_CHANNELS_TOPIC", ctx.topic_channel.clone().unwrap_or_default());
    env.insert("PI_SWARM_AGENT_NAME", def.name.clone());
    env.insert("PI_SWARM_AGENT_ROLE", role_env_value(def.role));
    env.insert("PI_SWARM_AGENT_SWARM", def.swarm.clone());
    if def.role == Role::Coordinator {
        if let Some(task_dir) = &ctx.task_dir {
            env.insert("PI_SWARM_TASK_DIR", task_dir.display().to_string());
        }
    }
    for (k, v) in &env {
        cmd.env(k, v);
    }

    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    debug!(agent = %def.name, cmd = %ctx.claude_cmd, "spawning agent process");
    let mut child = cmd.spawn().map_err(SpawnError::Exec)?;
    let pid = child.id().ok_or_else(|| {
        SpawnError::Exec(std::io::Error::other("spawned child has no pid"))
    })?;
    let stdout = child.stdout.take();

    info!(agent = %def.name, pid, "agent process spawned");
    Ok(SpawnedAgent {
        name: def.name.clone(),
        child,
        pid,
        stdout,
        temp_prompt: Some(temp_prompt),
    })
}

fn role_env_value(role: Role) -> String {
    match role {
        Role::Queen => "queen".to_string(),
        Role::Coordinator => "coordinator".to_string(),
        Role::Agent => "agent".to_string(),
    }
}
