//! Layered configuration for the swarm operator CLI harness.
//!
//! Precedence, lowest to highest: built-in defaults, an optional `pi.toml`
//! file, environment variables, then explicit CLI flags. This mirrors the
//! file → environment → CLI layering of the orchestrator this crate grew
//! out of, trimmed down to the handful of knobs the lifecycle controller
//! actually needs.
//!
//! Example `pi.toml`:
//!
//! ```toml
//! [swarm]
//! base_dir = "/tmp/pi-swarm"
//! claude_cmd = "claude"
//! registration_timeout_secs = 30
//! shutdown_timeout_secs = 30
//! shutdown_poll_ms = 2000
//! kill_grace_secs = 5
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConfigError;

const DEFAULT_BASE_DIR: &str = "/tmp/pi-swarm";
const DEFAULT_CLAUDE_CMD: &str = "claude";
const DEFAULT_REGISTRATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_POLL_MS: u64 = 2_000;
const DEFAULT_KILL_GRACE_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
struct PiToml {
    #[serde(default)]
    swarm: SwarmToml,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SwarmToml {
    base_dir: Option<PathBuf>,
    claude_cmd: Option<String>,
    registration_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
    shutdown_poll_ms: Option<u64>,
    kill_grace_secs: Option<u64>,
}

/// Resolved configuration handed to the `LifecycleController`.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_dir: PathBuf,
    pub claude_cmd: String,
    pub registration_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub shutdown_poll_ms: u64,
    pub kill_grace_secs: u64,
    pub verbose: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            claude_cmd: DEFAULT_CLAUDE_CMD.to_string(),
            registration_timeout_secs: DEFAULT_REGISTRATION_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            shutdown_poll_ms: DEFAULT_SHUTDOWN_POLL_MS,
            kill_grace_secs: DEFAULT_KILL_GRACE_SECS,
            verbose: false,
        }
    }
}

impl HarnessConfig {
    /// Build the effective configuration: defaults, then an optional TOML
    /// file, then environment variables, then CLI overrides.
    ///
    /// `config_path` is only read if the file exists; a missing file is not
    /// an error (most invocations rely on defaults + environment alone).
    pub fn load(
        config_path: Option<&Path>,
        cli_base_dir: Option<PathBuf>,
        cli_claude_cmd: Option<String>,
        verbose: bool,
    ) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.verbose = verbose;

        if let Some(path) = config_path {
            if path.exists() {
                cfg.apply_file(path)?;
            }
        }

        cfg.apply_env();

        if let Some(dir) = cli_base_dir {
            cfg.base_dir = dir;
        }
        if let Some(cmd) = cli_claude_cmd {
            cfg.claude_cmd = cmd;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: PiToml = toml::from_str(&contents).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let s = parsed.swarm;
        if let Some(v) = s.base_dir {
            self.base_dir = v;
        }
        if let Some(v) = s.claude_cmd {
            self.claude_cmd = v;
        }
        if let Some(v) = s.registration_timeout_secs {
            self.registration_timeout_secs = v;
        }
        if let Some(v) = s.shutdown_timeout_secs {
            self.shutdown_timeout_secs = v;
        }
        if let Some(v) = s.shutdown_poll_ms {
            self.shutdown_poll_ms = v;
        }
        if let Some(v) = s.kill_grace_secs {
            self.kill_grace_secs = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("PI_SWARM_BASE_DIR") {
            self.base_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PI_CLAUDE_CMD") {
            self.claude_cmd = v;
        }
        if let Some(v) = env_u64("PI_REGISTRATION_TIMEOUT_SECS") {
            self.registration_timeout_secs = v;
        }
        if let Some(v) = env_u64("PI_SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs = v;
        }
        if let Some(v) = env_u64("PI_SHUTDOWN_POLL_MS") {
            self.shutdown_poll_ms = v;
        }
        if let Some(v) = env_u64("PI_KILL_GRACE_SECS") {
            self.kill_grace_secs = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.claude_cmd.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "claude_cmd".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.registration_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "registration_timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.shutdown_poll_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "shutdown_poll_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
