//! Loads the agent roster file the CLI harness spawns a swarm from.
//!
//! This is deliberately minimal: the full "embedding host" API (markdown
//! task-directory discovery, interactive tool registration) is out of
//! scope per SPEC_FULL §1. A roster file is just a JSON array of agent
//! definitions good enough to drive `LifecycleController::start_swarm`.

use std::path::Path;

use serde::Deserialize;
use swarm_common::Role;
use swarm_runtime::{AgentDefinition, AgentSpec};

use crate::errors::RosterError;

#[derive(Debug, Deserialize)]
struct RosterEntry {
    name: String,
    role: Role,
    swarm: String,
    task: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tools: Option<Vec<String>>,
    #[serde(default)]
    system_prompt: Option<String>,
}

pub fn load_roster(path: &Path) -> Result<Vec<AgentSpec>, RosterError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RosterError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: Vec<RosterEntry> =
        serde_json::from_str(&contents).map_err(|source| RosterError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;

    if entries.is_empty() {
        return Err(RosterError::Empty);
    }

    let mut seen = std::collections::HashSet::new();
    let mut specs = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.name.clone()) {
            return Err(RosterError::DuplicateName { name: entry.name });
        }
        specs.push(AgentSpec {
            def: AgentDefinition {
                name: entry.name,
                role: entry.role,
                swarm: entry.swarm,
                task: entry.task,
                model: entry.model,
                tools: entry.tools,
                system_prompt: entry.system_prompt,
                cwd: None,
                pre_defined_agent: None,
            },
        });
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_a_simple_roster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"[{"name":"a1","role":"agent","swarm":"s1","task":"say hi"}]"#,
        )
        .unwrap();

        let specs = load_roster(&path).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].def.name, "a1");
    }

    #[test]
    fn rejects_empty_roster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(load_roster(&path), Err(RosterError::Empty)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"[
                {"name":"a1","role":"agent","swarm":"s1","task":"t1"},
                {"name":"a1","role":"agent","swarm":"s1","task":"t2"}
            ]"#,
        )
        .unwrap();
        assert!(matches!(load_roster(&path), Err(RosterError::DuplicateName { .. })));
    }

    #[test]
    fn missing_file_is_a_read_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(load_roster(&path), Err(RosterError::ReadFailed { .. })));
    }
}
