// Recorded conversation scripts
//
// A script lists user turns and the raw events the agent answered with,
// plus the files those events reference. JSON and YAML are both accepted.
//
// {
//   "turns": [
//     { "user": "weather?", "events": [{"type": "text_delta", ...}] }
//   ],
//   "files": { "file-1": { "name": "chart.png", "data": "iVBORw0..." } }
// }

use std::collections::HashMap;
use std::path::Path;

use agentchat_core::{FileContent, InMemoryFileStore, ScriptedAgent, StreamEvent, UserInput};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub turns: Vec<ScriptTurn>,
    #[serde(default)]
    pub files: HashMap<String, FileContent>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptTurn {
    pub user: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Raw events; undecodable entries are skipped with a warning
    #[serde(default)]
    pub events: Vec<Value>,
}

impl ScriptTurn {
    pub fn input(&self) -> UserInput {
        self.attachments
            .iter()
            .fold(UserInput::new(self.user.as_str()), |input, path| {
                input.with_attachment(path.as_str())
            })
    }

    /// Decode the events, dropping the ones that do not parse
    pub fn decoded_events(&self) -> (Vec<StreamEvent>, usize) {
        let mut skipped = 0;
        let events = self
            .events
            .iter()
            .filter_map(|raw| match StreamEvent::from_json(raw.clone()) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable scripted event");
                    skipped += 1;
                    None
                }
            })
            .collect();
        (events, skipped)
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let script: Script = if is_yaml {
            serde_yaml::from_str(raw)
                .with_context(|| format!("Failed to parse YAML script: {}", path.display()))?
        } else {
            serde_json::from_str(raw)
                .with_context(|| format!("Failed to parse JSON script: {}", path.display()))?
        };

        tracing::debug!(
            turns = script.turns.len(),
            files = script.files.len(),
            "Loaded script from {}",
            path.display()
        );
        Ok(script)
    }

    /// Queue every turn's events on a scripted agent
    pub async fn into_agent(&self, agent: &ScriptedAgent) -> usize {
        let mut skipped = 0;
        for turn in &self.turns {
            let (events, dropped) = turn.decoded_events();
            skipped += dropped;
            agent.push_turn(events).await;
        }
        skipped
    }

    pub async fn file_store(&self) -> InMemoryFileStore {
        let store = InMemoryFileStore::new();
        for (file_id, file) in &self.files {
            store.insert(file_id.as_str(), file.clone()).await;
        }
        store
    }
}
