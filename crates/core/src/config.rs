// Chat configuration
//
// Settings come from environment variables (a `.env` file is loaded by the
// binary before this runs). Tool titles load from a TOML file, falling back
// to the built-in table embedded in the binary.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{ChatError, Result};
use crate::tools::ToolTitles;

/// Built-in tool titles (embedded in binary)
const DEFAULT_TOOL_TITLES_CONFIG: &str = include_str!("../../../config/tool_titles.toml");

pub const DEFAULT_AGENT_NAME: &str = "my-agent";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Runtime settings for chat front ends
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Display name of the agent
    pub agent_name: String,
    /// Optional TOML file with tool title overrides
    pub tool_titles_path: Option<PathBuf>,
    /// Buffer size of the event channel between SDK adapter and session
    pub channel_capacity: usize,
    /// Sessions idle this long are evicted from the registry
    pub session_idle: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            tool_titles_path: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            session_idle: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl ChatConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `AGENTCHAT_AGENT_NAME`: Agent display name (default: "my-agent")
    /// - `AGENTCHAT_TOOL_TITLES`: Path to a tool titles TOML file
    /// - `AGENTCHAT_CHANNEL_CAPACITY`: Event channel buffer size (default: 256)
    /// - `AGENTCHAT_SESSION_IDLE_SECS`: Idle session eviction age (default: 1800)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let channel_capacity = match non_empty("AGENTCHAT_CHANNEL_CAPACITY") {
            Some(raw) => parse_number::<usize>("AGENTCHAT_CHANNEL_CAPACITY", &raw)?,
            None => defaults.channel_capacity,
        };
        if channel_capacity == 0 {
            return Err(ChatError::config(
                "AGENTCHAT_CHANNEL_CAPACITY must be greater than zero",
            ));
        }

        let session_idle = match non_empty("AGENTCHAT_SESSION_IDLE_SECS") {
            Some(raw) => Duration::from_secs(parse_number::<u64>("AGENTCHAT_SESSION_IDLE_SECS", &raw)?),
            None => defaults.session_idle,
        };

        Ok(Self {
            agent_name: non_empty("AGENTCHAT_AGENT_NAME").unwrap_or(defaults.agent_name),
            tool_titles_path: non_empty("AGENTCHAT_TOOL_TITLES").map(PathBuf::from),
            channel_capacity,
            session_idle,
        })
    }

    /// Load the tool titles this configuration points at
    pub fn tool_titles(&self) -> Result<ToolTitles> {
        load_tool_titles(self.tool_titles_path.as_deref())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ChatError::config(format!("{} must be a number, got {:?}", key, raw)))
}

/// Tool titles file structure
#[derive(Debug, Deserialize)]
struct ToolTitlesFile {
    #[serde(default)]
    titles: HashMap<String, String>,
}

/// Load tool titles from file or use built-in defaults
///
/// Entries from the file are merged over the built-in table, so a file only
/// needs the titles it changes. A missing file falls back to the defaults.
pub fn load_tool_titles(config_path: Option<&Path>) -> Result<ToolTitles> {
    let config_str = match config_path {
        Some(path) if path.exists() => {
            tracing::info!("Loading tool titles from: {}", path.display());
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read tool titles file: {}", path.display()))?
        }
        Some(path) => {
            tracing::warn!(
                "Tool titles file {} not found, using built-in defaults",
                path.display()
            );
            DEFAULT_TOOL_TITLES_CONFIG.to_string()
        }
        None => DEFAULT_TOOL_TITLES_CONFIG.to_string(),
    };

    parse_tool_titles(&config_str)
}

/// Parse tool titles from a TOML string
pub fn parse_tool_titles(config_str: &str) -> Result<ToolTitles> {
    let file: ToolTitlesFile = toml::from_str(config_str)
        .map_err(|e| ChatError::config(format!("Failed to parse tool titles TOML: {}", e)))?;

    let mut titles = ToolTitles::default();
    let overrides = file.titles.len();
    titles.extend(file.titles);

    tracing::debug!(overrides, total = titles.len(), "Loaded tool titles");
    Ok(titles)
}
