// Tool call logging
//
// Completed tool calls are reported to a ToolCallLog so hosts can show them
// outside the transcript (console log lines, a sidebar, an audit trail).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use agentchat_schemas::TranscriptMessage;

/// One completed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolCallRecord {
    /// Build a record from a tool bubble; None for any other message
    pub fn from_message(message: &TranscriptMessage) -> Option<Self> {
        let tool = message.tool.as_ref()?;
        let args = message
            .text()
            .filter(|text| !text.is_empty())
            .map(|text| serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())));

        Some(Self {
            name: tool.tool_name.clone(),
            call_id: tool.call_id.clone(),
            args,
            result: tool.result.clone(),
        })
    }

    /// One-line summary: "🔧 Tool Call name with args = result"
    pub fn summary(&self) -> String {
        let mut line = format!("🔧 Tool Call {}", self.name);
        if let Some(args) = self.args.as_ref().and_then(scalar_text) {
            line.push_str(&format!(" with {}", args));
        }
        if let Some(result) = self.result.as_ref().and_then(scalar_text) {
            line.push_str(&format!(" = {}", result));
        }
        line
    }
}

/// Text for strings and numbers; structured values are logged separately
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_structured(value: &Option<Value>) -> bool {
    matches!(value, Some(Value::Object(_)) | Some(Value::Array(_)))
}

/// Sink for completed tool calls
#[async_trait]
pub trait ToolCallLog: Send + Sync {
    async fn log(&self, record: ToolCallRecord);
}

/// Writes tool calls through `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingToolLog;

#[async_trait]
impl ToolCallLog for TracingToolLog {
    async fn log(&self, record: ToolCallRecord) {
        tracing::info!(tool = %record.name, call_id = ?record.call_id, "{}", record.summary());

        if is_structured(&record.args) {
            let args = serde_json::to_string_pretty(&record.args).unwrap_or_default();
            tracing::info!(tool = %record.name, "Arguments: {}", args);
        }
        if is_structured(&record.result) {
            let result = serde_json::to_string_pretty(&record.result).unwrap_or_default();
            tracing::info!(tool = %record.name, "Result: {}", result);
        }
    }
}

/// Keeps tool calls in memory (sidebars, tests)
#[derive(Debug, Clone, Default)]
pub struct InMemoryToolLog {
    records: Arc<RwLock<Vec<ToolCallRecord>>>,
}

impl InMemoryToolLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ToolCallRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl ToolCallLog for InMemoryToolLog {
    async fn log(&self, record: ToolCallRecord) {
        self.records.write().await.push(record);
    }
}
