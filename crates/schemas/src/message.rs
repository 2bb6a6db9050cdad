// Transcript message types
//
// TranscriptMessage is a display-oriented message: one bubble of the visible
// conversation. Insertion order is display order. A message stays mutable
// only while its turn is streaming; `sealed` marks it immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::file::FileContent;

/// Who a transcript message is shown as coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "assistant" | "agent" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// Progress marker shown on tool-call bubbles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Done,
    #[default]
    None,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Done => write!(f, "done"),
            MessageStatus::None => write!(f, "none"),
        }
    }
}

/// Body of a transcript message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    File(FileContent),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::File(_) => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, MessageContent::File(_))
    }
}

/// Tool invocation details carried by a tool-call bubble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub tool_name: String,
    /// Human-readable bubble title
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolCallInfo {
    pub fn new(tool_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            title: title.into(),
            call_id: None,
            result: None,
        }
    }

    pub fn with_call_id(mut self, call_id: Option<String>) -> Self {
        self.call_id = call_id;
        self
    }
}

/// One display message of the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default)]
    pub status: MessageStatus,
    /// Correlation id for streamed text, call id for tool bubbles, file id for files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolCallInfo>,
    #[serde(default)]
    pub sealed: bool,
    pub created_at: DateTime<Utc>,
}

impl TranscriptMessage {
    fn build(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content,
            status: MessageStatus::None,
            correlation_key: None,
            tool: None,
            sealed: false,
            created_at: Utc::now(),
        }
    }

    /// User text message, sealed on creation
    pub fn user(text: impl Into<String>) -> Self {
        let mut message = Self::build(MessageRole::User, MessageContent::Text(text.into()));
        message.sealed = true;
        message
    }

    /// User attachment message, sealed on creation
    pub fn user_attachment(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = FileContent::name_from_path(&path);
        let mut message = Self::build(
            MessageRole::User,
            MessageContent::File(FileContent::new(Vec::new()).with_name(name)),
        );
        message.correlation_key = Some(path);
        message.sealed = true;
        message
    }

    /// Streamed assistant text keyed by its correlation id
    pub fn assistant_text(correlation_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut message = Self::build(MessageRole::Assistant, MessageContent::Text(text.into()));
        message.correlation_key = Some(correlation_id.into());
        message
    }

    /// Pending tool-call bubble
    pub fn tool_call(tool: ToolCallInfo, text: impl Into<String>) -> Self {
        let mut message = Self::build(MessageRole::Assistant, MessageContent::Text(text.into()));
        message.status = MessageStatus::Pending;
        message.correlation_key = tool.call_id.clone();
        message.tool = Some(tool);
        message
    }

    /// Assistant file message, sealed on creation
    pub fn file(file_id: impl Into<String>, file: FileContent) -> Self {
        let mut message = Self::build(MessageRole::Assistant, MessageContent::File(file));
        message.correlation_key = Some(file_id.into());
        message.sealed = true;
        message
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    pub fn is_tool_call(&self) -> bool {
        self.tool.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    /// Plain assistant text (not a tool bubble, not a file)
    pub fn is_assistant_text(&self) -> bool {
        self.role == MessageRole::Assistant && self.tool.is_none() && !self.content.is_file()
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_ref().map(|t| t.tool_name.as_str())
    }

    pub fn call_id(&self) -> Option<&str> {
        self.tool.as_ref().and_then(|t| t.call_id.as_deref())
    }
}

/// What the user submitted for one turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub text: String,
    /// Paths or names of uploaded files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl UserInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, path: impl Into<String>) -> Self {
        self.attachments.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_is_sealed() {
        let msg = TranscriptMessage::user("Hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.text(), Some("Hello"));
        assert_eq!(msg.status, MessageStatus::None);
        assert!(msg.sealed);
    }

    #[test]
    fn test_user_attachment_keeps_file_name() {
        let msg = TranscriptMessage::user_attachment("/tmp/upload/chart.png");
        match &msg.content {
            MessageContent::File(file) => assert_eq!(file.name.as_deref(), Some("chart.png")),
            other => panic!("expected file content, got {:?}", other),
        }
        assert_eq!(msg.correlation_key.as_deref(), Some("/tmp/upload/chart.png"));
    }

    #[test]
    fn test_tool_call_message() {
        let tool = ToolCallInfo::new("fetch_weather", "☁️ fetching weather")
            .with_call_id(Some("call1".to_string()));
        let msg = TranscriptMessage::tool_call(tool, "{}");
        assert!(msg.is_tool_call());
        assert!(msg.is_pending());
        assert!(!msg.is_assistant_text());
        assert_eq!(msg.call_id(), Some("call1"));
        assert_eq!(msg.correlation_key.as_deref(), Some("call1"));
        assert!(!msg.sealed);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(MessageStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
        assert_eq!(MessageStatus::default(), MessageStatus::None);
        assert_eq!(MessageStatus::Done.to_string(), "done");
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(MessageRole::from("agent"), MessageRole::Assistant);
        assert_eq!(MessageRole::from("Assistant"), MessageRole::Assistant);
        assert_eq!(MessageRole::from("user"), MessageRole::User);
    }
}
