// Stream Event Protocol
//
// This module defines the closed set of events an agent invocation produces
// while streaming a response. Vendor SDK adapters translate their callback
// payloads into these variants; the transcript reconciler consumes them.
//
// JSON shape: {"type": "<variant>", ...fields}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file::FileContent;

// ============================================================================
// Event Type Constants
// ============================================================================

pub const TEXT_DELTA: &str = "text.delta";
pub const TOOL_CALL_STARTED: &str = "tool.call_started";
pub const TOOL_CALL_COMPLETED: &str = "tool.call_completed";
pub const ANNOTATION: &str = "annotation";
pub const FILE_REFERENCE: &str = "file.reference";

// ============================================================================
// Errors
// ============================================================================

/// Why an event was rejected at the schema boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Payload could not be decoded into a known variant
    #[error("Failed to decode event: {0}")]
    Decode(String),

    /// A required field is empty or absent
    #[error("Malformed {event_type} event: missing {field}")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },
}

// ============================================================================
// StreamEvent
// ============================================================================

/// One event of an agent response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental chunk of assistant text for one logical response message
    TextDelta { correlation_id: String, text: String },

    /// A tool invocation has begun. Some hosted tools only report their id later.
    ToolCallStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_arguments: Option<serde_json::Value>,
    },

    /// A previously started tool invocation has completed
    ToolCallResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        /// Contextual data used to correlate results that carry no id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_summary: Option<serde_json::Value>,
    },

    /// Inline citation for the latest assistant message of a response
    Annotation {
        correlation_id: String,
        title: String,
        url: String,
    },

    /// Binary artifact produced by the turn. `file` is filled in once fetched.
    FileReference {
        file_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<FileContent>,
    },
}

impl StreamEvent {
    /// Create a text delta event
    pub fn text_delta(correlation_id: impl Into<String>, text: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            correlation_id: correlation_id.into(),
            text: text.into(),
        }
    }

    /// Create a tool call start event with a known call id
    pub fn tool_start(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        partial_arguments: Option<serde_json::Value>,
    ) -> Self {
        StreamEvent::ToolCallStart {
            call_id: Some(call_id.into()),
            tool_name: tool_name.into(),
            partial_arguments,
        }
    }

    /// Create a tool call start event whose call id is not known yet
    pub fn anonymous_tool_start(
        tool_name: impl Into<String>,
        partial_arguments: Option<serde_json::Value>,
    ) -> Self {
        StreamEvent::ToolCallStart {
            call_id: None,
            tool_name: tool_name.into(),
            partial_arguments,
        }
    }

    /// Create a tool call result event
    pub fn tool_result(
        call_id: impl Into<String>,
        result_summary: Option<serde_json::Value>,
    ) -> Self {
        StreamEvent::ToolCallResult {
            call_id: Some(call_id.into()),
            tool_name: None,
            result_summary,
        }
    }

    /// Create a tool call result event correlated by tool name only
    pub fn anonymous_tool_result(
        tool_name: impl Into<String>,
        result_summary: Option<serde_json::Value>,
    ) -> Self {
        StreamEvent::ToolCallResult {
            call_id: None,
            tool_name: Some(tool_name.into()),
            result_summary,
        }
    }

    /// Create an annotation event
    pub fn annotation(
        correlation_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        StreamEvent::Annotation {
            correlation_id: correlation_id.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    /// Create an unresolved file reference event
    pub fn file_reference(file_id: impl Into<String>) -> Self {
        StreamEvent::FileReference {
            file_id: file_id.into(),
            file: None,
        }
    }

    /// Decode an event from a raw JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self, EventError> {
        serde_json::from_value(value).map_err(|e| EventError::Decode(e.to_string()))
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::TextDelta { .. } => TEXT_DELTA,
            StreamEvent::ToolCallStart { .. } => TOOL_CALL_STARTED,
            StreamEvent::ToolCallResult { .. } => TOOL_CALL_COMPLETED,
            StreamEvent::Annotation { .. } => ANNOTATION,
            StreamEvent::FileReference { .. } => FILE_REFERENCE,
        }
    }

    /// Call id of a tool event, treating an empty string as unknown
    pub fn call_id(&self) -> Option<&str> {
        match self {
            StreamEvent::ToolCallStart { call_id, .. }
            | StreamEvent::ToolCallResult { call_id, .. } => non_empty(call_id.as_deref()),
            _ => None,
        }
    }

    pub fn is_tool_event(&self) -> bool {
        matches!(
            self,
            StreamEvent::ToolCallStart { .. } | StreamEvent::ToolCallResult { .. }
        )
    }

    /// Check that every field the reconciler relies on is present
    pub fn validate(&self) -> Result<(), EventError> {
        let event_type = self.event_type();
        let missing = |field| Err(EventError::MissingField { event_type, field });

        match self {
            StreamEvent::TextDelta { correlation_id, .. } => {
                if correlation_id.is_empty() {
                    return missing("correlation_id");
                }
            }
            StreamEvent::ToolCallStart { tool_name, .. } => {
                if tool_name.is_empty() {
                    return missing("tool_name");
                }
            }
            StreamEvent::ToolCallResult { tool_name, .. } => {
                if self.call_id().is_none() && non_empty(tool_name.as_deref()).is_none() {
                    return missing("call_id");
                }
            }
            StreamEvent::Annotation {
                correlation_id,
                url,
                ..
            } => {
                if correlation_id.is_empty() {
                    return missing("correlation_id");
                }
                if url.is_empty() {
                    return missing("url");
                }
            }
            StreamEvent::FileReference { file_id, .. } => {
                if file_id.is_empty() {
                    return missing("file_id");
                }
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
