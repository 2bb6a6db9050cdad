// Error types for chat sessions
//
// The reconciler itself never fails; these errors belong to the collaborators
// around it (agent invocation, file retrieval, configuration, registry lookups).

use thiserror::Error;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur while running a chat session
#[derive(Debug, Error)]
pub enum ChatError {
    /// Agent invocation failed (before or during streaming)
    #[error("Agent invocation error: {0}")]
    Invocation(String),

    /// File retrieval failed
    #[error("File fetch error for {file_id}: {message}")]
    FileFetch { file_id: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No session registered under the key
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Create an invocation error
    pub fn invocation(msg: impl Into<String>) -> Self {
        ChatError::Invocation(msg.into())
    }

    /// Create a file fetch error
    pub fn file_fetch(file_id: impl Into<String>, msg: impl Into<String>) -> Self {
        ChatError::FileFetch {
            file_id: file_id.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ChatError::Configuration(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(key: impl Into<String>) -> Self {
        ChatError::SessionNotFound(key.into())
    }
}
