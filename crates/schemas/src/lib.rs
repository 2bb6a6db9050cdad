// Agentchat Schemas
//
// Decision: This crate is the source of truth for all shared data structures
// Decision: Minimal dependencies - only serde, uuid, chrono, thiserror, base64
// Decision: No runtime logic - only type definitions, validation and serialization

// Core type modules
pub mod events;
pub mod file;
pub mod message;

// Re-exports for convenience
// Event types
pub use events::{
    EventError, StreamEvent, ANNOTATION, FILE_REFERENCE, TEXT_DELTA, TOOL_CALL_COMPLETED,
    TOOL_CALL_STARTED,
};

// File types
pub use file::FileContent;

// Message types
pub use message::{
    MessageContent, MessageRole, MessageStatus, ToolCallInfo, TranscriptMessage, UserInput,
};
