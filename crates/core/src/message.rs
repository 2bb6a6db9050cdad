// Transcript message types
//
// Defined in agentchat-schemas; re-exported so runtime users need one import path.

pub use agentchat_schemas::file::{has_image_extension, FileContent};
pub use agentchat_schemas::message::{
    MessageContent, MessageRole, MessageStatus, ToolCallInfo, TranscriptMessage, UserInput,
};
