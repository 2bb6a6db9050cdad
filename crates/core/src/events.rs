// Stream events
//
// The event contract lives in agentchat-schemas so SDK adapters can depend on
// it without pulling in the runtime. Re-exported here for convenience.

pub use agentchat_schemas::events::{
    EventError, StreamEvent, ANNOTATION, FILE_REFERENCE, TEXT_DELTA, TOOL_CALL_COMPLETED,
    TOOL_CALL_STARTED,
};
