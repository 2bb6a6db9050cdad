// Agent Chat Core
//
// This crate turns the event stream of a hosted agent into a chat transcript.
//
// Key design decisions:
// - The reconciler performs no I/O and never fails; bad events are logged,
//   counted and dropped
// - Agent services and file downloads sit behind traits (AgentInvoker,
//   FileFetcher) so SDK adapters and in-memory fakes are interchangeable
// - SDK callbacks feed a typed event channel instead of calling into the
//   reconciler directly
// - Rendering happens in TranscriptListeners, which only read changes
// - Live sessions are owned by an explicit SessionRegistry

// Data contracts (re-exported from agentchat-schemas)
pub mod events;
pub mod message;

// Transcript reconciliation
pub mod reconciler;
pub mod tools;
pub mod transcript;

// Sessions and collaborators
pub mod channel;
pub mod listeners;
pub mod registry;
pub mod session;
pub mod tool_log;
pub mod traits;

// In-memory implementations for the CLI and testing
pub mod memory;

pub mod config;
pub mod error;
pub mod telemetry;

// Re-exports for convenience
pub use error::{ChatError, Result};
pub use events::{EventError, StreamEvent};
pub use message::{
    FileContent, MessageContent, MessageRole, MessageStatus, ToolCallInfo, TranscriptMessage,
    UserInput,
};

pub use reconciler::{ReconcileStats, TranscriptReconciler};
pub use tools::{ToolKind, ToolTitles};
pub use transcript::{TranscriptChange, TranscriptDiff, TranscriptSnapshot};

pub use channel::{event_channel, EventReceiver, EventSender};
pub use listeners::{
    CompositeTranscriptListener, NoopTranscriptListener, ToolCallLogListener, TranscriptListener,
};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{ChatSession, TurnSummary};
pub use tool_log::{InMemoryToolLog, ToolCallLog, ToolCallRecord, TracingToolLog};
pub use traits::{AgentInvoker, EventStream, FileFetcher, NoopFileFetcher};

pub use memory::{EchoAgent, InMemoryFileStore, RecordingListener, ScriptedAgent};

pub use config::{load_tool_titles, ChatConfig};
pub use telemetry::{init_logging, LoggingConfig};
