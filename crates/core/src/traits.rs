// Collaborator traits
//
// The reconciler performs no I/O. Everything that talks to a hosted agent
// service sits behind these traits:
// - AgentInvoker: sends a user turn and streams back typed events
// - FileFetcher: downloads binary artifacts referenced by the stream
//
// Vendor SDK adapters implement them; in-memory versions live in `memory`.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use agentchat_schemas::{FileContent, UserInput};

use crate::error::Result;
use crate::events::StreamEvent;

/// Type alias for an agent response stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

// ============================================================================
// AgentInvoker - For running one turn against the agent service
// ============================================================================

/// Trait for invoking a hosted agent
///
/// Implementations can:
/// - Wrap a vendor agent SDK (adapting its callbacks into an event channel)
/// - Replay recorded streams for tests and demos
/// - Echo the input back for offline use
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Send the user's input on `thread_id` and stream the response events
    async fn invoke(&self, thread_id: &str, input: &UserInput) -> Result<EventStream>;

    /// Create a fresh conversation thread and return its id
    async fn create_thread(&self) -> Result<String>;

    /// Human-readable agent name for logging and display
    fn name(&self) -> &str {
        "agent"
    }
}

// ============================================================================
// FileFetcher - For resolving file references
// ============================================================================

/// Trait for downloading files produced by the agent
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch the content of `file_id`
    async fn fetch(&self, file_id: &str) -> Result<FileContent>;
}

/// File fetcher for hosts that never render files
#[derive(Debug, Clone, Default)]
pub struct NoopFileFetcher;

#[async_trait]
impl FileFetcher for NoopFileFetcher {
    async fn fetch(&self, file_id: &str) -> Result<FileContent> {
        Err(crate::error::ChatError::file_fetch(
            file_id,
            "file retrieval is not configured",
        ))
    }
}
