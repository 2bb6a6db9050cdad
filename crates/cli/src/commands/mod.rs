pub mod chat;
pub mod replay;

use std::sync::Arc;

use agentchat_core::{
    AgentInvoker, ChatSession, CompositeTranscriptListener, FileFetcher, ToolCallLogListener,
    ToolTitles, TracingToolLog, TranscriptListener,
};

/// Everything needed to open a session; reused when the REPL session expires
pub struct SessionFactory {
    pub agent: Arc<dyn AgentInvoker>,
    pub files: Arc<dyn FileFetcher>,
    pub titles: ToolTitles,
    pub listener: Arc<dyn TranscriptListener>,
}

impl SessionFactory {
    pub async fn build(&self) -> agentchat_core::Result<ChatSession> {
        Ok(ChatSession::open(self.agent.clone())
            .await?
            .with_titles(self.titles.clone())
            .with_file_fetcher(self.files.clone())
            .with_listener(self.listener.clone()))
    }
}

/// Renderer first, then tool calls logged through tracing
pub fn listeners(renderer: Arc<dyn TranscriptListener>) -> Arc<dyn TranscriptListener> {
    Arc::new(CompositeTranscriptListener::new(vec![
        renderer,
        Arc::new(ToolCallLogListener::new(Arc::new(TracingToolLog))),
    ]))
}
