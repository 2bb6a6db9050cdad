// Chat Session
//
// Drives one conversation: a reconciler, the agent invoker bound to the
// conversation thread, a file fetcher and the listeners that render changes.
//
// Turns are strictly sequential. `send` takes `&mut self`, so a session shared
// between tasks has to sit behind a lock (see `registry`).

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use uuid::Uuid;

use agentchat_schemas::{StreamEvent, TranscriptMessage, UserInput};

use crate::error::Result;
use crate::listeners::{NoopTranscriptListener, TranscriptListener};
use crate::reconciler::{ReconcileStats, TranscriptReconciler};
use crate::tools::ToolTitles;
use crate::traits::{AgentInvoker, FileFetcher, NoopFileFetcher};
use crate::transcript::{TranscriptDiff, TranscriptSnapshot};

/// What one `send` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    /// Events received from the invoker
    pub events: usize,
    /// Changes reported to listeners, user messages included
    pub changes: usize,
    /// Messages sealed when the turn ended
    pub sealed: usize,
    /// File references dropped because the fetch failed
    pub failed_fetches: usize,
}

pub struct ChatSession {
    id: Uuid,
    thread_id: String,
    reconciler: TranscriptReconciler,
    titles: ToolTitles,
    invoker: Arc<dyn AgentInvoker>,
    files: Arc<dyn FileFetcher>,
    listener: Arc<dyn TranscriptListener>,
    turns: u64,
    last_turn: TurnSummary,
}

impl ChatSession {
    /// Create a session on an existing thread
    pub fn new(invoker: Arc<dyn AgentInvoker>, thread_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            thread_id: thread_id.into(),
            reconciler: TranscriptReconciler::default(),
            titles: ToolTitles::default(),
            invoker,
            files: Arc::new(NoopFileFetcher),
            listener: Arc::new(NoopTranscriptListener),
            turns: 0,
            last_turn: TurnSummary::default(),
        }
    }

    /// Create a session on a fresh thread
    pub async fn open(invoker: Arc<dyn AgentInvoker>) -> Result<Self> {
        let thread_id = invoker.create_thread().await?;
        tracing::info!(agent = invoker.name(), thread_id = %thread_id, "Opened chat session");
        Ok(Self::new(invoker, thread_id))
    }

    pub fn with_titles(mut self, titles: ToolTitles) -> Self {
        self.reconciler = TranscriptReconciler::new(titles.clone());
        self.titles = titles;
        self
    }

    pub fn with_file_fetcher(mut self, files: Arc<dyn FileFetcher>) -> Self {
        self.files = files;
        self
    }

    /// Use a CompositeTranscriptListener to attach several
    pub fn with_listener(mut self, listener: Arc<dyn TranscriptListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Resume from a saved transcript; restored messages are sealed
    pub fn with_snapshot(mut self, snapshot: TranscriptSnapshot) -> Self {
        self.reconciler = TranscriptReconciler::from_snapshot(snapshot, self.titles.clone());
        self
    }

    // ------------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------------

    /// Run one turn to completion.
    ///
    /// The turn is always ended, also when the invoker fails before or during
    /// streaming; whatever arrived before the failure stays in the transcript
    /// and is counted in `last_turn`.
    pub async fn send(&mut self, input: UserInput) -> Result<TurnSummary> {
        let start = self.reconciler.len();
        self.reconciler.begin_turn(&input);
        self.turns += 1;

        let mut summary = TurnSummary::default();
        let opening = self.reconciler.changes_since(start);
        self.notify(&opening, &mut summary).await;

        let outcome = self.stream_turn(&input, &mut summary).await;

        summary.sealed = self.reconciler.end_turn();
        tracing::debug!(
            session_id = %self.id,
            turn = self.turns,
            events = summary.events,
            changes = summary.changes,
            "Turn finished"
        );

        self.last_turn = summary;
        outcome.map(|_| summary)
    }

    /// Close a turn whose `send` future was dropped mid-stream
    pub fn cancel_turn(&mut self) -> usize {
        if self.reconciler.is_turn_open() {
            tracing::info!(session_id = %self.id, "Cancelling open turn");
        }
        self.reconciler.end_turn()
    }

    async fn stream_turn(&mut self, input: &UserInput, summary: &mut TurnSummary) -> Result<()> {
        let mut stream = match self.invoker.invoke(&self.thread_id, input).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Agent invocation failed");
                return Err(e);
            }
        };

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(
                        session_id = %self.id,
                        events = summary.events,
                        error = %e,
                        "Agent stream failed mid-turn"
                    );
                    return Err(e);
                }
            };
            summary.events += 1;

            let Some(event) = self.resolve_file(event, summary).await else {
                continue;
            };
            let diff = self.reconciler.ingest(event);
            self.notify(&diff, summary).await;
        }

        Ok(())
    }

    /// Fetch the content behind an unresolved file reference
    async fn resolve_file(
        &self,
        event: StreamEvent,
        summary: &mut TurnSummary,
    ) -> Option<StreamEvent> {
        match event {
            StreamEvent::FileReference {
                file_id,
                file: None,
            } => match self.files.fetch(&file_id).await {
                Ok(file) => Some(StreamEvent::FileReference {
                    file_id,
                    file: Some(file),
                }),
                Err(e) => {
                    tracing::warn!(file_id = %file_id, error = %e, "Dropping file reference");
                    summary.failed_fetches += 1;
                    None
                }
            },
            other => Some(other),
        }
    }

    async fn notify(&self, diff: &TranscriptDiff, summary: &mut TurnSummary) {
        for change in diff {
            if self.listener.accepts(change) {
                self.listener.on_change(change).await;
            }
        }
        summary.changes += diff.len();
    }

    /// Start a new conversation on a fresh thread
    pub async fn reset(&mut self) -> Result<()> {
        self.cancel_turn();
        let thread_id = self.invoker.create_thread().await?;
        tracing::info!(
            session_id = %self.id,
            old_thread_id = %self.thread_id,
            thread_id = %thread_id,
            "Conversation reset"
        );
        self.thread_id = thread_id;
        self.reconciler = TranscriptReconciler::new(self.titles.clone());
        self.turns = 0;
        self.last_turn = TurnSummary::default();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn agent_name(&self) -> &str {
        self.invoker.name()
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        self.reconciler.messages()
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.reconciler.snapshot()
    }

    pub fn stats(&self) -> ReconcileStats {
        self.reconciler.stats()
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Summary of the most recent `send`, whether it succeeded or not
    pub fn last_turn(&self) -> TurnSummary {
        self.last_turn
    }

    pub fn is_turn_open(&self) -> bool {
        self.reconciler.is_turn_open()
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("thread_id", &self.thread_id)
            .field("agent", &self.invoker.name())
            .field("messages", &self.reconciler.len())
            .field("turns", &self.turns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::memory::{EchoAgent, InMemoryFileStore, RecordingListener, ScriptedAgent};
    use agentchat_schemas::{FileContent, MessageRole, MessageStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_records_user_and_agent_messages() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_turn(vec![
                StreamEvent::text_delta("c1", "Hel"),
                StreamEvent::text_delta("c1", "lo"),
            ])
            .await;

        let mut session = ChatSession::open(agent).await.unwrap();
        let summary = session.send(UserInput::new("hi")).await.unwrap();

        assert_eq!(summary.events, 2);
        assert_eq!(summary.sealed, 2);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].text(), Some("Hello"));
        assert!(messages.iter().all(|m| m.sealed));
        assert!(!session.is_turn_open());
    }

    #[tokio::test]
    async fn test_listener_sees_appends_then_mutations() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_turn(vec![
                StreamEvent::text_delta("c1", "a"),
                StreamEvent::text_delta("c1", "b"),
            ])
            .await;
        let recorder = Arc::new(RecordingListener::new());

        let mut session = ChatSession::open(agent)
            .await
            .unwrap()
            .with_listener(recorder.clone());
        let summary = session.send(UserInput::new("go")).await.unwrap();

        let changes = recorder.changes().await;
        assert_eq!(summary.changes, 3);
        assert_eq!(changes.len(), 3);
        assert!(changes[0].is_appended());
        assert!(changes[1].is_appended());
        assert!(!changes[2].is_appended());
        assert_eq!(changes[2].message().text(), Some("ab"));
    }

    #[tokio::test]
    async fn test_stream_failure_still_ends_turn() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_failing_turn(vec![StreamEvent::text_delta("c1", "partial")], "run failed")
            .await;

        let mut session = ChatSession::open(agent).await.unwrap();
        let err = session.send(UserInput::new("hi")).await.unwrap_err();

        assert!(matches!(err, ChatError::Invocation(_)));
        assert!(!session.is_turn_open());
        assert_eq!(session.messages()[1].text(), Some("partial"));
        assert!(session.messages().iter().all(|m| m.sealed));

        let partial = session.last_turn();
        assert_eq!(partial.events, 1);
        assert_eq!(partial.changes, 2);
        assert_eq!(partial.sealed, 2);
    }

    #[tokio::test]
    async fn test_file_reference_is_fetched() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_turn(vec![
                StreamEvent::file_reference("file-1"),
                StreamEvent::file_reference("file-missing"),
            ])
            .await;
        let store = Arc::new(InMemoryFileStore::new());
        store
            .insert("file-1", FileContent::new(vec![1, 2, 3]).with_name("chart.png"))
            .await;

        let mut session = ChatSession::open(agent)
            .await
            .unwrap()
            .with_file_fetcher(store);
        let summary = session.send(UserInput::new("plot it")).await.unwrap();

        assert_eq!(summary.failed_fetches, 1);
        assert_eq!(session.messages().len(), 2);
        assert!(session.messages()[1].content.is_file());
    }

    #[tokio::test]
    async fn test_reset_starts_new_conversation() {
        let agent = Arc::new(EchoAgent::new());
        let mut session = ChatSession::open(agent).await.unwrap();
        session.send(UserInput::new("one two")).await.unwrap();
        let old_thread = session.thread_id().to_string();

        session.reset().await.unwrap();

        assert_ne!(session.thread_id(), old_thread);
        assert!(session.messages().is_empty());
        assert_eq!(session.turns(), 0);
    }

    #[tokio::test]
    async fn test_tool_bubble_completes_within_turn() {
        let agent = Arc::new(ScriptedAgent::new());
        agent
            .push_turn(vec![
                StreamEvent::tool_start("call1", "fetch_weather", None),
                StreamEvent::tool_result("call1", Some(json!("22C"))),
            ])
            .await;

        let mut session = ChatSession::open(agent).await.unwrap();
        session.send(UserInput::new("weather?")).await.unwrap();

        let bubble = &session.messages()[1];
        assert_eq!(bubble.status, MessageStatus::Done);
        assert_eq!(bubble.tool_name(), Some("fetch_weather"));
    }
}
