// In-memory collaborators
//
// Agents, file stores and listeners that need no external service. Used by
// tests, the offline CLI mode and the replay command.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use agentchat_schemas::{FileContent, StreamEvent, UserInput};

use crate::channel::{event_channel, DEFAULT_CHANNEL_CAPACITY};
use crate::error::{ChatError, Result};
use crate::listeners::TranscriptListener;
use crate::traits::{AgentInvoker, EventStream, FileFetcher};
use crate::transcript::TranscriptChange;

fn new_thread_id() -> String {
    format!("thread_{}", Uuid::now_v7().simple())
}

// ============================================================================
// ScriptedAgent
// ============================================================================

#[derive(Debug, Clone)]
struct ScriptedTurn {
    events: Vec<StreamEvent>,
    failure: Option<String>,
}

/// Replays queued turns of events, one turn per invocation.
///
/// Events are pushed through an event channel from a spawned task, the same
/// way an SDK callback adapter feeds a session. An exhausted script answers
/// with an empty stream.
#[derive(Debug)]
pub struct ScriptedAgent {
    name: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    inputs: Mutex<Vec<(String, UserInput)>>,
    threads: AtomicU64,
    capacity: usize,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            turns: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(Vec::new()),
            threads: AtomicU64::new(0),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Queue the events answering the next invocation
    pub async fn push_turn(&self, events: Vec<StreamEvent>) {
        self.turns.lock().await.push_back(ScriptedTurn {
            events,
            failure: None,
        });
    }

    /// Queue a turn whose stream fails after `events`
    pub async fn push_failing_turn(&self, events: Vec<StreamEvent>, message: impl Into<String>) {
        self.turns.lock().await.push_back(ScriptedTurn {
            events,
            failure: Some(message.into()),
        });
    }

    pub async fn remaining_turns(&self) -> usize {
        self.turns.lock().await.len()
    }

    /// Every (thread id, input) this agent was invoked with
    pub async fn inputs(&self) -> Vec<(String, UserInput)> {
        self.inputs.lock().await.clone()
    }

    /// Number of threads created so far
    pub fn threads_created(&self) -> u64 {
        self.threads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentInvoker for ScriptedAgent {
    async fn invoke(&self, thread_id: &str, input: &UserInput) -> Result<EventStream> {
        self.inputs
            .lock()
            .await
            .push((thread_id.to_string(), input.clone()));

        let turn = self.turns.lock().await.pop_front();
        let Some(turn) = turn else {
            tracing::debug!(agent = %self.name, "Script exhausted, answering with no events");
            return Ok(Box::pin(futures::stream::empty::<Result<StreamEvent>>()));
        };

        let (tx, rx) = event_channel(self.capacity);
        tokio::spawn(async move {
            for event in turn.events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if let Some(message) = turn.failure {
                let _ = tx.fail(ChatError::invocation(message)).await;
            }
        });

        Ok(rx.into_stream())
    }

    async fn create_thread(&self) -> Result<String> {
        self.threads.fetch_add(1, Ordering::SeqCst);
        Ok(new_thread_id())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// EchoAgent
// ============================================================================

/// Streams the user's text back word by word
#[derive(Debug, Clone, Default)]
pub struct EchoAgent;

impl EchoAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentInvoker for EchoAgent {
    async fn invoke(&self, _thread_id: &str, input: &UserInput) -> Result<EventStream> {
        let correlation_id = format!("msg_{}", Uuid::now_v7().simple());
        let events: Vec<Result<StreamEvent>> = input
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                let chunk = if i == 0 {
                    word.to_string()
                } else {
                    format!(" {}", word)
                };
                Ok(StreamEvent::text_delta(correlation_id.clone(), chunk))
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn create_thread(&self) -> Result<String> {
        Ok(new_thread_id())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

// ============================================================================
// InMemoryFileStore
// ============================================================================

/// FileFetcher backed by a map of file id to content
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileStore {
    files: Arc<RwLock<HashMap<String, FileContent>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, file_id: impl Into<String>, file: FileContent) {
        self.files.write().await.insert(file_id.into(), file);
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl FileFetcher for InMemoryFileStore {
    async fn fetch(&self, file_id: &str) -> Result<FileContent> {
        self.files
            .read()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| ChatError::file_fetch(file_id, "file not found"))
    }
}

// ============================================================================
// RecordingListener
// ============================================================================

/// Keeps every change it is notified of
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    changes: Arc<RwLock<Vec<TranscriptChange>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn changes(&self) -> Vec<TranscriptChange> {
        self.changes.read().await.clone()
    }

    pub async fn clear(&self) {
        self.changes.write().await.clear();
    }
}

#[async_trait]
impl TranscriptListener for RecordingListener {
    async fn on_change(&self, change: &TranscriptChange) {
        self.changes.write().await.push(change.clone());
    }

    fn name(&self) -> &'static str {
        "RecordingListener"
    }
}
