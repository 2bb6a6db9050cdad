// Transcript Listeners
//
// This module provides the TranscriptListener trait for rendering and
// observing transcript changes. The chat session notifies listeners after
// every reconciler call, in change order, enabling:
// - Console or web rendering (append vs redraw)
// - Tool call logging
// - Metrics on streamed output

use async_trait::async_trait;
use std::sync::Arc;

use agentchat_schemas::MessageStatus;

use crate::tool_log::{ToolCallLog, ToolCallRecord};
use crate::transcript::TranscriptChange;

// ============================================================================
// TranscriptListener Trait
// ============================================================================

/// Trait for observing transcript changes.
///
/// Listeners only read: they receive a copy of the changed message and can
/// never mutate the transcript. Keep them fast; the session awaits each one
/// before ingesting the next event.
#[async_trait]
pub trait TranscriptListener: Send + Sync {
    /// Called for every change the listener accepts
    async fn on_change(&self, change: &TranscriptChange);

    /// Optional: filter which changes this listener cares about.
    ///
    /// Return `true` to receive the change (default).
    fn accepts(&self, _change: &TranscriptChange) -> bool {
        true
    }

    /// Human-readable name for logging/debugging.
    fn name(&self) -> &'static str {
        "TranscriptListener"
    }
}

// ============================================================================
// NoopTranscriptListener
// ============================================================================

/// No-op listener for when nothing renders the transcript.
#[derive(Debug, Clone, Default)]
pub struct NoopTranscriptListener;

#[async_trait]
impl TranscriptListener for NoopTranscriptListener {
    async fn on_change(&self, _change: &TranscriptChange) {}

    fn name(&self) -> &'static str {
        "NoopTranscriptListener"
    }
}

// ============================================================================
// CompositeTranscriptListener
// ============================================================================

/// Forwards changes to several listeners, honouring each one's filter.
#[derive(Default)]
pub struct CompositeTranscriptListener {
    listeners: Vec<Arc<dyn TranscriptListener>>,
}

impl CompositeTranscriptListener {
    pub fn new(listeners: Vec<Arc<dyn TranscriptListener>>) -> Self {
        Self { listeners }
    }

    pub fn add(&mut self, listener: Arc<dyn TranscriptListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[async_trait]
impl TranscriptListener for CompositeTranscriptListener {
    async fn on_change(&self, change: &TranscriptChange) {
        for listener in &self.listeners {
            if !listener.accepts(change) {
                continue;
            }
            listener.on_change(change).await;
        }
    }

    fn name(&self) -> &'static str {
        "CompositeTranscriptListener"
    }
}

// ============================================================================
// ToolCallLogListener
// ============================================================================

/// Reports tool bubbles to a ToolCallLog when they reach `done`.
pub struct ToolCallLogListener {
    log: Arc<dyn ToolCallLog>,
}

impl ToolCallLogListener {
    pub fn new(log: Arc<dyn ToolCallLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl TranscriptListener for ToolCallLogListener {
    async fn on_change(&self, change: &TranscriptChange) {
        if let Some(record) = ToolCallRecord::from_message(change.message()) {
            self.log.log(record).await;
        }
    }

    fn accepts(&self, change: &TranscriptChange) -> bool {
        let message = change.message();
        message.is_tool_call() && message.status == MessageStatus::Done
    }

    fn name(&self) -> &'static str {
        "ToolCallLogListener"
    }
}

// ============================================================================
// Tests
// ============================================================================
