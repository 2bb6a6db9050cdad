// Transcript Reconciler
//
// Folds an ordered stream of agent events into an ordered, mutable list of
// display messages. Lookups are keyed by correlation id (text) and call id
// (tool bubbles), never by arrival position.
//
// Invariants:
// - At most one open text message per correlation id.
// - At most one pending bubble per call id; a result completes it exactly once.
// - Sealed messages are never mutated again.
// - Nothing here fails: bad or unmatched events are logged, counted and dropped.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use agentchat_schemas::{
    FileContent, MessageContent, MessageStatus, StreamEvent, ToolCallInfo, TranscriptMessage,
    UserInput,
};

use crate::tools::{render_arguments, ToolKind, ToolTitles};
use crate::transcript::{TranscriptDiff, TranscriptSnapshot};

const CITATION_OPEN: char = '【';
const CITATION_CLOSE: char = '】';

/// Counters for events the reconciler handled leniently
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Every event passed to `ingest`
    pub events: u64,
    /// Dropped because a required field was missing or undecodable
    pub malformed: u64,
    /// Dropped because no message matched the correlation or call id, or
    /// because no turn was open
    pub unmatched: u64,
    /// Results for calls that were already done
    pub duplicate_completions: u64,
    /// Mutations refused because the target message was sealed. Stays zero
    /// unless the turn bookkeeping is broken.
    pub sealed_rejections: u64,
}

/// Bookkeeping for the turn currently streaming
#[derive(Debug)]
struct TurnState {
    /// Index of the first message belonging to this turn
    start: usize,
    /// correlation id -> index of the text message still receiving deltas
    open_text: HashMap<String, usize>,
    /// call id -> index of the pending tool bubble
    pending: HashMap<String, usize>,
    /// Pending tool bubbles whose call id is not known yet, oldest first
    anonymous: Vec<usize>,
}

impl TurnState {
    fn new(start: usize) -> Self {
        Self {
            start,
            open_text: HashMap::new(),
            pending: HashMap::new(),
            anonymous: Vec::new(),
        }
    }

    /// Most recent anonymous pending bubble of `tool_name`
    fn find_anonymous(&self, messages: &[TranscriptMessage], tool_name: &str) -> Option<usize> {
        self.anonymous
            .iter()
            .rev()
            .copied()
            .find(|&index| messages.get(index).and_then(|m| m.tool_name()) == Some(tool_name))
    }

    fn take_anonymous(&mut self, messages: &[TranscriptMessage], tool_name: &str) -> Option<usize> {
        let index = self.find_anonymous(messages, tool_name)?;
        self.anonymous.retain(|i| *i != index);
        Some(index)
    }

    /// Anonymous bubble first, else the single id-keyed pending bubble of that tool
    fn take_by_tool_name(&mut self, messages: &[TranscriptMessage], tool_name: &str) -> Option<usize> {
        if let Some(index) = self.take_anonymous(messages, tool_name) {
            return Some(index);
        }

        let mut candidates = self.pending.iter().filter(|(_, &index)| {
            messages.get(index).and_then(|m| m.tool_name()) == Some(tool_name)
        });
        let (id, index) = candidates.next()?;
        if candidates.next().is_some() {
            tracing::debug!(tool_name, "Several pending calls of the same tool; not guessing");
            return None;
        }
        let (id, index) = (id.clone(), *index);
        self.pending.remove(&id);
        Some(index)
    }
}

/// Per-session transcript owner. One instance per conversation; replace it
/// when the conversation is reset.
#[derive(Debug)]
pub struct TranscriptReconciler {
    messages: Vec<TranscriptMessage>,
    titles: ToolTitles,
    turn: Option<TurnState>,
    /// Call ids completed during this conversation
    completed: HashSet<String>,
    stats: ReconcileStats,
}

impl Default for TranscriptReconciler {
    fn default() -> Self {
        Self::new(ToolTitles::default())
    }
}

impl TranscriptReconciler {
    pub fn new(titles: ToolTitles) -> Self {
        Self {
            messages: Vec::new(),
            titles,
            turn: None,
            completed: HashSet::new(),
            stats: ReconcileStats::default(),
        }
    }

    /// Resume from an earlier transcript. Restored messages are sealed.
    pub fn from_snapshot(snapshot: TranscriptSnapshot, titles: ToolTitles) -> Self {
        let mut reconciler = Self::new(titles);
        reconciler.messages = snapshot
            .messages
            .into_iter()
            .map(|mut message| {
                message.sealed = true;
                message
            })
            .collect();
        reconciler
    }

    // ------------------------------------------------------------------------
    // Turn lifecycle
    // ------------------------------------------------------------------------

    /// Append the user's messages for a new turn.
    ///
    /// Each attachment becomes its own user message, followed by the text
    /// message, which is returned. A turn still open is ended first.
    pub fn begin_turn(&mut self, input: &UserInput) -> TranscriptMessage {
        if self.turn.is_some() {
            tracing::warn!("Starting a new turn while the previous one is still open");
            self.end_turn();
        }

        let start = self.messages.len();
        for path in &input.attachments {
            self.messages
                .push(TranscriptMessage::user_attachment(path.as_str()));
        }

        let message = TranscriptMessage::user(input.text.as_str());
        self.messages.push(message.clone());
        self.turn = Some(TurnState::new(start));

        tracing::debug!(
            start,
            attachments = input.attachments.len(),
            "Turn started"
        );
        message
    }

    /// Seal every message of the current turn. Returns how many were sealed.
    pub fn end_turn(&mut self) -> usize {
        let Some(turn) = self.turn.take() else {
            return 0;
        };

        let unresolved = turn.pending.len() + turn.anonymous.len();
        if unresolved > 0 {
            tracing::warn!(
                unresolved,
                call_ids = ?turn.pending.keys().collect::<Vec<_>>(),
                "Turn ended with tool calls still pending"
            );
        }

        let mut sealed = 0;
        for message in self.messages.iter_mut().skip(turn.start) {
            if !message.sealed {
                message.sealed = true;
                sealed += 1;
            }
        }

        tracing::debug!(sealed, "Turn ended");
        sealed
    }

    pub fn is_turn_open(&self) -> bool {
        self.turn.is_some()
    }

    // ------------------------------------------------------------------------
    // Event ingestion
    // ------------------------------------------------------------------------

    /// Fold one event into the transcript. Never fails; the returned diff is
    /// empty when nothing visible changed.
    ///
    /// Events only apply inside a turn. Anything arriving before `begin_turn`
    /// or after `end_turn` is counted as unmatched and dropped, so a late event
    /// can neither reopen the turn nor leave an unsealed message behind.
    pub fn ingest(&mut self, event: StreamEvent) -> TranscriptDiff {
        self.stats.events += 1;

        if let Err(err) = event.validate() {
            tracing::warn!(error = %err, "Dropping malformed event");
            self.stats.malformed += 1;
            return TranscriptDiff::new();
        }

        let Some(mut turn) = self.turn.take() else {
            tracing::warn!(
                event_type = event.event_type(),
                call_id = ?event.call_id(),
                "Dropping event that arrived outside of a turn"
            );
            self.stats.unmatched += 1;
            return TranscriptDiff::new();
        };

        let diff = match event {
            StreamEvent::TextDelta {
                correlation_id,
                text,
            } => self.on_text_delta(&mut turn, correlation_id, &text),
            StreamEvent::ToolCallStart {
                call_id,
                tool_name,
                partial_arguments,
            } => self.on_tool_start(
                &mut turn,
                call_id.filter(|id| !id.is_empty()),
                tool_name,
                partial_arguments,
            ),
            StreamEvent::ToolCallResult {
                call_id,
                tool_name,
                result_summary,
            } => self.on_tool_result(
                &mut turn,
                call_id.filter(|id| !id.is_empty()),
                tool_name.filter(|name| !name.is_empty()),
                result_summary,
            ),
            StreamEvent::Annotation {
                correlation_id,
                title,
                url,
            } => self.on_annotation(&turn, &correlation_id, &title, &url),
            StreamEvent::FileReference { file_id, file } => {
                self.on_file_reference(&mut turn, file_id, file)
            }
        };

        self.turn = Some(turn);
        diff
    }

    /// Decode a raw JSON event and ingest it; undecodable payloads are dropped
    pub fn ingest_json(&mut self, value: Value) -> TranscriptDiff {
        match StreamEvent::from_json(value) {
            Ok(event) => self.ingest(event),
            Err(err) => {
                self.stats.events += 1;
                self.stats.malformed += 1;
                tracing::warn!(error = %err, "Dropping undecodable event");
                TranscriptDiff::new()
            }
        }
    }

    fn on_text_delta(
        &mut self,
        turn: &mut TurnState,
        correlation_id: String,
        text: &str,
    ) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();

        match turn.open_text.get(&correlation_id).copied() {
            Some(index) => {
                self.mutate(index, &mut diff, |message| match &mut message.content {
                    MessageContent::Text(content) if !text.is_empty() => {
                        content.push_str(text);
                        true
                    }
                    _ => false,
                });
            }
            None if text.is_empty() => {}
            None => {
                let index = self.append(
                    TranscriptMessage::assistant_text(correlation_id.as_str(), text),
                    &mut diff,
                );
                turn.open_text.insert(correlation_id, index);
            }
        }
        diff
    }

    fn on_tool_start(
        &mut self,
        turn: &mut TurnState,
        call_id: Option<String>,
        tool_name: String,
        arguments: Option<Value>,
    ) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();
        let kind = ToolKind::from_tool_name(&tool_name);

        if let Some(id) = &call_id {
            if let Some(index) = turn.pending.get(id).copied() {
                // Repeated start for the same call: partial arguments
                self.mutate(index, &mut diff, |message| {
                    update_tool_body(message, kind, arguments.as_ref())
                });
                return diff;
            }
            if self.completed.contains(id) {
                tracing::warn!(call_id = %id, "Call id reused after completion; starting a new bubble");
            }
        }

        if let Some(index) = turn.find_anonymous(&self.messages, &tool_name) {
            // Best-effort merge into the bubble of the same tool still waiting for an id
            if let Some(id) = call_id {
                turn.anonymous.retain(|i| *i != index);
                turn.pending.insert(id.clone(), index);
                self.mutate(index, &mut diff, |message| {
                    message.correlation_key = Some(id.clone());
                    if let Some(tool) = message.tool.as_mut() {
                        tool.call_id = Some(id);
                    }
                    update_tool_body(message, kind, arguments.as_ref());
                    true
                });
            } else {
                self.mutate(index, &mut diff, |message| {
                    update_tool_body(message, kind, arguments.as_ref())
                });
            }
            return diff;
        }

        let title = self.titles.title_for(&tool_name);
        let body = kind.start_body(arguments.as_ref());
        let tool = ToolCallInfo::new(tool_name.as_str(), title).with_call_id(call_id.clone());

        // Text streamed after the bubble renders below it
        turn.open_text.clear();
        let index = self.append(TranscriptMessage::tool_call(tool, body), &mut diff);

        match call_id {
            Some(id) => {
                turn.pending.insert(id, index);
            }
            None => turn.anonymous.push(index),
        }
        tracing::debug!(tool_name = %tool_name, index, "Tool call started");
        diff
    }

    fn on_tool_result(
        &mut self,
        turn: &mut TurnState,
        call_id: Option<String>,
        tool_name: Option<String>,
        result: Option<Value>,
    ) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();

        let target = match &call_id {
            Some(id) => match turn.pending.remove(id) {
                Some(index) => Some(index),
                None if self.completed.contains(id) => {
                    tracing::debug!(call_id = %id, "Ignoring duplicate tool result");
                    self.stats.duplicate_completions += 1;
                    return diff;
                }
                None => tool_name
                    .as_deref()
                    .and_then(|name| turn.take_anonymous(&self.messages, name)),
            },
            None => tool_name
                .as_deref()
                .and_then(|name| turn.take_by_tool_name(&self.messages, name)),
        };

        let Some(index) = target else {
            tracing::warn!(
                call_id = ?call_id,
                tool_name = ?tool_name,
                "Dropping tool result with no matching pending call"
            );
            self.stats.unmatched += 1;
            return diff;
        };

        let completed_id = call_id.or_else(|| {
            self.messages
                .get(index)
                .and_then(|m| m.call_id().map(str::to_string))
        });
        if let Some(id) = &completed_id {
            self.completed.insert(id.clone());
        }

        self.mutate(index, &mut diff, |message| {
            message.status = MessageStatus::Done;
            if let Some(tool) = message.tool.as_mut() {
                if tool.call_id.is_none() {
                    tool.call_id = completed_id.clone();
                }
                if result.is_some() {
                    tool.result = result;
                }
            }
            if message.correlation_key.is_none() {
                message.correlation_key = completed_id;
            }
            message.sealed = true;
            true
        });
        tracing::debug!(index, "Tool call completed");
        diff
    }

    fn on_annotation(
        &mut self,
        turn: &TurnState,
        correlation_id: &str,
        title: &str,
        url: &str,
    ) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();

        let target = self
            .messages
            .iter()
            .enumerate()
            .skip(turn.start)
            .rev()
            .find(|(_, m)| {
                m.is_assistant_text() && m.correlation_key.as_deref() == Some(correlation_id)
            })
            .map(|(index, _)| index);

        let Some(index) = target else {
            tracing::warn!(correlation_id, "Dropping annotation with no assistant message");
            self.stats.unmatched += 1;
            return diff;
        };

        self.mutate(index, &mut diff, |message| match &mut message.content {
            MessageContent::Text(content) => rewrite_citation(content, title, url),
            MessageContent::File(_) => false,
        });
        diff
    }

    fn on_file_reference(
        &mut self,
        turn: &mut TurnState,
        file_id: String,
        file: Option<FileContent>,
    ) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();
        let Some(file) = file else {
            tracing::warn!(file_id = %file_id, "Dropping file reference that was never fetched");
            self.stats.malformed += 1;
            return diff;
        };

        turn.open_text.clear();
        let index = self.append(TranscriptMessage::file(file_id.as_str(), file), &mut diff);
        tracing::debug!(file_id = %file_id, index, "File attached");
        diff
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn append(&mut self, message: TranscriptMessage, diff: &mut TranscriptDiff) -> usize {
        let index = self.messages.len();
        diff.appended(index, &message);
        self.messages.push(message);
        index
    }

    /// Apply `change` unless the message is sealed; record it when it reports a change.
    ///
    /// The turn indexes only ever point at unsealed messages, so the sealed
    /// branch is a guard that should never count anything.
    fn mutate<F>(&mut self, index: usize, diff: &mut TranscriptDiff, change: F)
    where
        F: FnOnce(&mut TranscriptMessage) -> bool,
    {
        let Some(message) = self.messages.get_mut(index) else {
            return;
        };
        if message.sealed {
            tracing::warn!(index, "Refusing to mutate a sealed message");
            self.stats.sealed_rejections += 1;
            return;
        }
        if change(message) {
            diff.mutated(index, message);
        }
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot::new(self.messages.clone())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    pub fn titles(&self) -> &ToolTitles {
        &self.titles
    }

    /// The text message still receiving deltas for `correlation_id`
    pub fn open_message(&self, correlation_id: &str) -> Option<&TranscriptMessage> {
        let index = *self.turn.as_ref()?.open_text.get(correlation_id)?;
        self.messages.get(index)
    }

    /// Number of tool bubbles still waiting for a result in this turn
    pub fn pending_count(&self) -> usize {
        self.turn
            .as_ref()
            .map(|t| t.pending.len() + t.anonymous.len())
            .unwrap_or(0)
    }

    /// Report every message from `index` onwards as appended
    pub fn changes_since(&self, index: usize) -> TranscriptDiff {
        let mut diff = TranscriptDiff::new();
        for (i, message) in self.messages.iter().enumerate().skip(index) {
            diff.appended(i, message);
        }
        diff
    }
}

/// Update a tool bubble body from a repeated start event
fn update_tool_body(message: &mut TranscriptMessage, kind: ToolKind, arguments: Option<&Value>) -> bool {
    let Some(arguments) = arguments else {
        return false;
    };
    let MessageContent::Text(content) = &mut message.content else {
        return false;
    };

    match kind {
        ToolKind::Function => match arguments {
            Value::String(chunk) if !chunk.is_empty() => {
                content.push_str(chunk);
                true
            }
            Value::Null | Value::String(_) => false,
            other => {
                *content = render_arguments(other);
                true
            }
        },
        ToolKind::WebSearch => {
            let query = kind.start_body(Some(arguments));
            if query.is_empty() || *content == query {
                return false;
            }
            *content = query;
            true
        }
        ToolKind::FileSearch => false,
    }
}

/// Replace a trailing unresolved `【...】` marker with a markdown link
fn rewrite_citation(content: &mut String, title: &str, url: &str) -> bool {
    if !content.ends_with(CITATION_CLOSE) {
        return false;
    }
    let Some(start) = content.rfind(CITATION_OPEN) else {
        return false;
    };
    let inner = &content[start + CITATION_OPEN.len_utf8()..];
    if inner.starts_with('[') {
        // already rewritten
        return false;
    }

    content.truncate(start);
    content.push_str(&format!("{CITATION_OPEN}[{title}]({url}){CITATION_CLOSE}"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reconciler_with_turn() -> TranscriptReconciler {
        let mut reconciler = TranscriptReconciler::default();
        reconciler.begin_turn(&UserInput::new("What's the weather?"));
        reconciler
    }

    #[test]
    fn test_begin_turn_appends_user_message() {
        let mut reconciler = TranscriptReconciler::default();
        let message = reconciler.begin_turn(&UserInput::new("hi").with_attachment("/tmp/a.png"));

        assert_eq!(message.text(), Some("hi"));
        assert_eq!(reconciler.len(), 2);
        assert!(reconciler.messages()[0].content.is_file());
        assert_eq!(reconciler.messages()[1].id, message.id);
        assert!(reconciler.is_turn_open());
    }

    #[test]
    fn test_text_deltas_concatenate() {
        let mut reconciler = reconciler_with_turn();
        let first = reconciler.ingest(StreamEvent::text_delta("c1", "Hel"));
        let second = reconciler.ingest(StreamEvent::text_delta("c1", "lo"));

        assert!(first.changes()[0].is_appended());
        assert!(!second.changes()[0].is_appended());
        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[1].text(), Some("Hello"));
        assert_eq!(reconciler.open_message("c1").and_then(|m| m.text()), Some("Hello"));
    }

    #[test]
    fn test_empty_first_delta_creates_nothing() {
        let mut reconciler = reconciler_with_turn();
        let diff = reconciler.ingest(StreamEvent::text_delta("c1", ""));
        assert!(diff.is_empty());
        assert_eq!(reconciler.len(), 1);
    }

    #[test]
    fn test_interleaved_correlation_ids_keep_separate_messages() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "one "));
        reconciler.ingest(StreamEvent::text_delta("c2", "two "));
        reconciler.ingest(StreamEvent::text_delta("c1", "uno"));

        assert_eq!(reconciler.messages()[1].text(), Some("one uno"));
        assert_eq!(reconciler.messages()[2].text(), Some("two "));
    }

    #[test]
    fn test_text_after_tool_bubble_starts_new_message() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "Let me check. "));
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));
        reconciler.ingest(StreamEvent::text_delta("c1", "It is sunny."));

        assert_eq!(reconciler.len(), 4);
        assert_eq!(reconciler.messages()[1].text(), Some("Let me check. "));
        assert!(reconciler.messages()[2].is_tool_call());
        assert_eq!(reconciler.messages()[3].text(), Some("It is sunny."));
    }

    #[test]
    fn test_tool_call_lifecycle() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start(
            "call1",
            "fetch_weather",
            Some(json!({"query": "47.67,-122.12"})),
        ));
        assert_eq!(reconciler.pending_count(), 1);

        let diff = reconciler.ingest(StreamEvent::tool_result("call1", Some(json!("22C"))));
        assert_eq!(diff.len(), 1);

        let bubble = &reconciler.messages()[1];
        assert_eq!(bubble.status, MessageStatus::Done);
        assert_eq!(bubble.tool.as_ref().unwrap().title, "☁️ fetching weather");
        assert_eq!(bubble.tool.as_ref().unwrap().result, Some(json!("22C")));
        assert!(bubble.sealed);
        assert_eq!(reconciler.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_result_is_idempotent() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));
        reconciler.ingest(StreamEvent::tool_result("call1", Some(json!("22C"))));
        let before = reconciler.snapshot();

        let diff = reconciler.ingest(StreamEvent::tool_result("call1", Some(json!("99C"))));
        assert!(diff.is_empty());
        assert_eq!(reconciler.snapshot(), before);
        assert_eq!(reconciler.stats().duplicate_completions, 1);
    }

    #[test]
    fn test_repeated_start_accumulates_partial_arguments() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start("call1", "send_email", Some(json!("{\"to\":"))));
        reconciler.ingest(StreamEvent::tool_start("call1", "send_email", Some(json!("\"bob\"}"))));

        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[1].text(), Some("{\"to\":\"bob\"}"));
    }

    #[test]
    fn test_reused_call_id_gets_new_bubble() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));
        reconciler.ingest(StreamEvent::tool_result("call1", None));
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));

        assert_eq!(reconciler.len(), 3);
        assert_eq!(reconciler.messages()[1].status, MessageStatus::Done);
        assert_eq!(reconciler.messages()[2].status, MessageStatus::Pending);

        reconciler.ingest(StreamEvent::tool_result("call1", None));
        assert_eq!(reconciler.messages()[2].status, MessageStatus::Done);
    }

    #[test]
    fn test_unmatched_result_is_dropped() {
        let mut reconciler = reconciler_with_turn();
        let before = reconciler.snapshot();
        let diff = reconciler.ingest(StreamEvent::tool_result("missing", Some(json!("x"))));

        assert!(diff.is_empty());
        assert_eq!(reconciler.snapshot(), before);
        assert_eq!(reconciler.stats().unmatched, 1);
    }

    #[test]
    fn test_anonymous_web_search_merges() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::anonymous_tool_start(
            "bing_grounding",
            Some(json!({"requesturl": "https://api.bing.microsoft.com/v7.0/search?q=weather"})),
        ));
        reconciler.ingest(StreamEvent::anonymous_tool_start(
            "bing_grounding",
            Some(json!({"requesturl": "https://api.bing.microsoft.com/v7.0/search?q=weather+redmond"})),
        ));
        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[1].text(), Some("weather redmond"));

        reconciler.ingest(StreamEvent::anonymous_tool_result(
            "bing_grounding",
            Some(json!({"response_metadata": {"count": 3}})),
        ));
        let bubble = &reconciler.messages()[1];
        assert_eq!(bubble.status, MessageStatus::Done);
        assert_eq!(bubble.tool.as_ref().unwrap().title, "🔍 searching bing");
    }

    #[test]
    fn test_known_id_binds_to_anonymous_bubble() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::anonymous_tool_start("file_search", None));
        reconciler.ingest(StreamEvent::tool_start("fs_1", "file_search", None));

        assert_eq!(reconciler.len(), 2);
        assert_eq!(reconciler.messages()[1].call_id(), Some("fs_1"));
        assert_eq!(reconciler.messages()[1].text(), Some("searching docs..."));

        reconciler.ingest(StreamEvent::tool_result("fs_1", None));
        assert_eq!(reconciler.messages()[1].status, MessageStatus::Done);
    }

    #[test]
    fn test_result_by_tool_name_does_not_guess_between_calls() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start("a", "fetch_weather", None));
        reconciler.ingest(StreamEvent::tool_start("b", "fetch_weather", None));
        let diff = reconciler.ingest(StreamEvent::anonymous_tool_result("fetch_weather", None));

        assert!(diff.is_empty());
        assert_eq!(reconciler.pending_count(), 2);
    }

    #[test]
    fn test_annotation_rewrites_open_marker() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "It is sunny【4:0†source】"));
        reconciler.ingest(StreamEvent::annotation("c1", "Source", "http://x"));

        assert_eq!(
            reconciler.messages()[1].text(),
            Some("It is sunny【[Source](http://x)】")
        );

        // Already rewritten; a second annotation leaves it alone
        let diff = reconciler.ingest(StreamEvent::annotation("c1", "Other", "http://y"));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_annotation_without_marker_is_noop() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "No citations here."));
        let before = reconciler.snapshot();

        let diff = reconciler.ingest(StreamEvent::annotation("c1", "Source", "http://x"));
        assert!(diff.is_empty());
        assert_eq!(reconciler.snapshot(), before);
        assert_eq!(reconciler.stats().unmatched, 0);
    }

    #[test]
    fn test_annotation_for_unknown_correlation_is_dropped() {
        let mut reconciler = reconciler_with_turn();
        let diff = reconciler.ingest(StreamEvent::annotation("c9", "Source", "http://x"));
        assert!(diff.is_empty());
        assert_eq!(reconciler.stats().unmatched, 1);
    }

    #[test]
    fn test_file_reference_appends_sealed_message() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "Here is the chart:"));
        let diff = reconciler.ingest(StreamEvent::FileReference {
            file_id: "file-1".to_string(),
            file: Some(FileContent::new(vec![1, 2, 3]).with_name("chart.png")),
        });

        assert_eq!(diff.len(), 1);
        let message = &reconciler.messages()[2];
        assert!(message.content.is_file());
        assert!(message.sealed);

        reconciler.ingest(StreamEvent::text_delta("c1", " done"));
        assert_eq!(reconciler.messages()[3].text(), Some(" done"));
    }

    #[test]
    fn test_unresolved_file_reference_is_malformed() {
        let mut reconciler = reconciler_with_turn();
        let diff = reconciler.ingest(StreamEvent::file_reference("file-1"));
        assert!(diff.is_empty());
        assert_eq!(reconciler.stats().malformed, 1);
    }

    #[test]
    fn test_malformed_events_are_counted() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("", "x"));
        reconciler.ingest_json(json!({"type": "code_snippet"}));

        let stats = reconciler.stats();
        assert_eq!(stats.events, 2);
        assert_eq!(stats.malformed, 2);
        assert_eq!(reconciler.len(), 1);
    }

    #[test]
    fn test_end_turn_seals_and_next_turn_never_mutates() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "Hello"));
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));
        assert_eq!(reconciler.end_turn(), 2);
        let before: Vec<TranscriptMessage> = reconciler.messages().to_vec();

        reconciler.begin_turn(&UserInput::new("again"));
        reconciler.ingest(StreamEvent::text_delta("c1", " world"));
        reconciler.ingest(StreamEvent::tool_result("call1", Some(json!("late"))));
        reconciler.ingest(StreamEvent::annotation("c1", "Source", "http://x"));

        assert_eq!(&reconciler.messages()[..before.len()], before.as_slice());
        assert_eq!(reconciler.messages()[4].text(), Some(" world"));
        assert_eq!(reconciler.stats().unmatched, 1);
    }

    #[test]
    fn test_events_after_end_turn_are_dropped() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::text_delta("c1", "Hello【1†doc】"));
        reconciler.end_turn();
        let before = reconciler.snapshot();

        let late = [
            StreamEvent::tool_result("late", Some(json!("x"))),
            StreamEvent::annotation("c1", "Doc", "http://d"),
            StreamEvent::text_delta("c1", " again"),
            StreamEvent::tool_start("call9", "fetch_weather", None),
            StreamEvent::FileReference {
                file_id: "file-1".to_string(),
                file: Some(FileContent::new(vec![1])),
            },
        ];
        for event in late {
            assert!(reconciler.ingest(event).is_empty());
            assert!(!reconciler.is_turn_open());
        }

        assert_eq!(reconciler.snapshot(), before);
        assert!(reconciler.messages().iter().all(|m| m.sealed));
        assert_eq!(reconciler.stats().unmatched, 5);
        assert_eq!(reconciler.stats().events, 6);
    }

    #[test]
    fn test_events_before_first_turn_are_dropped() {
        let mut reconciler = TranscriptReconciler::default();
        let diff = reconciler.ingest(StreamEvent::text_delta("c1", "early"));

        assert!(diff.is_empty());
        assert!(reconciler.is_empty());
        assert!(!reconciler.is_turn_open());
        assert_eq!(reconciler.stats().unmatched, 1);
    }

    #[test]
    fn test_sealed_message_is_never_mutated() {
        let mut reconciler = reconciler_with_turn();
        reconciler.ingest(StreamEvent::tool_start("call1", "fetch_weather", None));
        reconciler.ingest(StreamEvent::tool_result("call1", Some(json!("22C"))));
        assert_eq!(reconciler.stats().sealed_rejections, 0);

        let mut diff = TranscriptDiff::new();
        reconciler.mutate(1, &mut diff, |message| {
            message.status = MessageStatus::Pending;
            true
        });

        assert!(diff.is_empty());
        assert_eq!(reconciler.messages()[1].status, MessageStatus::Done);
        assert_eq!(reconciler.stats().sealed_rejections, 1);
    }

    #[test]
    fn test_end_turn_without_turn_is_noop() {
        let mut reconciler = TranscriptReconciler::default();
        assert_eq!(reconciler.end_turn(), 0);
        assert!(!reconciler.is_turn_open());
    }

    #[test]
    fn test_from_snapshot_seals_history() {
        let mut original = reconciler_with_turn();
        original.ingest(StreamEvent::text_delta("c1", "Hi"));
        let snapshot = original.snapshot();

        let restored = TranscriptReconciler::from_snapshot(snapshot, ToolTitles::default());
        assert_eq!(restored.len(), 2);
        assert!(restored.messages().iter().all(|m| m.sealed));
        assert!(!restored.is_turn_open());
    }

    #[test]
    fn test_changes_since_reports_appends() {
        let mut reconciler = TranscriptReconciler::default();
        reconciler.begin_turn(&UserInput::new("hi").with_attachment("a.txt"));
        let diff = reconciler.changes_since(0);
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().all(|c| c.is_appended()));
    }

    #[test]
    fn test_rewrite_citation() {
        let mut content = "See【1†doc】".to_string();
        assert!(rewrite_citation(&mut content, "Doc", "https://d"));
        assert_eq!(content, "See【[Doc](https://d)】");

        let mut unterminated = "See【1†doc".to_string();
        assert!(!rewrite_citation(&mut unterminated, "Doc", "https://d"));

        let mut stray_close = "See】".to_string();
        assert!(!rewrite_citation(&mut stray_close, "Doc", "https://d"));
    }
}
