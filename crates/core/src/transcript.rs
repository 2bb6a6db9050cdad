// Transcript change notifications
//
// Every reconciler operation reports what it did to the visible transcript as
// a TranscriptDiff. Renderers use the change kind to decide between appending
// a new bubble and redrawing an existing one.

use serde::{Deserialize, Serialize};

use agentchat_schemas::TranscriptMessage;

/// A single visible change to the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum TranscriptChange {
    /// A new message was added at `index`
    Appended {
        index: usize,
        message: TranscriptMessage,
    },
    /// The message at `index` was changed in place
    Mutated {
        index: usize,
        message: TranscriptMessage,
    },
}

impl TranscriptChange {
    pub fn index(&self) -> usize {
        match self {
            TranscriptChange::Appended { index, .. } | TranscriptChange::Mutated { index, .. } => {
                *index
            }
        }
    }

    pub fn message(&self) -> &TranscriptMessage {
        match self {
            TranscriptChange::Appended { message, .. }
            | TranscriptChange::Mutated { message, .. } => message,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, TranscriptChange::Appended { .. })
    }
}

/// Ordered changes produced by one reconciler call.
///
/// At most one change per message index: a message appended and then mutated
/// within the same call is reported once, as appended, with its final state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptDiff {
    changes: Vec<TranscriptChange>,
}

impl TranscriptDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appended(&mut self, index: usize, message: &TranscriptMessage) {
        self.record(TranscriptChange::Appended {
            index,
            message: message.clone(),
        });
    }

    pub fn mutated(&mut self, index: usize, message: &TranscriptMessage) {
        self.record(TranscriptChange::Mutated {
            index,
            message: message.clone(),
        });
    }

    fn record(&mut self, change: TranscriptChange) {
        let index = change.index();
        match self.changes.iter_mut().find(|c| c.index() == index) {
            Some(existing) => {
                let message = change.message().clone();
                *existing = if existing.is_appended() {
                    TranscriptChange::Appended { index, message }
                } else {
                    TranscriptChange::Mutated { index, message }
                };
            }
            None => self.changes.push(change),
        }
    }

    /// Fold another diff into this one, keeping per-index coalescing
    pub fn extend(&mut self, other: TranscriptDiff) {
        for change in other.changes {
            self.record(change);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptChange> {
        self.changes.iter()
    }

    pub fn changes(&self) -> &[TranscriptChange] {
        &self.changes
    }
}

impl IntoIterator for TranscriptDiff {
    type Item = TranscriptChange;
    type IntoIter = std::vec::IntoIter<TranscriptChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a TranscriptDiff {
    type Item = &'a TranscriptChange;
    type IntoIter = std::slice::Iter<'a, TranscriptChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Full copy of the transcript at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    pub messages: Vec<TranscriptMessage>,
}

impl TranscriptSnapshot {
    pub fn new(messages: Vec<TranscriptMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TranscriptMessage> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptMessage> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_mutate_coalesces_to_append() {
        let mut msg = TranscriptMessage::assistant_text("c1", "Hel");
        let mut diff = TranscriptDiff::new();
        diff.appended(0, &msg);
        msg.content = agentchat_schemas::MessageContent::Text("Hello".to_string());
        diff.mutated(0, &msg);

        assert_eq!(diff.len(), 1);
        let change = &diff.changes()[0];
        assert!(change.is_appended());
        assert_eq!(change.message().text(), Some("Hello"));
    }

    #[test]
    fn test_mutations_on_distinct_indexes_keep_order() {
        let a = TranscriptMessage::assistant_text("c1", "a");
        let b = TranscriptMessage::assistant_text("c2", "b");
        let mut diff = TranscriptDiff::new();
        diff.mutated(3, &b);
        diff.mutated(1, &a);

        let indexes: Vec<usize> = diff.iter().map(TranscriptChange::index).collect();
        assert_eq!(indexes, vec![3, 1]);
        assert!(diff.iter().all(|c| !c.is_appended()));
    }

    #[test]
    fn test_extend_merges_diffs() {
        let msg = TranscriptMessage::assistant_text("c1", "x");
        let mut first = TranscriptDiff::new();
        first.appended(0, &msg);
        let mut second = TranscriptDiff::new();
        second.mutated(0, &msg);
        second.appended(1, &msg);

        first.extend(second);
        assert_eq!(first.len(), 2);
        assert!(first.changes()[0].is_appended());
    }

    #[test]
    fn test_change_serializes_with_kind() {
        let msg = TranscriptMessage::user("hi");
        let change = TranscriptChange::Appended {
            index: 0,
            message: msg,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["change"], "appended");
        assert_eq!(json["index"], 0);
    }
}
