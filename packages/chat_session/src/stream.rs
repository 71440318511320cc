//! Append-only, session-scoped message log.

use crate::protocol::Message;

/// Ordered log of decoded messages for one session.
///
/// Insertion order is transport arrival order; no reordering, deduplication,
/// or timestamp-based sorting is ever performed. Mutation is reserved to the
/// connection manager; consumers read snapshots.
#[derive(Debug, Default)]
pub struct MessageStream {
    entries: Vec<Message>,
}

impl MessageStream {
    /// Append the newest decoded record.
    pub(crate) fn append(&mut self, record: Message) {
        self.entries.push(record);
    }

    /// Empty the log. Called on session teardown and on new-session start.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }

    /// Cloned view of the current contents.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageKind;
    use chrono::Utc;

    fn record(id: &str, body: &str) -> Message {
        Message {
            id: id.to_string(),
            kind: MessageKind::Chat,
            body: body.to_string(),
            sender: Some("alice".to_string()),
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn appends_preserve_arrival_order() {
        let mut stream = MessageStream::default();
        stream.append(record("1", "first"));
        stream.append(record("2", "second"));
        stream.append(record("3", "third"));

        let bodies: Vec<_> = stream.snapshot().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[test]
    fn snapshot_does_not_drain_the_log() {
        let mut stream = MessageStream::default();
        stream.append(record("1", "only"));
        let _ = stream.snapshot();
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn reset_empties_the_log() {
        let mut stream = MessageStream::default();
        stream.append(record("1", "gone"));
        stream.reset();
        assert!(stream.is_empty());
        assert!(stream.snapshot().is_empty());
    }
}
