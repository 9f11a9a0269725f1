//! Append-only durable message log.
//!
//! Message ids are assigned here and nowhere else. The log is the single
//! source of truth for replay: persisted order is append order is broadcast
//! order. When no path is configured the store runs fully in memory and the
//! history is lost on restart.
//!
//! Durability policy is best-effort: a failed append is logged for operators
//! and the message still enters the in-memory state (and therefore live
//! broadcast) with its assigned id. The store marks itself degraded so the
//! relay can report it.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use sotto_shared::crypto::Envelope;
use sotto_shared::protocol::{MessageRecord, ReactionRecord};
use sotto_shared::types::MessageId;

use crate::error::{Result, StoreError};
use crate::models::LogRecord;
use crate::reactions::{Merge, ReactionIndex};

/// Destination for one durable log line per append.
trait LogSink: Send {
    fn append(&mut self, line: &[u8]) -> std::io::Result<()>;
}

struct FileSink(File);

impl LogSink for FileSink {
    fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.0.write_all(line)?;
        self.0.flush()?;
        // The frame must not be acknowledged before the record is durable.
        self.0.sync_data()
    }
}

pub struct HistoryStore {
    messages: Vec<MessageRecord>,
    index: ReactionIndex,
    next_id: MessageId,
    log: Option<Box<dyn LogSink>>,
    degraded: bool,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("messages", &self.messages)
            .field("index", &self.index)
            .field("next_id", &self.next_id)
            .field("log", &self.log.as_ref().map(|_| "dyn LogSink"))
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl HistoryStore {
    /// Open a store, replaying the log at `path` if one is configured.
    ///
    /// A missing or empty file yields an empty store with `next_id = 1`.
    /// `None` yields an in-memory store that persists nothing.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let mut store = Self {
            messages: Vec::new(),
            index: ReactionIndex::new(),
            next_id: MessageId::FIRST,
            log: None,
            degraded: false,
        };

        let Some(path) = path else {
            info!("History persistence disabled; running in-memory");
            return Ok(store);
        };

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: LogRecord =
                    serde_json::from_str(&line).map_err(|source| StoreError::CorruptRecord {
                        line: line_no + 1,
                        source,
                    })?;
                store.replay(record)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        store.log = Some(Box::new(FileSink(file)));
        info!(
            path = %path.display(),
            messages = store.messages.len(),
            next_id = %store.next_id,
            "History loaded"
        );
        Ok(store)
    }

    /// Apply one persisted record during load.
    ///
    /// Message ids in the log are required to be strictly ascending; a
    /// repeated or descending id means the file was hand-edited or merged
    /// from two logs, and lookups over it would be unreliable.
    fn replay(&mut self, record: LogRecord) -> Result<()> {
        match record {
            LogRecord::Message(message) => {
                if message.id < self.next_id {
                    return Err(StoreError::OutOfOrderId(message.id));
                }
                self.next_id = message.id.next();
                self.messages.push(message);
            }
            LogRecord::Reaction(reaction) => {
                // Only Changed merges were persisted, but stay idempotent
                // in case a crash left a duplicate tail.
                if self.attach_reaction(&reaction) == Some(Merge::Changed) {
                    debug!(message_id = %reaction.message_id, "Replayed reaction");
                }
            }
        }
        Ok(())
    }

    /// Assign the next id to a message and persist it.
    ///
    /// The returned record is exactly what must be broadcast; it enters the
    /// in-memory state even if the durable write fails (best-effort policy).
    pub fn append_message(
        &mut self,
        sender: &str,
        envelope: Envelope,
        timestamp: DateTime<Utc>,
    ) -> MessageRecord {
        let record = MessageRecord {
            id: self.next_id,
            sender: sender.to_string(),
            envelope,
            timestamp,
            reactions: Vec::new(),
        };
        self.next_id = self.next_id.next();

        self.persist_best_effort(&LogRecord::Message(record.clone()));
        self.messages.push(record.clone());
        record
    }

    /// Merge a reaction into the index and persist it if it changed state.
    ///
    /// Rejects reactions that reference an id this store never assigned.
    pub fn add_reaction(&mut self, reaction: ReactionRecord) -> Result<Merge> {
        let Some(merge) = self.attach_reaction(&reaction) else {
            return Err(StoreError::UnknownMessage(reaction.message_id));
        };

        if merge == Merge::Changed {
            self.persist_best_effort(&LogRecord::Reaction(reaction));
        }
        Ok(merge)
    }

    /// Merge into the index and the owning message's reaction set.
    /// Returns `None` if the message id is unknown.
    fn attach_reaction(&mut self, reaction: &ReactionRecord) -> Option<Merge> {
        let position = self
            .messages
            .binary_search_by_key(&reaction.message_id, |m| m.id)
            .ok()?;

        let merge = self
            .index
            .add(reaction.message_id, &reaction.token(), &reaction.sender);
        if merge == Merge::Changed {
            self.messages[position].reactions.push(reaction.clone());
        }
        Some(merge)
    }

    fn persist_best_effort(&mut self, record: &LogRecord) {
        if let Err(e) = self.persist(record) {
            self.degraded = true;
            error!(error = %e, "History append failed; continuing without durability");
        }
    }

    fn persist(&mut self, record: &LogRecord) -> Result<()> {
        let Some(log) = self.log.as_mut() else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        log.append(&line)?;
        Ok(())
    }

    #[cfg(test)]
    fn with_sink(sink: Box<dyn LogSink>) -> Self {
        Self {
            messages: Vec::new(),
            index: ReactionIndex::new(),
            next_id: MessageId::FIRST,
            log: Some(sink),
            degraded: false,
        }
    }

    /// All messages in ascending id order, reaction snapshots attached.
    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .is_ok()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn next_id(&self) -> MessageId {
        self.next_id
    }

    pub fn reactions(&self) -> &ReactionIndex {
        &self.index
    }

    /// True once any durable write has failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn envelope(byte: u8) -> Envelope {
        Envelope {
            nonce: vec![byte; 24],
            ciphertext: vec![byte; 8],
        }
    }

    fn reaction(id: u64, sender: &str, byte: u8) -> ReactionRecord {
        ReactionRecord {
            message_id: MessageId(id),
            sender: sender.to_string(),
            envelope: envelope(byte),
        }
    }

    #[test]
    fn test_in_memory_store_starts_at_one() {
        let mut store = HistoryStore::open(None).unwrap();
        assert_eq!(store.next_id(), MessageId(1));

        let record = store.append_message("alice", envelope(1), Utc::now());
        assert_eq!(record.id, MessageId(1));
        assert_eq!(store.next_id(), MessageId(2));
    }

    #[test]
    fn test_ids_strictly_increasing_no_gaps() {
        let mut store = HistoryStore::open(None).unwrap();
        for expected in 1..=20u64 {
            let record = store.append_message("alice", envelope(1), Utc::now());
            assert_eq!(record.id, MessageId(expected));
        }
    }

    #[test]
    fn test_missing_file_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        let store = HistoryStore::open(Some(&path)).unwrap();
        assert_eq!(store.message_count(), 0);
        assert_eq!(store.next_id(), MessageId(1));
    }

    #[test]
    fn test_restart_resumes_after_highest_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut store = HistoryStore::open(Some(&path)).unwrap();
            for _ in 0..41 {
                store.append_message("alice", envelope(1), Utc::now());
            }
            assert_eq!(store.next_id(), MessageId(42));
        }

        let mut reloaded = HistoryStore::open(Some(&path)).unwrap();
        assert_eq!(reloaded.message_count(), 41);
        let record = reloaded.append_message("bob", envelope(2), Utc::now());
        assert_eq!(record.id, MessageId(42));
    }

    #[test]
    fn test_reload_reconstructs_reactions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut store = HistoryStore::open(Some(&path)).unwrap();
            store.append_message("alice", envelope(1), Utc::now());
            let r = reaction(1, "B", 7);
            assert_eq!(store.add_reaction(r).unwrap(), Merge::Changed);
        }

        let reloaded = HistoryStore::open(Some(&path)).unwrap();
        let message = &reloaded.messages()[0];
        assert_eq!(message.reactions.len(), 1);
        assert_eq!(message.reactions[0].sender, "B");

        let token = message.reactions[0].token();
        assert!(reloaded.reactions().snapshot(MessageId(1)).contains_key(&token));
    }

    #[test]
    fn test_duplicate_reaction_unchanged_and_persisted_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut store = HistoryStore::open(Some(&path)).unwrap();
            store.append_message("alice", envelope(1), Utc::now());

            let r = reaction(1, "B", 7);
            assert_eq!(store.add_reaction(r.clone()).unwrap(), Merge::Changed);
            assert_eq!(store.add_reaction(r).unwrap(), Merge::Unchanged);
            assert_eq!(store.messages()[0].reactions.len(), 1);
        }

        let reloaded = HistoryStore::open(Some(&path)).unwrap();
        assert_eq!(reloaded.messages()[0].reactions.len(), 1);
    }

    #[test]
    fn test_unknown_message_reaction_rejected() {
        let mut store = HistoryStore::open(None).unwrap();
        store.append_message("alice", envelope(1), Utc::now());

        let r = reaction(999, "D", 7);
        let err = store.add_reaction(r).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMessage(MessageId(999))));
        assert!(store.reactions().is_empty());
    }

    struct FailingSink;

    impl LogSink for FailingSink {
        fn append(&mut self, _line: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_failed_append_keeps_message_and_marks_degraded() {
        let mut store = HistoryStore::with_sink(Box::new(FailingSink));

        let record = store.append_message("alice", envelope(1), Utc::now());
        assert_eq!(record.id, MessageId(1));
        assert_eq!(store.message_count(), 1);
        assert!(store.is_degraded());

        // The live conversation carries on: ids keep advancing and
        // reactions still merge, all without durability.
        let second = store.append_message("bob", envelope(2), Utc::now());
        assert_eq!(second.id, MessageId(2));
        assert_eq!(store.add_reaction(reaction(1, "B", 7)).unwrap(), Merge::Changed);
        assert!(store.is_degraded());
    }

    #[test]
    fn test_out_of_order_log_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        let mut lines = String::new();
        for id in [2u64, 1] {
            let record = LogRecord::Message(MessageRecord {
                id: MessageId(id),
                sender: "alice".to_string(),
                envelope: envelope(id as u8),
                timestamp: Utc::now(),
                reactions: Vec::new(),
            });
            lines.push_str(&serde_json::to_string(&record).unwrap());
            lines.push('\n');
        }
        std::fs::write(&path, lines).unwrap();

        let err = HistoryStore::open(Some(&path)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrderId(MessageId(1))));
    }

    #[test]
    fn test_corrupt_line_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");
        std::fs::write(&path, "{not json}\n").unwrap();

        let err = HistoryStore::open(Some(&path)).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord { line: 1, .. }));
    }

    #[test]
    fn test_persisted_order_is_append_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut store = HistoryStore::open(Some(&path)).unwrap();
            store.append_message("alice", envelope(1), Utc::now());
            store.append_message("bob", envelope(2), Utc::now());
            store.append_message("alice", envelope(3), Utc::now());
        }

        let reloaded = HistoryStore::open(Some(&path)).unwrap();
        let ids: Vec<_> = reloaded.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!reloaded.is_degraded());
    }
}
