//! In-memory message log for one open room view.
//!
//! The log exclusively owns its sequence for the lifetime of the view. Only
//! two writers exist: the send pipeline (placeholder append, placeholder
//! removal, confirmation bookkeeping) and the realtime apply task
//! (merge-by-identifier insert). Display order is by creation timestamp
//! ascending; optimistic entries sit at the tail.
//!
//! Realtime inserts are strictly additive. They never resolve an optimistic
//! entry; resolution happens only through the send call's own response.

use crate::config::EchoPolicy;
use chat_types::{Message, MessageId, UserId};
use std::time::Instant;
use tokio::sync::watch;

/// What the merge did with an arriving realtime row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Row inserted into the sequence.
    Applied,
    /// Row already present under the same server id.
    DuplicateDropped,
    /// Row matched a recently confirmed send of the viewer and the policy
    /// suppresses echoes.
    EchoSuppressed,
}

/// Ordered in-memory message sequence with merge-by-identifier semantics.
pub struct MessageLog {
    viewer: UserId,
    echo_policy: EchoPolicy,
    entries: Vec<Message>,
    /// Server ids returned by the viewer's confirmed sends, kept while the
    /// echo window lasts.
    confirmed_echoes: Vec<(MessageId, Instant)>,
    revision: u64,
    changes_tx: watch::Sender<u64>,
}

impl MessageLog {
    pub fn new(viewer: UserId, echo_policy: EchoPolicy) -> Self {
        let (changes_tx, _) = watch::channel(0);
        Self {
            viewer,
            echo_policy,
            entries: Vec::new(),
            confirmed_echoes: Vec::new(),
            revision: 0,
            changes_tx,
        }
    }

    /// Subscribe to log mutations.
    ///
    /// The receiver carries the revision counter; any observed change means
    /// the sequence should be re-read.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes_tx.subscribe()
    }

    /// Current revision counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Install the initial history load.
    ///
    /// The backend response order is not trusted; rows are sorted by
    /// creation timestamp (id as tiebreak) so display order is always
    /// non-decreasing.
    pub fn replace_all(&mut self, mut messages: Vec<Message>) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        self.entries = messages;
        self.bump();
    }

    /// Ordered view of the sequence.
    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    /// Owned copy of the sequence.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an optimistic placeholder at the tail.
    pub fn append_optimistic(&mut self, message: Message) {
        debug_assert!(message.is_placeholder());
        self.entries.push(message);
        self.bump();
    }

    /// Remove an entry by its placeholder id. Returns true if it was found.
    pub fn remove_placeholder(&mut self, id: MessageId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|m| m.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.bump();
        }
        removed
    }

    /// Record the server id of a confirmed send for echo suppression.
    ///
    /// The optimistic entry itself is left untouched; this only remembers
    /// which realtime row would be the echo of that send.
    pub fn record_confirmation(&mut self, server_id: MessageId) {
        self.confirmed_echoes.push((server_id, Instant::now()));
    }

    /// Merge an arriving realtime row into the sequence.
    ///
    /// Placeholder entries are never touched: a duplicate is detected only
    /// by server id, and insertion goes by timestamp order (the tail in the
    /// common case).
    pub fn apply_realtime_insert(&mut self, row: Message) -> MergeOutcome {
        if !row.id.is_placeholder() && self.entries.iter().any(|m| m.id == row.id) {
            return MergeOutcome::DuplicateDropped;
        }

        if let EchoPolicy::SuppressOwnWindow(window) = self.echo_policy {
            self.confirmed_echoes.retain(|(_, at)| at.elapsed() < window);
            if row.sender_id == self.viewer
                && self.confirmed_echoes.iter().any(|(id, _)| *id == row.id)
            {
                return MergeOutcome::EchoSuppressed;
            }
        }

        let at = self
            .entries
            .partition_point(|m| m.created_at <= row.created_at);
        self.entries.insert(at, row);
        self.bump();
        MergeOutcome::Applied
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.changes_tx.send_replace(self.revision);
    }
}
