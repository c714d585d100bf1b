//! In-memory message store for one open conversation.
//!
//! The store is the single source of truth for what the thread view renders.
//! Messages are kept sorted ascending by ID with no duplicates. Every mutation
//! is idempotent: re-applying data the store already reflects is a no-op and
//! returns `None`.

use std::collections::HashSet;

use crate::ids::{MessageId, ThreadId};
use crate::model::Message;

/// What a store mutation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The whole list was replaced by an initial page.
    Reset {
        /// Number of messages now held.
        count: usize,
    },
    /// Older messages were merged at the head.
    Prepended {
        /// Number of messages added.
        added: usize,
    },
    /// A backward page was merged, but some of it landed below the head.
    Merged {
        /// Number of messages added.
        added: usize,
    },
    /// A message was added at the tail.
    Appended(MessageId),
    /// A message was added in the middle to keep ID order.
    Inserted(MessageId),
    /// A message's read flag flipped.
    MarkedRead(MessageId),
    /// A message was removed.
    Removed(MessageId),
    /// A newest page was reconciled against the store.
    Reconciled {
        /// Messages added.
        added: usize,
        /// Messages dropped because the server no longer has them.
        removed: usize,
        /// Read flags flipped.
        marked_read: usize,
        /// Newest message, if it was added by this reconciliation.
        new_tail: Option<MessageId>,
    },
}

/// Ordered, de-duplicated messages of a single conversation.
#[derive(Debug, Clone)]
pub struct MessageStore {
    thread_id: ThreadId,
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store for `thread_id`.
    #[must_use]
    pub const fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
        }
    }

    /// Conversation this store belongs to.
    #[must_use]
    pub const fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether `message` belongs to this store's conversation.
    #[must_use]
    pub fn accepts(&self, message: &Message) -> bool {
        message.thread_id == self.thread_id
    }

    /// Messages in ascending ID order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by ID.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.position(id).ok().map(|idx| &self.messages[idx])
    }

    /// Whether a message with `id` is held.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.position(id).is_ok()
    }

    /// ID of the oldest message held.
    #[must_use]
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.messages.first().map(|m| m.id)
    }

    /// ID of the newest message held.
    #[must_use]
    pub fn newest_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }

    fn position(&self, id: MessageId) -> Result<usize, usize> {
        self.messages.binary_search_by_key(&id, |m| m.id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replace everything with the newest page. Used on initial load.
    pub fn replace_all(&mut self, page: Vec<Message>) -> StoreChange {
        self.messages = normalize(page);
        StoreChange::Reset {
            count: self.messages.len(),
        }
    }

    /// Merge a page of older messages at the head.
    ///
    /// IDs already present are skipped, so overlapping pages and races with
    /// live delivery never create duplicates.
    pub fn prepend_older(&mut self, page: Vec<Message>) -> Option<StoreChange> {
        let mut fresh: Vec<Message> = page
            .into_iter()
            .filter(|m| !self.contains(m.id))
            .collect();
        fresh = normalize(fresh);

        let newest_fresh = fresh.last()?.id;
        let added = fresh.len();

        if self.oldest_id().map_or(true, |oldest| newest_fresh < oldest) {
            fresh.append(&mut self.messages);
            self.messages = fresh;
            Some(StoreChange::Prepended { added })
        } else {
            self.messages.extend(fresh);
            self.messages.sort_by_key(|m| m.id);
            Some(StoreChange::Merged { added })
        }
    }

    /// Insert a message delivered live or returned by a send.
    ///
    /// A duplicate ID is a no-op. An ID older than the current tail is placed
    /// at its sorted position.
    pub fn append_live(&mut self, message: Message) -> Option<StoreChange> {
        match self.position(message.id) {
            Ok(_) => None,
            Err(idx) if idx == self.messages.len() => {
                let id = message.id;
                self.messages.push(message);
                Some(StoreChange::Appended(id))
            }
            Err(idx) => {
                let id = message.id;
                self.messages.insert(idx, message);
                Some(StoreChange::Inserted(id))
            }
        }
    }

    /// Flip the read flag of `id`.
    pub fn mark_read(&mut self, id: MessageId) -> Option<StoreChange> {
        let idx = self.position(id).ok()?;
        let message = &mut self.messages[idx];
        if message.is_read {
            return None;
        }
        message.is_read = true;
        Some(StoreChange::MarkedRead(id))
    }

    /// Remove the message with `id`.
    pub fn remove(&mut self, id: MessageId) -> Option<StoreChange> {
        let idx = self.position(id).ok()?;
        self.messages.remove(idx);
        Some(StoreChange::Removed(id))
    }

    /// Reconcile the store with a freshly fetched newest page.
    ///
    /// `known_newest` is the newest ID the store held when the fetch was
    /// issued. The server is authoritative from the page's oldest ID up to
    /// the greater of `known_newest` and the page's newest ID: missing
    /// messages are added and messages the page no longer contains are
    /// dropped. Older history below that range is left alone, and so is
    /// anything newer, which arrived after the fetch went out. Read flags only
    /// move from unread to read. An empty page covers everything up to
    /// `known_newest`.
    pub fn reconcile_recent(
        &mut self,
        page: Vec<Message>,
        known_newest: Option<MessageId>,
    ) -> Option<StoreChange> {
        let page = normalize(page);

        let floor = page.first().map(|m| m.id);
        let ceiling = page.last().map(|m| m.id).max(known_newest);
        let covered = |id: MessageId| {
            floor.map_or(true, |floor| id >= floor) && ceiling.is_some_and(|ceiling| id <= ceiling)
        };

        let present: HashSet<MessageId> = page.iter().map(|m| m.id).collect();
        let before = self.messages.len();
        self.messages
            .retain(|m| !covered(m.id) || present.contains(&m.id));
        let removed = before - self.messages.len();

        let previous_tail = self.newest_id();
        let mut added = 0;
        let mut marked_read = 0;

        for message in page {
            match self.position(message.id) {
                Ok(idx) => {
                    let held = &mut self.messages[idx];
                    if message.is_read && !held.is_read {
                        held.is_read = true;
                        marked_read += 1;
                    }
                }
                Err(idx) => {
                    self.messages.insert(idx, message);
                    added += 1;
                }
            }
        }

        if added == 0 && removed == 0 && marked_read == 0 {
            return None;
        }

        let new_tail = self
            .newest_id()
            .filter(|tail| previous_tail.map_or(true, |prev| *tail > prev));

        Some(StoreChange::Reconciled {
            added,
            removed,
            marked_read,
            new_tail,
        })
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Sort ascending by ID and collapse duplicate IDs, keeping the first.
fn normalize(mut page: Vec<Message>) -> Vec<Message> {
    page.sort_by_key(|m| m.id);
    page.dedup_by_key(|m| m.id);
    page
}
