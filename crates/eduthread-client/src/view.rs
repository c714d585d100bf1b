//! The open conversation.
//!
//! `ThreadView` ties the message store, the history pager, the scroll
//! controller and the live receiver together. It never blocks: network work
//! runs in spawned tasks whose completions come back as `ViewUpdate`s on the
//! channel given at construction, and the owner feeds them to
//! [`ThreadView::apply`] from its event loop. Every update carries the epoch of
//! the view that issued it; updates for another epoch are dropped.

use std::sync::Arc;

use eduthread_core::{
    ChangeKind, CoreError, HistoryPager, Message, MessageId, MessageStore, PageKind, PageRequest,
    ScrollAction, ScrollController, StoreChange, ThreadId, UserId, ViewConfig, Viewport,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::MessageApi;
use crate::error::ClientError;
use crate::history;
use crate::hub::HubClient;
use crate::receiver::{LiveEvent, LiveReceiver};

/// Purpose of a page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Newest page on open.
    Initial,
    /// Backward page.
    Older,
    /// Newest page after a (re)join, to catch up on missed events.
    ///
    /// `known_newest` is the newest stored id when the fetch was issued;
    /// anything newer arrived live and is outside the page's authority.
    Reconcile { known_newest: Option<MessageId> },
}

/// Completion of background work for a view.
#[derive(Debug)]
pub enum ViewUpdate {
    /// A page fetch finished.
    Page {
        /// Issuing view.
        epoch: u64,
        /// What the page was for.
        kind: FetchKind,
        /// Page sorted by ascending ID, or the failure.
        result: Result<Vec<Message>, ClientError>,
    },
    /// A send finished.
    Sent {
        /// Issuing view.
        epoch: u64,
        /// Text that was sent.
        content: String,
        /// Stored message, or the failure.
        result: Result<Message, ClientError>,
    },
    /// A push event arrived.
    Live {
        /// Issuing view.
        epoch: u64,
        /// The event.
        event: LiveEvent,
    },
}

impl ViewUpdate {
    /// Epoch of the view that issued this update.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        match self {
            Self::Page { epoch, .. } | Self::Sent { epoch, .. } | Self::Live { epoch, .. } => {
                *epoch
            }
        }
    }
}

/// Whether the first page has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Waiting for the first page (or for a retry after it failed).
    Loading,
    /// First page applied.
    Ready,
}

/// State of the push subscription as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    /// No subscription started.
    Off,
    /// Connecting for the first time.
    Connecting,
    /// Transport up, join pending.
    Connected,
    /// Receiving events.
    Joined,
    /// Waiting to reconnect.
    Reconnecting {
        /// Attempt number.
        attempt: usize,
    },
    /// Subscription ended.
    Offline(Option<String>),
}

/// The open conversation.
pub struct ThreadView {
    api: Arc<dyn MessageApi>,
    thread_id: ThreadId,
    me: UserId,
    epoch: u64,
    updates: mpsc::Sender<ViewUpdate>,
    store: MessageStore,
    pager: HistoryPager,
    scroll: ScrollController,
    config: ViewConfig,
    receiver: Option<LiveReceiver>,
    load_state: LoadState,
    load_error: Option<String>,
    live: LiveStatus,
    reconcile_in_flight: bool,
    reconcile_pending: bool,
    sending: bool,
    send_error: Option<String>,
    failed_draft: Option<String>,
    viewport: Viewport,
    pending_scroll: Option<(ChangeKind, Viewport)>,
    animating: bool,
}

impl std::fmt::Debug for ThreadView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadView")
            .field("thread_id", &self.thread_id)
            .field("epoch", &self.epoch)
            .field("messages", &self.store.len())
            .field("load_state", &self.load_state)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl ThreadView {
    /// Create a view for `thread_id` as seen by `me`.
    ///
    /// Nothing is fetched until [`load_initial`](Self::load_initial).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` for a zero page size or invalid
    /// view thresholds.
    pub fn new(
        api: Arc<dyn MessageApi>,
        thread_id: ThreadId,
        me: UserId,
        page_size: usize,
        config: ViewConfig,
        epoch: u64,
        updates: mpsc::Sender<ViewUpdate>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            api,
            thread_id,
            me,
            epoch,
            updates,
            store: MessageStore::new(thread_id),
            pager: HistoryPager::new(page_size)?,
            scroll: ScrollController::new(config),
            config,
            receiver: None,
            load_state: LoadState::Loading,
            load_error: None,
            live: LiveStatus::Off,
            reconcile_in_flight: false,
            reconcile_pending: false,
            sending: false,
            send_error: None,
            failed_draft: None,
            viewport: Viewport::default(),
            pending_scroll: None,
            animating: false,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Conversation shown.
    #[must_use]
    pub const fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Lifetime tag of this view.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The viewing user.
    #[must_use]
    pub const fn me(&self) -> &UserId {
        &self.me
    }

    /// Messages in ascending ID order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Whether `message` was written by the viewing user.
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        message.is_from(&self.me)
    }

    /// Load state of the first page.
    #[must_use]
    pub const fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// Error of the last failed initial fetch.
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Push subscription state.
    #[must_use]
    pub const fn live_status(&self) -> &LiveStatus {
        &self.live
    }

    /// Whether a backward page is being fetched.
    #[must_use]
    pub const fn is_loading_older(&self) -> bool {
        self.pager.is_initial_loaded() && self.pager.is_in_flight()
    }

    /// Whether the start of the conversation is loaded.
    #[must_use]
    pub const fn history_exhausted(&self) -> bool {
        self.pager.is_exhausted()
    }

    /// Whether a send is pending.
    #[must_use]
    pub const fn is_sending(&self) -> bool {
        self.sending
    }

    /// Error of the last failed send.
    #[must_use]
    pub fn send_error(&self) -> Option<&str> {
        self.send_error.as_deref()
    }

    /// Clear the inline send error.
    pub fn dismiss_send_error(&mut self) {
        self.send_error = None;
    }

    /// Take back the text of the last failed send.
    pub fn take_failed_draft(&mut self) -> Option<String> {
        self.failed_draft.take()
    }

    /// Viewport as of the last layout.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Whether a scroll animation is running.
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.animating
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fetch the newest page. Also retries after a failed first load.
    ///
    /// Returns `false` if the page is already loaded or being fetched.
    pub fn load_initial(&mut self) -> bool {
        if self.load_state == LoadState::Ready {
            return false;
        }
        let Some(request) = self.pager.begin_initial() else {
            return false;
        };
        self.load_error = None;
        self.spawn_fetch(FetchKind::Initial, request);
        true
    }

    /// Start receiving push events through `hub`.
    pub fn start_live(&mut self, hub: HubClient) {
        if self.receiver.is_some() {
            return;
        }
        info!(thread_id = %self.thread_id, epoch = self.epoch, "Starting live updates");
        self.receiver = Some(LiveReceiver::start(
            hub,
            self.thread_id,
            self.epoch,
            self.updates.clone(),
        ));
        self.live = LiveStatus::Connecting;
    }

    /// Stop push events. Later completions are still filtered by epoch.
    pub fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.stop();
        }
        self.live = LiveStatus::Off;
        debug!(thread_id = %self.thread_id, epoch = self.epoch, "Closed thread view");
    }

    // =========================================================================
    // User Actions
    // =========================================================================

    /// Fetch an older page if the viewport is near the top.
    ///
    /// Returns `true` if a fetch started.
    pub fn maybe_load_older(&mut self) -> bool {
        if self.load_state != LoadState::Ready
            || !self.viewport.is_near_top(self.config.load_older_threshold)
        {
            return false;
        }
        let Some(request) = self.pager.begin_older(self.store.oldest_id()) else {
            return false;
        };
        debug!(thread_id = %self.thread_id, before = ?request.before, "Loading older messages");
        self.spawn_fetch(FetchKind::Older, request);
        true
    }

    /// Send `content`. Blank input and sends while one is pending are ignored.
    pub fn send(&mut self, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() || self.sending {
            return false;
        }
        self.sending = true;
        self.send_error = None;
        self.failed_draft = None;

        let api = Arc::clone(&self.api);
        let tx = self.updates.clone();
        let epoch = self.epoch;
        let thread_id = self.thread_id;
        let content = content.to_string();
        tokio::spawn(async move {
            let result = api.send_message(thread_id, &content).await;
            let _ = tx
                .send(ViewUpdate::Sent {
                    epoch,
                    content,
                    result,
                })
                .await;
        });
        true
    }

    /// Delete one of the viewer's own messages.
    ///
    /// The message disappears at once; a failed request is only logged.
    pub fn delete(&mut self, message_id: MessageId) -> bool {
        let Some(message) = self.store.get(message_id) else {
            return false;
        };
        if !message.is_from(&self.me) {
            return false;
        }
        if let Some(change) = self.store.remove(message_id) {
            self.record_change(change, false);
        }

        let api = Arc::clone(&self.api);
        let thread_id = self.thread_id;
        tokio::spawn(async move {
            if let Err(e) = api.delete_message(thread_id, message_id).await {
                warn!(thread_id = %thread_id, message_id = %message_id, error = %e, "Failed to delete message");
            }
        });
        true
    }

    // =========================================================================
    // Scrolling
    // =========================================================================

    /// Record the rendered geometry and apply the pending scroll decision.
    ///
    /// Returns the offset to render with.
    pub fn layout(&mut self, height: usize, content_height: usize) -> usize {
        let mut after = Viewport {
            offset: self.viewport.offset,
            height,
            content_height,
        };
        after.offset = after.offset.min(after.max_offset());

        if let Some((kind, before)) = self.pending_scroll.take() {
            let action = self.scroll.decide(kind, before, content_height);
            match action {
                ScrollAction::AnimateToBottom => self.animating = true,
                ScrollAction::JumpToBottom | ScrollAction::ShiftBy(_) => self.animating = false,
                ScrollAction::Keep => {}
            }
            after.offset = action.resolve(after);
        }

        self.viewport = after;
        after.offset
    }

    /// Scroll by `delta` rows (negative is up). Cancels any animation.
    pub fn scroll_by(&mut self, delta: isize) {
        self.animating = false;
        let max = self.viewport.max_offset();
        let offset = self.viewport.offset.saturating_add_signed(delta);
        self.viewport.offset = offset.min(max);
    }

    /// Animate to the bottom.
    pub fn scroll_to_bottom(&mut self) {
        self.animating = true;
    }

    /// Advance the scroll animation by one frame.
    ///
    /// Returns `true` if the offset moved.
    pub fn tick_animation(&mut self) -> bool {
        if !self.animating {
            return false;
        }
        let target = self.viewport.max_offset();
        let next = eduthread_core::animate_step(self.viewport.offset, target);
        let moved = next != self.viewport.offset;
        self.viewport.offset = next;
        if next == target {
            self.animating = false;
        }
        moved
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Apply a completion. Returns `false` if it belonged to another epoch.
    pub fn apply(&mut self, update: ViewUpdate) -> bool {
        if update.epoch() != self.epoch {
            debug!(thread_id = %self.thread_id, epoch = self.epoch, stale = update.epoch(), "Dropping stale update");
            return false;
        }
        match update {
            ViewUpdate::Page { kind, result, .. } => self.apply_page(kind, result),
            ViewUpdate::Sent {
                content, result, ..
            } => self.apply_sent(content, result),
            ViewUpdate::Live { event, .. } => self.apply_live(event),
        }
        true
    }

    fn apply_page(&mut self, kind: FetchKind, result: Result<Vec<Message>, ClientError>) {
        match (kind, result) {
            (FetchKind::Initial, Ok(page)) => {
                self.pager.complete(PageKind::Initial, page.len());
                let unread = history::unread_from_other(&page, &self.me);
                let change = self.store.replace_all(page);
                self.load_state = LoadState::Ready;
                self.load_error = None;
                self.record_change(change, false);
                self.acknowledge(unread);
                info!(thread_id = %self.thread_id, messages = self.store.len(), "Conversation loaded");

                if self.reconcile_pending {
                    self.reconcile_pending = false;
                    self.start_reconcile();
                }
            }
            (FetchKind::Initial, Err(e)) => {
                self.pager.fail(PageKind::Initial);
                warn!(thread_id = %self.thread_id, error = %e, "Failed to load conversation");
                self.load_error = Some(e.to_string());
            }
            (FetchKind::Older, Ok(page)) => {
                self.pager.complete(PageKind::Older, page.len());
                let unread = history::unread_from_other(&page, &self.me);
                if let Some(change) = self.store.prepend_older(page) {
                    self.record_change(change, false);
                }
                self.acknowledge(unread);
            }
            (FetchKind::Older, Err(e)) => {
                self.pager.fail(PageKind::Older);
                debug!(thread_id = %self.thread_id, error = %e, "Failed to load older messages");
            }
            (FetchKind::Reconcile { known_newest }, Ok(page)) => {
                self.reconcile_in_flight = false;
                let unread = history::unread_from_other(&page, &self.me);
                if let Some(change) = self.store.reconcile_recent(page, known_newest) {
                    let own = match change {
                        StoreChange::Reconciled {
                            new_tail: Some(id), ..
                        } => self.store.get(id).is_some_and(|m| m.is_from(&self.me)),
                        _ => false,
                    };
                    debug!(thread_id = %self.thread_id, change = ?change, "Reconciled recent messages");
                    self.record_change(change, own);
                }
                self.acknowledge(unread);
            }
            (FetchKind::Reconcile { .. }, Err(e)) => {
                self.reconcile_in_flight = false;
                warn!(thread_id = %self.thread_id, error = %e, "Failed to reconcile recent messages");
            }
        }
    }

    fn apply_sent(&mut self, content: String, result: Result<Message, ClientError>) {
        self.sending = false;
        match result {
            Ok(message) => {
                self.send_error = None;
                if let Some(change) = self.store.append_live(message) {
                    self.record_change(change, true);
                }
            }
            Err(e) => {
                warn!(thread_id = %self.thread_id, error = %e, "Failed to send message");
                self.send_error = Some(e.to_string());
                self.failed_draft = Some(content);
            }
        }
    }

    fn apply_live(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Connected => self.live = LiveStatus::Connected,
            LiveEvent::Joined => {
                self.live = LiveStatus::Joined;
                if self.load_state == LoadState::Ready {
                    self.start_reconcile();
                } else {
                    self.reconcile_pending = true;
                }
            }
            LiveEvent::Reconnecting { attempt } => {
                self.live = LiveStatus::Reconnecting { attempt };
            }
            LiveEvent::Closed { error } => self.live = LiveStatus::Offline(error),
            LiveEvent::Created(_) | LiveEvent::Read(_) | LiveEvent::Deleted(_)
                if self.load_state == LoadState::Loading =>
            {
                // The first page replaces the store; catch up once it is in.
                self.reconcile_pending = true;
            }
            LiveEvent::Created(message) => {
                if !self.store.accepts(&message) {
                    debug!(thread_id = %self.thread_id, other = %message.thread_id, "Ignoring message for another conversation");
                    return;
                }
                let own = message.is_from(&self.me);
                let unread = if message.needs_ack_by(&self.me) {
                    vec![message.id]
                } else {
                    Vec::new()
                };
                if let Some(change) = self.store.append_live(message) {
                    self.record_change(change, own);
                }
                self.acknowledge(unread);
            }
            LiveEvent::Read(id) => {
                if let Some(change) = self.store.mark_read(id) {
                    self.record_change(change, false);
                }
            }
            LiveEvent::Deleted(id) => {
                if let Some(change) = self.store.remove(id) {
                    self.record_change(change, false);
                }
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn spawn_fetch(&self, kind: FetchKind, request: PageRequest) {
        let api = Arc::clone(&self.api);
        let tx = self.updates.clone();
        let epoch = self.epoch;
        let thread_id = self.thread_id;
        tokio::spawn(async move {
            let result = history::fetch_sorted(api.as_ref(), thread_id, request).await;
            let _ = tx
                .send(ViewUpdate::Page {
                    epoch,
                    kind,
                    result,
                })
                .await;
        });
    }

    fn start_reconcile(&mut self) {
        if self.reconcile_in_flight {
            return;
        }
        self.reconcile_in_flight = true;
        let request = PageRequest {
            before: None,
            take: self.pager.page_size(),
        };
        let kind = FetchKind::Reconcile {
            known_newest: self.store.newest_id(),
        };
        self.spawn_fetch(kind, request);
    }

    /// Mark `ids` read locally and acknowledge them in the background.
    fn acknowledge(&mut self, ids: Vec<MessageId>) {
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            if let Some(change) = self.store.mark_read(*id) {
                self.record_change(change, false);
            }
        }
        history::spawn_acknowledgements(Arc::clone(&self.api), self.thread_id, ids);
    }

    /// Remember a store change for the next layout.
    ///
    /// The event loop lays out after every update, so at most one change is
    /// normally pending; otherwise the change with the stronger scroll effect
    /// wins.
    fn record_change(&mut self, change: StoreChange, own: bool) {
        let kind = ChangeKind::from_store(change, own);
        let keep_existing = self
            .pending_scroll
            .is_some_and(|(existing, _)| scroll_rank(existing) >= scroll_rank(kind));
        if !keep_existing {
            self.pending_scroll = Some((kind, self.viewport));
        }
    }
}

impl Drop for ThreadView {
    fn drop(&mut self) {
        self.close();
    }
}

const fn scroll_rank(kind: ChangeKind) -> u8 {
    match kind {
        ChangeKind::Updated => 0,
        ChangeKind::Removed => 1,
        ChangeKind::Appended { own: false } => 2,
        ChangeKind::Appended { own: true } => 3,
        ChangeKind::Prepended => 4,
        ChangeKind::InitialPage => 5,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    use super::*;

    const ME: &str = "teacher-1";
    const THEM: &str = "guardian-1";

    fn thread() -> ThreadId {
        ThreadId::new(4)
    }

    fn message(id: i64, sender: &str, is_read: bool) -> Message {
        Message {
            id: MessageId::new(id),
            thread_id: thread(),
            sender_user_id: UserId::new(sender).unwrap(),
            content: Some(format!("message {id}")),
            sent_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            is_read,
        }
    }

    /// In-memory server for one conversation.
    #[derive(Default)]
    struct FakeServer {
        messages: Mutex<Vec<Message>>,
        fail_fetches: Mutex<bool>,
        fail_sends: Mutex<bool>,
        acknowledged: Mutex<Vec<MessageId>>,
        deleted: Mutex<Vec<MessageId>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl FakeServer {
        fn with_messages(count: i64) -> Arc<Self> {
            let server = Self::default();
            *server.messages.lock() = (1..=count)
                .map(|id| message(id, if id % 2 == 0 { ME } else { THEM }, false))
                .collect();
            Arc::new(server)
        }

        fn api_error(status: u16) -> ClientError {
            ClientError::Api {
                status,
                message: "unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl MessageApi for FakeServer {
        async fn fetch_page(
            &self,
            _thread_id: ThreadId,
            request: PageRequest,
        ) -> crate::error::Result<Vec<Message>> {
            self.requests.lock().push(request);
            if *self.fail_fetches.lock() {
                return Err(Self::api_error(503));
            }
            let messages = self.messages.lock();
            // Newest first, as an unordered server might answer.
            Ok(messages
                .iter()
                .rev()
                .filter(|m| request.before.is_none_or(|before| m.id < before))
                .take(request.take)
                .cloned()
                .collect())
        }

        async fn send_message(
            &self,
            thread_id: ThreadId,
            content: &str,
        ) -> crate::error::Result<Message> {
            if *self.fail_sends.lock() {
                return Err(Self::api_error(500));
            }
            let mut messages = self.messages.lock();
            let id = messages.last().map_or(1, |m| m.id.get() + 1);
            let mut sent = message(id, ME, false);
            sent.thread_id = thread_id;
            sent.content = Some(content.to_string());
            messages.push(sent.clone());
            Ok(sent)
        }

        async fn mark_read(
            &self,
            _thread_id: ThreadId,
            message_id: MessageId,
        ) -> crate::error::Result<()> {
            self.acknowledged.lock().push(message_id);
            Ok(())
        }

        async fn delete_message(
            &self,
            _thread_id: ThreadId,
            message_id: MessageId,
        ) -> crate::error::Result<()> {
            self.deleted.lock().push(message_id);
            Err(Self::api_error(500))
        }
    }

    fn view_with(
        server: &Arc<FakeServer>,
        page_size: usize,
    ) -> (ThreadView, mpsc::Receiver<ViewUpdate>) {
        let (tx, rx) = mpsc::channel(16);
        let api: Arc<dyn MessageApi> = Arc::clone(server) as Arc<dyn MessageApi>;
        let view = ThreadView::new(
            api,
            thread(),
            UserId::new(ME).unwrap(),
            page_size,
            ViewConfig::default(),
            1,
            tx,
        )
        .unwrap();
        (view, rx)
    }

    async fn next_update(rx: &mut mpsc::Receiver<ViewUpdate>) -> ViewUpdate {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("update timed out")
            .expect("channel closed")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn ids(view: &ThreadView) -> Vec<i64> {
        view.messages().iter().map(|m| m.id.get()).collect()
    }

    async fn loaded(server: &Arc<FakeServer>, page_size: usize) -> (ThreadView, mpsc::Receiver<ViewUpdate>) {
        let (mut view, mut rx) = view_with(server, page_size);
        assert!(view.load_initial());
        let update = next_update(&mut rx).await;
        assert!(view.apply(update));
        (view, rx)
    }

    fn live(view: &ThreadView, event: LiveEvent) -> ViewUpdate {
        ViewUpdate::Live {
            epoch: view.epoch(),
            event,
        }
    }

    // =========================================================================
    // Initial Load
    // =========================================================================

    #[tokio::test]
    async fn initial_load_sorts_and_jumps_to_bottom() {
        let server = FakeServer::with_messages(10);
        let (mut view, _rx) = loaded(&server, 30).await;

        assert_eq!(view.load_state(), LoadState::Ready);
        assert_eq!(ids(&view), (1..=10).collect::<Vec<_>>());
        assert!(view.history_exhausted());
        assert_eq!(server.requests.lock()[0], PageRequest { before: None, take: 30 });

        // One row per message, five visible.
        assert_eq!(view.layout(5, 10), 5);
        assert!(!view.is_animating());
    }

    #[tokio::test]
    async fn initial_load_acknowledges_unread_from_other_side() {
        let server = FakeServer::with_messages(4);
        let (view, _rx) = loaded(&server, 30).await;
        settle().await;

        let mut acked = server.acknowledged.lock().clone();
        acked.sort();
        assert_eq!(acked, vec![MessageId::new(1), MessageId::new(3)]);
        assert!(view.messages().iter().filter(|m| !view.is_own(m)).all(|m| m.is_read));
        assert!(view.messages().iter().filter(|m| view.is_own(m)).all(|m| !m.is_read));
    }

    #[tokio::test]
    async fn failed_initial_load_stays_loading_and_retries() {
        let server = FakeServer::with_messages(3);
        *server.fail_fetches.lock() = true;
        let (mut view, mut rx) = view_with(&server, 30);

        assert!(view.load_initial());
        assert!(!view.load_initial());
        let update = next_update(&mut rx).await;
        view.apply(update);
        assert_eq!(view.load_state(), LoadState::Loading);
        assert!(view.load_error().is_some());

        *server.fail_fetches.lock() = false;
        assert!(view.load_initial());
        let update = next_update(&mut rx).await;
        view.apply(update);
        assert_eq!(view.load_state(), LoadState::Ready);
        assert_eq!(view.load_error(), None);
    }

    #[tokio::test]
    async fn stale_epoch_is_dropped() {
        let server = FakeServer::with_messages(3);
        let (mut view, _rx) = view_with(&server, 30);

        let stale = ViewUpdate::Page {
            epoch: view.epoch() + 1,
            kind: FetchKind::Initial,
            result: Ok(vec![message(1, THEM, false)]),
        };
        assert!(!view.apply(stale));
        assert!(view.messages().is_empty());
        assert_eq!(view.load_state(), LoadState::Loading);
    }

    // =========================================================================
    // Backward Paging
    // =========================================================================

    #[tokio::test]
    async fn scrolling_to_top_loads_older_and_keeps_anchor() {
        let server = FakeServer::with_messages(70);
        let (mut view, mut rx) = loaded(&server, 30).await;
        assert_eq!(ids(&view).first(), Some(&41));
        view.layout(10, 30);

        // Far from the top: nothing happens.
        assert!(!view.maybe_load_older());

        view.scroll_by(-19);
        assert_eq!(view.viewport().offset, 1);
        assert!(view.maybe_load_older());
        assert!(!view.maybe_load_older());
        assert!(view.is_loading_older());

        let update = next_update(&mut rx).await;
        view.apply(update);
        assert_eq!(ids(&view).first(), Some(&11));
        assert_eq!(server.requests.lock()[1].before, Some(MessageId::new(41)));

        // Thirty rows were added above the visible one.
        assert_eq!(view.layout(10, 60), 31);
        assert!(!view.history_exhausted());
    }

    #[tokio::test]
    async fn short_older_page_stops_paging() {
        let server = FakeServer::with_messages(40);
        let (mut view, mut rx) = loaded(&server, 30).await;
        view.layout(10, 30);
        view.scroll_by(-100);

        assert!(view.maybe_load_older());
        let update = next_update(&mut rx).await;
        view.apply(update);
        assert_eq!(ids(&view).len(), 40);
        assert!(view.history_exhausted());

        view.layout(10, 40);
        view.scroll_by(-100);
        assert!(!view.maybe_load_older());
    }

    #[tokio::test]
    async fn failed_older_fetch_can_retry() {
        let server = FakeServer::with_messages(70);
        let (mut view, mut rx) = loaded(&server, 30).await;
        view.layout(10, 30);
        view.scroll_by(-100);

        *server.fail_fetches.lock() = true;
        assert!(view.maybe_load_older());
        let update = next_update(&mut rx).await;
        view.apply(update);
        assert!(!view.is_loading_older());
        assert_eq!(ids(&view).len(), 30);

        *server.fail_fetches.lock() = false;
        assert!(view.maybe_load_older());
    }

    // =========================================================================
    // Live Events
    // =========================================================================

    #[tokio::test]
    async fn live_message_from_other_side_keeps_scrolled_up_position() {
        let server = FakeServer::with_messages(30);
        let (mut view, _rx) = loaded(&server, 30).await;
        view.layout(10, 30);
        view.scroll_by(-15);

        view.apply(live(&view, LiveEvent::Created(message(31, THEM, false))));
        assert_eq!(view.layout(10, 31), 5);
        assert!(!view.is_animating());
        assert!(view.messages().last().is_some_and(|m| m.is_read));

        settle().await;
        assert!(server.acknowledged.lock().contains(&MessageId::new(31)));
    }

    #[tokio::test]
    async fn own_live_message_animates_to_bottom() {
        let server = FakeServer::with_messages(30);
        let (mut view, _rx) = loaded(&server, 30).await;
        view.layout(10, 30);
        view.scroll_by(-15);

        view.apply(live(&view, LiveEvent::Created(message(31, ME, false))));
        assert_eq!(view.layout(10, 31), 5);
        assert!(view.is_animating());

        while view.tick_animation() {}
        assert_eq!(view.viewport().offset, 21);
    }

    #[tokio::test]
    async fn read_and_delete_events_update_store() {
        let server = FakeServer::with_messages(4);
        let (mut view, _rx) = loaded(&server, 30).await;
        view.layout(10, 4);

        view.apply(live(&view, LiveEvent::Read(MessageId::new(2))));
        assert!(view.messages()[1].is_read);

        view.apply(live(&view, LiveEvent::Deleted(MessageId::new(3))));
        assert_eq!(ids(&view), vec![1, 2, 4]);

        // Unknown IDs change nothing.
        view.apply(live(&view, LiveEvent::Deleted(MessageId::new(99))));
        assert_eq!(ids(&view), vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn message_for_other_thread_is_ignored() {
        let server = FakeServer::with_messages(2);
        let (mut view, _rx) = loaded(&server, 30).await;

        let mut foreign = message(50, THEM, false);
        foreign.thread_id = ThreadId::new(99);
        view.apply(live(&view, LiveEvent::Created(foreign)));
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[tokio::test]
    async fn join_triggers_reconciliation() {
        let server = FakeServer::with_messages(5);
        let (mut view, mut rx) = loaded(&server, 30).await;

        // Missed while not joined.
        server.messages.lock().push(message(6, THEM, false));
        server.messages.lock().retain(|m| m.id != MessageId::new(2));

        view.apply(live(&view, LiveEvent::Joined));
        assert_eq!(view.live_status(), &LiveStatus::Joined);
        let update = next_update(&mut rx).await;
        view.apply(update);

        assert_eq!(ids(&view), vec![1, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn live_message_during_reconciliation_survives_stale_page() {
        let server = FakeServer::with_messages(5);
        let (mut view, mut rx) = loaded(&server, 30).await;

        view.apply(live(&view, LiveEvent::Joined));
        // Delivered live before the catch-up page lands; the page never saw it.
        view.apply(live(&view, LiveEvent::Created(message(6, THEM, false))));
        assert_eq!(ids(&view), vec![1, 2, 3, 4, 5, 6]);

        let reconcile = next_update(&mut rx).await;
        assert!(matches!(
            reconcile,
            ViewUpdate::Page {
                kind: FetchKind::Reconcile {
                    known_newest: Some(id)
                },
                ..
            } if id == MessageId::new(5)
        ));
        view.apply(reconcile);

        assert_eq!(ids(&view), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn empty_reconcile_page_keeps_later_live_message() {
        let server = FakeServer::with_messages(2);
        let (mut view, mut rx) = loaded(&server, 30).await;

        // Everything known was deleted while offline.
        server.messages.lock().clear();
        view.apply(live(&view, LiveEvent::Joined));
        view.apply(live(&view, LiveEvent::Created(message(3, ME, false))));

        let reconcile = next_update(&mut rx).await;
        view.apply(reconcile);

        assert_eq!(ids(&view), vec![3]);
    }

    #[tokio::test]
    async fn events_before_first_page_defer_to_reconciliation() {
        let server = FakeServer::with_messages(3);
        let (mut view, mut rx) = view_with(&server, 30);
        view.load_initial();

        view.apply(live(&view, LiveEvent::Created(message(4, THEM, false))));
        assert!(view.messages().is_empty());
        server.messages.lock().push(message(4, THEM, false));

        let initial = next_update(&mut rx).await;
        view.apply(initial);
        let reconcile = next_update(&mut rx).await;
        assert!(matches!(
            reconcile,
            ViewUpdate::Page {
                kind: FetchKind::Reconcile { .. },
                ..
            }
        ));
        view.apply(reconcile);
        assert_eq!(ids(&view), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn connection_states_are_tracked() {
        let server = FakeServer::with_messages(1);
        let (mut view, _rx) = view_with(&server, 30);

        view.apply(live(&view, LiveEvent::Reconnecting { attempt: 2 }));
        assert_eq!(view.live_status(), &LiveStatus::Reconnecting { attempt: 2 });

        view.apply(live(&view, LiveEvent::Closed { error: Some("gone".to_string()) }));
        assert_eq!(view.live_status(), &LiveStatus::Offline(Some("gone".to_string())));
    }

    // =========================================================================
    // Send and Delete
    // =========================================================================

    #[tokio::test]
    async fn send_appends_and_scrolls() {
        let server = FakeServer::with_messages(30);
        let (mut view, mut rx) = loaded(&server, 30).await;
        view.layout(10, 30);
        view.scroll_by(-15);

        assert!(!view.send("   "));
        assert!(view.send(" hello "));
        assert!(!view.send("again"));
        assert!(view.is_sending());

        let update = next_update(&mut rx).await;
        view.apply(update);
        assert!(!view.is_sending());
        assert_eq!(view.messages().last().map(Message::text), Some("hello"));
        view.layout(10, 31);
        assert!(view.is_animating());
    }

    #[tokio::test]
    async fn failed_send_is_reported_inline() {
        let server = FakeServer::with_messages(2);
        *server.fail_sends.lock() = true;
        let (mut view, mut rx) = loaded(&server, 30).await;

        view.send("lost words");
        let update = next_update(&mut rx).await;
        view.apply(update);

        assert!(view.send_error().is_some_and(|e| e.contains("500")));
        assert_eq!(view.take_failed_draft().as_deref(), Some("lost words"));
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[tokio::test]
    async fn delete_is_optimistic_and_limited_to_own_messages() {
        let server = FakeServer::with_messages(4);
        let (mut view, _rx) = loaded(&server, 30).await;

        assert!(!view.delete(MessageId::new(3)));
        assert!(view.delete(MessageId::new(4)));
        assert_eq!(ids(&view), vec![1, 2, 3]);

        settle().await;
        // The request failed; the local removal stays.
        assert_eq!(*server.deleted.lock(), vec![MessageId::new(4)]);
        assert_eq!(ids(&view), vec![1, 2, 3]);
    }
}
