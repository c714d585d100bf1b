//! Application state.
//!
//! This module holds the thread list, the open `ThreadView`, the input line
//! and the dialogs, and coordinates them with the REST client.

use std::sync::Arc;
use std::time::Duration;

use eduthread_client::{ApiClient, ClientError, MessageApi, ThreadView, ViewUpdate};
use eduthread_core::{
    Companion, CurrentUser, GuardianId, Message, MessageId, TeacherId, Thread, ThreadId, UserRole,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How often the thread list is refreshed while idle.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Which UI column has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Left column: conversation list.
    #[default]
    Threads,
    /// Right column: messages and input.
    Chat,
}

impl Focus {
    /// Toggle to the other column.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Threads => Self::Chat,
            Self::Chat => Self::Threads,
        }
    }
}

/// Input mode for dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    /// No dialog open.
    #[default]
    Normal,
    /// Choosing a person to start a conversation with.
    CreatingThread,
    /// Confirming deletion of the selected conversation.
    ConfirmingDeleteThread,
    /// Confirming deletion of a message.
    ConfirmingDeleteMessage(MessageId),
}

/// A conversation in the list, with the other participant's name.
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    /// The conversation.
    pub thread: Thread,
    /// Display name of the other participant.
    pub companion: String,
}

/// Application state.
pub struct App {
    client: ApiClient,
    /// The signed-in user.
    pub me: CurrentUser,
    companions: Vec<Companion>,
    /// Conversations of the current user.
    pub threads: Vec<ThreadEntry>,
    /// Selected index in `threads`.
    pub selected_thread: Option<usize>,
    /// The open conversation.
    pub view: Option<ThreadView>,
    /// Name of the other participant of the open conversation.
    pub view_companion: String,
    next_epoch: u64,
    updates: mpsc::Sender<ViewUpdate>,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in `input`, in characters.
    pub cursor_position: usize,
    /// Which panel has focus.
    pub focus: Focus,
    /// Current dialog.
    pub input_mode: InputMode,
    /// When true in the chat column, keys are commands instead of text.
    pub command_mode: bool,
    /// Message highlighted in command mode.
    pub selected_message: Option<MessageId>,
    /// People without a conversation yet, offered by the create dialog.
    pub create_choices: Vec<Companion>,
    /// Selected index in `create_choices`.
    pub create_selected: usize,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
    saved_chat_input: Option<(String, usize)>,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(client: ApiClient, me: CurrentUser, updates: mpsc::Sender<ViewUpdate>) -> Self {
        Self {
            client,
            me,
            companions: Vec::new(),
            threads: Vec::new(),
            selected_thread: None,
            view: None,
            view_companion: String::new(),
            next_epoch: 0,
            updates,
            input: String::new(),
            cursor_position: 0,
            focus: Focus::Threads,
            input_mode: InputMode::Normal,
            command_mode: false,
            selected_message: None,
            create_choices: Vec::new(),
            create_selected: 0,
            status_message: None,
            error_message: None,
            should_quit: false,
            animation_frame: 0,
            saved_chat_input: None,
        }
    }

    /// Server origin for display.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.client.config().base_url
    }

    /// Enter a dialog mode, saving the current chat input.
    pub fn enter_dialog_mode(&mut self, mode: InputMode) {
        self.saved_chat_input = Some((std::mem::take(&mut self.input), self.cursor_position));
        self.cursor_position = 0;
        self.input_mode = mode;
    }

    /// Exit dialog mode, restoring the saved chat input.
    pub fn exit_dialog_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        if let Some((input, cursor)) = self.saved_chat_input.take() {
            self.input = input;
            self.cursor_position = cursor;
        } else {
            self.clear_input();
        }
    }

    /// Advance animations. Returns `true` if anything moved.
    pub fn tick(&mut self) -> bool {
        self.animation_frame = self.animation_frame.wrapping_add(1);
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        let moved = view.tick_animation();
        view.maybe_load_older();
        moved || view.is_loading_older()
    }

    /// Get current spinner character for loading animation.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Report a failed API call; authorization failures get a hint.
    pub fn report(&mut self, action: &str, error: &ClientError) {
        warn!(action, error = %error, "Request failed");
        if error.is_auth() {
            self.set_error(format!("{action}: not authorized, check the token"));
        } else {
            self.set_error(format!("{action}: {error}"));
        }
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    // =========================================================================
    // Thread List
    // =========================================================================

    /// Selected conversation.
    #[must_use]
    pub fn selected_thread(&self) -> Option<&ThreadEntry> {
        self.selected_thread.and_then(|i| self.threads.get(i))
    }

    /// Move selection up in the thread list.
    pub fn select_prev_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.selected_thread = Some(match self.selected_thread {
            Some(0) | None => self.threads.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Move selection down in the thread list.
    pub fn select_next_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.selected_thread = Some(match self.selected_thread {
            Some(i) if i + 1 < self.threads.len() => i + 1,
            _ => 0,
        });
    }

    /// Display name for the other participant of `thread`.
    #[must_use]
    pub fn companion_name(&self, thread: &Thread) -> String {
        let Some(entity) = thread.companion_entity(self.me.role) else {
            return format!("Thread #{}", thread.id);
        };
        self.companions
            .iter()
            .find(|c| c.id == entity)
            .map_or_else(
                || match self.me.role.companion() {
                    Some(role) => format!("{} #{entity}", role.as_str()),
                    None => format!("#{entity}"),
                },
                |c| c.user.full_name(),
            )
    }

    fn entry(&self, thread: Thread) -> ThreadEntry {
        let companion = self.companion_name(&thread);
        ThreadEntry { thread, companion }
    }

    /// Load the people the current user may talk to.
    pub async fn load_companions(&mut self) -> Result<(), ClientError> {
        self.companions = self.client.list_companions(self.me.role).await?;
        let threads: Vec<Thread> = self.threads.drain(..).map(|e| e.thread).collect();
        self.threads = threads.into_iter().map(|t| self.entry(t)).collect();
        Ok(())
    }

    /// Refresh the thread list from the API.
    pub async fn refresh_threads(&mut self) -> Result<(), ClientError> {
        let selected = self.selected_thread().map(|e| e.thread.id);
        let threads = self.client.list_threads().await?;
        self.threads = threads.into_iter().map(|t| self.entry(t)).collect();

        self.selected_thread = selected
            .and_then(|id| self.threads.iter().position(|e| e.thread.id == id))
            .or(if self.threads.is_empty() { None } else { Some(0) });
        Ok(())
    }

    /// Open the create dialog with everyone who has no conversation yet.
    pub fn begin_create_thread(&mut self) {
        if self.me.role.companion().is_none() {
            self.set_error(format!("{}s cannot start conversations", self.me.role.as_str()));
            return;
        }
        let taken: Vec<i64> = self
            .threads
            .iter()
            .filter_map(|e| e.thread.companion_entity(self.me.role))
            .collect();
        self.create_choices = self
            .companions
            .iter()
            .filter(|c| !taken.contains(&c.id))
            .cloned()
            .collect();
        self.create_selected = 0;
        if self.create_choices.is_empty() {
            self.set_status("Everyone already has a conversation with you");
            return;
        }
        self.enter_dialog_mode(InputMode::CreatingThread);
    }

    /// Move the create dialog selection by one.
    pub fn move_create_selection(&mut self, down: bool) {
        let len = self.create_choices.len();
        if len == 0 {
            return;
        }
        self.create_selected = if down {
            (self.create_selected + 1) % len
        } else {
            (self.create_selected + len - 1) % len
        };
    }

    /// Participant IDs for a conversation with `companion`.
    fn participants(&self, companion: &Companion) -> Option<(TeacherId, GuardianId)> {
        match self.me.role {
            UserRole::Teacher => Some((
                TeacherId::new(self.me.entity_id),
                GuardianId::new(companion.id),
            )),
            UserRole::Guardian => Some((
                TeacherId::new(companion.id),
                GuardianId::new(self.me.entity_id),
            )),
            _ => None,
        }
    }

    /// Create a conversation with the selected choice and open it.
    pub async fn create_selected_thread(&mut self) -> Result<(), ClientError> {
        let Some(companion) = self.create_choices.get(self.create_selected).cloned() else {
            return Ok(());
        };
        let Some((teacher_id, guardian_id)) = self.participants(&companion) else {
            return Ok(());
        };

        let thread = self.client.create_thread(teacher_id, guardian_id).await?;
        info!(thread_id = %thread.id, "Created conversation");
        let id = thread.id;
        let entry = self.entry(thread);
        self.threads.push(entry);
        self.selected_thread = Some(self.threads.len() - 1);
        self.set_status(format!("Started conversation with {}", companion.user.full_name()));
        self.open_thread(id);
        Ok(())
    }

    /// Delete the selected conversation, closing it if open.
    pub async fn delete_selected_thread(&mut self) -> Result<(), ClientError> {
        let Some(entry) = self.selected_thread().cloned() else {
            return Ok(());
        };
        self.client.delete_thread(entry.thread.id).await?;
        if self.view.as_ref().map(ThreadView::thread_id) == Some(entry.thread.id) {
            self.close_thread();
        }
        self.set_status(format!("Deleted conversation with {}", entry.companion));
        self.refresh_threads().await
    }

    /// Make sure `thread_id` is in the list, fetching it if needed.
    pub async fn ensure_thread(&mut self, thread_id: ThreadId) -> Result<(), ClientError> {
        if let Some(i) = self.threads.iter().position(|e| e.thread.id == thread_id) {
            self.selected_thread = Some(i);
            return Ok(());
        }
        let thread = self.client.get_thread(thread_id).await?;
        let entry = self.entry(thread);
        self.threads.push(entry);
        self.selected_thread = Some(self.threads.len() - 1);
        Ok(())
    }

    // =========================================================================
    // Thread View
    // =========================================================================

    /// Open the selected conversation.
    pub fn open_selected_thread(&mut self) {
        if let Some(id) = self.selected_thread().map(|e| e.thread.id) {
            self.open_thread(id);
        }
    }

    /// Open `thread_id`, replacing any open conversation.
    pub fn open_thread(&mut self, thread_id: ThreadId) {
        if self.view.as_ref().map(ThreadView::thread_id) == Some(thread_id) {
            self.focus = Focus::Chat;
            return;
        }
        self.close_thread();

        self.next_epoch += 1;
        let config = self.client.config().clone();
        let api: Arc<dyn MessageApi> = Arc::new(self.client.clone());
        match ThreadView::new(
            api,
            thread_id,
            self.me.id.clone(),
            config.page_size,
            config.view,
            self.next_epoch,
            self.updates.clone(),
        ) {
            Ok(mut view) => {
                view.load_initial();
                view.start_live(self.client.hub());
                self.view_companion = self
                    .threads
                    .iter()
                    .find(|e| e.thread.id == thread_id)
                    .map_or_else(|| format!("Thread #{thread_id}"), |e| e.companion.clone());
                self.view = Some(view);
                self.focus = Focus::Chat;
                self.command_mode = false;
            }
            Err(e) => self.set_error(format!("Cannot open conversation: {e}")),
        }
    }

    /// Close the open conversation.
    pub fn close_thread(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.close();
        }
        self.selected_message = None;
        self.view_companion.clear();
    }

    /// Apply a view completion. Returns `true` if the screen should redraw.
    pub fn handle_view_update(&mut self, update: ViewUpdate) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if !view.apply(update) {
            return false;
        }
        if let Some(draft) = view.take_failed_draft() {
            if self.input.is_empty() && self.input_mode == InputMode::Normal {
                self.cursor_position = draft.chars().count();
                self.input = draft;
            }
        }
        if let Some(id) = self.selected_message {
            if !view.messages().iter().any(|m| m.id == id) {
                self.selected_message = None;
            }
        }
        true
    }

    /// Retry loading the open conversation after a failure.
    pub fn retry_load(&mut self) {
        if let Some(view) = self.view.as_mut() {
            if view.load_initial() {
                self.set_status("Retrying...");
            }
        }
    }

    /// Send the input line to the open conversation.
    pub fn send_input(&mut self) {
        let Some(view) = self.view.as_mut() else {
            self.set_error("No conversation open");
            return;
        };
        if view.send(&self.input) {
            self.clear_input();
        }
    }

    /// Scroll the message list; negative is up.
    pub fn scroll_chat(&mut self, delta: isize) {
        if let Some(view) = self.view.as_mut() {
            view.scroll_by(delta);
            view.maybe_load_older();
        }
    }

    /// Rows in one page of the message list.
    #[must_use]
    pub fn chat_page(&self) -> isize {
        self.view.as_ref().map_or(10, |v| {
            isize::try_from(v.viewport().height.max(2) - 1).unwrap_or(10)
        })
    }

    /// Own messages of the open conversation, oldest first.
    fn own_messages(&self) -> Vec<&Message> {
        self.view
            .as_ref()
            .map(|v| v.messages().iter().filter(|m| v.is_own(m)).collect())
            .unwrap_or_default()
    }

    /// Move the message highlight among own messages.
    pub fn select_message(&mut self, older: bool) {
        let own: Vec<MessageId> = self.own_messages().iter().map(|m| m.id).collect();
        if own.is_empty() {
            self.selected_message = None;
            return;
        }
        let current = self
            .selected_message
            .and_then(|id| own.iter().position(|m| *m == id));
        let next = match (current, older) {
            (None, _) => own.len() - 1,
            (Some(0), true) => 0,
            (Some(i), true) => i - 1,
            (Some(i), false) => (i + 1).min(own.len() - 1),
        };
        self.selected_message = Some(own[next]);
    }

    /// Ask to delete the highlighted message.
    pub fn begin_delete_message(&mut self) {
        match self.selected_message {
            Some(id) => self.enter_dialog_mode(InputMode::ConfirmingDeleteMessage(id)),
            None => self.set_status("Select one of your messages with Up/Down first"),
        }
    }

    /// Delete `id` from the open conversation.
    pub fn delete_message(&mut self, id: MessageId) {
        if let Some(view) = self.view.as_mut() {
            if view.delete(id) {
                self.selected_message = None;
                self.set_status("Message deleted");
            }
        }
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    fn byte_index(&self, chars: usize) -> usize {
        self.input
            .char_indices()
            .nth(chars)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn input_chars(&self) -> usize {
        self.input.chars().count()
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_chars() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    /// Delete the word before the cursor.
    pub fn delete_word(&mut self) {
        while self.cursor_position > 0 {
            self.delete_char();
            let prev = self
                .cursor_position
                .checked_sub(1)
                .and_then(|i| self.input.chars().nth(i));
            if !matches!(prev, Some(c) if c != ' ') {
                break;
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input_chars() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input_chars();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }
}
