//! History fetches and read acknowledgements.

use std::sync::Arc;

use eduthread_core::{Message, MessageId, PageRequest, ThreadId, UserId};
use tracing::{debug, warn};

use crate::api::MessageApi;
use crate::error::Result;

/// Fetch one page and sort it by ascending message ID.
///
/// # Errors
///
/// Returns the API error unchanged.
pub async fn fetch_sorted(
    api: &dyn MessageApi,
    thread_id: ThreadId,
    request: PageRequest,
) -> Result<Vec<Message>> {
    let mut page = api.fetch_page(thread_id, request).await?;
    page.sort_by_key(|message| message.id);
    debug!(thread_id = %thread_id, received = page.len(), "Fetched page");
    Ok(page)
}

/// IDs of messages `viewer` still has to acknowledge.
#[must_use]
pub fn unread_from_other(messages: &[Message], viewer: &UserId) -> Vec<MessageId> {
    messages
        .iter()
        .filter(|message| message.needs_ack_by(viewer))
        .map(|message| message.id)
        .collect()
}

/// Acknowledge `ids` in the background, one request per message.
///
/// Failures are logged and not retried.
pub fn spawn_acknowledgements(api: Arc<dyn MessageApi>, thread_id: ThreadId, ids: Vec<MessageId>) {
    if ids.is_empty() {
        return;
    }
    tokio::spawn(async move {
        for message_id in ids {
            if let Err(e) = api.mark_read(thread_id, message_id).await {
                warn!(thread_id = %thread_id, message_id = %message_id, error = %e, "Failed to acknowledge message");
            }
        }
    });
}
