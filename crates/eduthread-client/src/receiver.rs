//! Live updates for the open conversation.
//!
//! `LiveReceiver` owns a hub subscription and turns its invocations into
//! typed `LiveEvent`s, posted to the view's update channel under the view's
//! epoch. Dropping the receiver ends the subscription.

use eduthread_core::{Message, MessageId, ThreadId};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::HubError;
use crate::hub::{HubClient, HubEvent};
use crate::view::ViewUpdate;

/// Server method announcing a new message.
pub const MESSAGE_CREATED: &str = "MessageCreated";
/// Server method announcing a read acknowledgement.
pub const MESSAGE_READ: &str = "MessageRead";
/// Server method announcing a deletion.
pub const MESSAGE_DELETED: &str = "MessageDeleted";

/// A push event for the open conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Transport connected.
    Connected,
    /// Conversation joined; events flow from here on.
    Joined,
    /// A message was sent.
    Created(Message),
    /// A message was read by its recipient.
    Read(MessageId),
    /// A message was deleted.
    Deleted(MessageId),
    /// Connection lost, reconnect attempt pending.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: usize,
    },
    /// No more live updates.
    Closed {
        /// Reason, if abnormal.
        error: Option<String>,
    },
}

/// Read and delete notifications carry the message, an object with its ID, or
/// the bare ID.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageRef {
    Full(Message),
    Keyed { id: MessageId },
    Bare(MessageId),
}

impl MessageRef {
    fn id(&self) -> MessageId {
        match self {
            Self::Full(message) => message.id,
            Self::Keyed { id } | Self::Bare(id) => *id,
        }
    }
}

fn first_argument(target: &str, arguments: &[Value]) -> Result<Value, HubError> {
    arguments
        .first()
        .cloned()
        .ok_or_else(|| HubError::Protocol(format!("{target} without arguments")))
}

/// Decode a server invocation. Unknown targets yield `Ok(None)`.
///
/// Targets are matched case-insensitively.
///
/// # Errors
///
/// Returns an error if a known target carries an undecodable argument.
pub fn decode_invocation(target: &str, arguments: &[Value]) -> Result<Option<LiveEvent>, HubError> {
    if target.eq_ignore_ascii_case(MESSAGE_CREATED) {
        let message: Message = serde_json::from_value(first_argument(target, arguments)?)?;
        Ok(Some(LiveEvent::Created(message)))
    } else if target.eq_ignore_ascii_case(MESSAGE_READ) {
        let reference: MessageRef = serde_json::from_value(first_argument(target, arguments)?)?;
        Ok(Some(LiveEvent::Read(reference.id())))
    } else if target.eq_ignore_ascii_case(MESSAGE_DELETED) {
        let reference: MessageRef = serde_json::from_value(first_argument(target, arguments)?)?;
        Ok(Some(LiveEvent::Deleted(reference.id())))
    } else {
        Ok(None)
    }
}

/// Map a hub event to a live event. Undecodable invocations are logged and
/// dropped.
#[must_use]
pub fn translate(event: HubEvent) -> Option<LiveEvent> {
    match event {
        HubEvent::Connected => Some(LiveEvent::Connected),
        HubEvent::Joined => Some(LiveEvent::Joined),
        HubEvent::Reconnecting { attempt, .. } => Some(LiveEvent::Reconnecting { attempt }),
        HubEvent::Closed { error } => Some(LiveEvent::Closed { error }),
        HubEvent::Invocation { target, arguments } => {
            match decode_invocation(&target, &arguments) {
                Ok(Some(event)) => Some(event),
                Ok(None) => {
                    debug!(target = %target, "Ignoring unknown hub method");
                    None
                }
                Err(e) => {
                    debug!(target = %target, error = %e, "Failed to decode hub invocation");
                    None
                }
            }
        }
    }
}

/// Running live subscription of one view.
#[derive(Debug)]
pub struct LiveReceiver {
    thread_id: ThreadId,
    shutdown: watch::Sender<bool>,
    forward: JoinHandle<()>,
}

impl LiveReceiver {
    /// Subscribe to `thread_id` and forward its events as `ViewUpdate::Live`
    /// tagged with `epoch`.
    #[must_use]
    pub fn start(
        hub: HubClient,
        thread_id: ThreadId,
        epoch: u64,
        updates: mpsc::Sender<ViewUpdate>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (hub_tx, mut hub_rx) = mpsc::channel::<HubEvent>(64);

        // The subscription task ends on shutdown or when `hub_rx` is gone.
        drop(hub.subscribe(thread_id, hub_tx, shutdown_rx));

        let forward = tokio::spawn(async move {
            while let Some(event) = hub_rx.recv().await {
                let Some(event) = translate(event) else {
                    continue;
                };
                if updates.send(ViewUpdate::Live { epoch, event }).await.is_err() {
                    break;
                }
            }
        });

        Self {
            thread_id,
            shutdown,
            forward,
        }
    }

    /// Conversation this receiver listens to.
    #[must_use]
    pub const fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the subscription has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.forward.is_finished()
    }

    /// Ask the subscription to leave the conversation and disconnect.
    pub fn stop(&self) {
        if self.shutdown.send(true).is_ok() {
            debug!(thread_id = %self.thread_id, "Stopping live receiver");
        }
    }
}

impl Drop for LiveReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_json(id: i64) -> Value {
        json!({
            "id": id,
            "threadId": 4,
            "senderUserId": "u-2",
            "content": "hello",
            "sentAt": "2024-05-01T10:00:00Z",
            "isRead": false
        })
    }

    #[test]
    fn decode_created() {
        let event = decode_invocation("MessageCreated", &[message_json(9)]).unwrap();
        match event {
            Some(LiveEvent::Created(message)) => {
                assert_eq!(message.id, MessageId::new(9));
                assert_eq!(message.thread_id, ThreadId::new(4));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_read_accepts_message_object_or_id() {
        assert_eq!(
            decode_invocation("MessageRead", &[message_json(3)]).unwrap(),
            Some(LiveEvent::Read(MessageId::new(3)))
        );
        assert_eq!(
            decode_invocation("MessageRead", &[json!(3)]).unwrap(),
            Some(LiveEvent::Read(MessageId::new(3)))
        );
        assert_eq!(
            decode_invocation("messagedeleted", &[json!({"id": 8})]).unwrap(),
            Some(LiveEvent::Deleted(MessageId::new(8)))
        );
    }

    #[test]
    fn decode_errors() {
        assert!(decode_invocation("MessageCreated", &[]).is_err());
        assert!(decode_invocation("MessageCreated", &[json!("oops")]).is_err());
        assert_eq!(decode_invocation("TypingStarted", &[json!(1)]).unwrap(), None);
    }

    #[test]
    fn translate_lifecycle_events() {
        assert_eq!(translate(HubEvent::Joined), Some(LiveEvent::Joined));
        assert_eq!(
            translate(HubEvent::Reconnecting {
                attempt: 2,
                error: "reset".to_string()
            }),
            Some(LiveEvent::Reconnecting { attempt: 2 })
        );
        assert_eq!(
            translate(HubEvent::Invocation {
                target: "MessageRead".to_string(),
                arguments: vec![json!("bad")]
            }),
            None
        );
    }
}
