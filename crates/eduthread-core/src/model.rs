//! Domain records shared by the store and the API client.
//!
//! Field names follow the server's camelCase JSON.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{GuardianId, MessageId, TeacherId, ThreadId, UserId};

// =============================================================================
// Messages
// =============================================================================

/// A single message inside a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned identifier, increasing in send order.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub thread_id: ThreadId,
    /// User account that sent the message.
    pub sender_user_id: UserId,
    /// Text content. `None` for placeholders of deleted content.
    #[serde(default)]
    pub content: Option<String>,
    /// When the server accepted the message.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub sent_at: DateTime<Utc>,
    /// Whether the recipient has read the message.
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Whether `user` authored this message.
    #[must_use]
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_user_id == user
    }

    /// Whether `viewer` should acknowledge this message as read.
    ///
    /// Only unread messages written by the other participant qualify.
    #[must_use]
    pub fn needs_ack_by(&self, viewer: &UserId) -> bool {
        !self.is_read && !self.is_from(viewer)
    }

    /// Content for display, empty when the server sent none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Accept RFC 3339 timestamps as well as offset-less ones, which are UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Parse a server timestamp.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// Threads
// =============================================================================

/// A conversation between one teacher and one guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Conversation identifier.
    pub id: ThreadId,
    /// Teacher participant.
    pub teacher_id: TeacherId,
    /// Guardian participant.
    pub guardian_id: GuardianId,
}

impl Thread {
    /// Entity ID of the participant opposite to a viewer with `role`.
    ///
    /// Returns `None` for roles that do not take part in conversations.
    #[must_use]
    pub const fn companion_entity(&self, role: UserRole) -> Option<i64> {
        match role {
            UserRole::Teacher => Some(self.guardian_id.get()),
            UserRole::Guardian => Some(self.teacher_id.get()),
            _ => None,
        }
    }
}

// =============================================================================
// People
// =============================================================================

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    /// Owner of one or more schools.
    SchoolOwner,
    /// School administrator.
    SchoolAdmin,
    /// Teacher.
    Teacher,
    /// Student.
    Student,
    /// Parent or guardian of a student.
    Guardian,
}

impl UserRole {
    /// Role on the other side of a conversation.
    #[must_use]
    pub const fn companion(self) -> Option<Self> {
        match self {
            Self::Teacher => Some(Self::Guardian),
            Self::Guardian => Some(Self::Teacher),
            _ => None,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchoolOwner => "Owner",
            Self::SchoolAdmin => "Admin",
            Self::Teacher => "Teacher",
            Self::Student => "Student",
            Self::Guardian => "Guardian",
        }
    }
}

/// The authenticated user, as returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// User account ID, matches `Message::sender_user_id`.
    pub id: UserId,
    /// Login name.
    #[serde(default)]
    pub user_name: String,
    /// Given name.
    pub first_name: String,
    /// Middle name.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Account role.
    pub role: UserRole,
    /// Teacher or guardian entity ID for this account.
    pub entity_id: i64,
    /// School the account belongs to.
    #[serde(default)]
    pub school_id: Option<i64>,
}

/// Name parts of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    /// Given name.
    pub first_name: String,
    /// Middle name.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Family name.
    pub last_name: String,
}

impl PersonName {
    /// Space-joined name, skipping empty parts.
    #[must_use]
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A teacher or guardian the current user may talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    /// Teacher or guardian entity ID.
    pub id: i64,
    /// Name of the companion's user account.
    pub user: PersonName,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn message_deserializes_from_server_json() {
        let json = r#"{"id":12,"threadId":3,"senderUserId":"u-1","content":"Hello","sentAt":"2024-09-01T08:30:00Z","isRead":false}"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.id, MessageId::new(12));
        assert_eq!(msg.thread_id, ThreadId::new(3));
        assert_eq!(msg.text(), "Hello");
        assert!(!msg.is_read);
    }

    #[test]
    fn message_accepts_null_content_and_naive_timestamp() {
        let json = r#"{"id":1,"threadId":3,"senderUserId":"u-1","content":null,"sentAt":"2024-09-01T08:30:00.123","isRead":true}"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.content, None);
        assert_eq!(msg.text(), "");
        assert_eq!(msg.sent_at.timestamp_millis() % 1000, 123);
    }

    #[test]
    fn message_serializes_camel_case() {
        let msg = Message {
            id: MessageId::new(5),
            thread_id: ThreadId::new(1),
            sender_user_id: user("u-9"),
            content: Some("hi".to_string()),
            sent_at: parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            is_read: false,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["senderUserId"], "u-9");
        assert_eq!(value["isRead"], false);
        assert_eq!(value["threadId"], 1);
    }

    #[test]
    fn needs_ack_only_for_unread_from_other_side() {
        let mut msg = Message {
            id: MessageId::new(1),
            thread_id: ThreadId::new(1),
            sender_user_id: user("them"),
            content: None,
            sent_at: Utc::now(),
            is_read: false,
        };
        assert!(msg.needs_ack_by(&user("me")));
        assert!(!msg.needs_ack_by(&user("them")));

        msg.is_read = true;
        assert!(!msg.needs_ack_by(&user("me")));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn thread_companion_depends_on_role() {
        let thread = Thread {
            id: ThreadId::new(1),
            teacher_id: TeacherId::new(10),
            guardian_id: GuardianId::new(20),
        };
        assert_eq!(thread.companion_entity(UserRole::Teacher), Some(20));
        assert_eq!(thread.companion_entity(UserRole::Guardian), Some(10));
        assert_eq!(thread.companion_entity(UserRole::SchoolAdmin), None);
    }

    #[test]
    fn role_deserializes_pascal_case() {
        let role: UserRole = serde_json::from_str("\"SchoolOwner\"").unwrap();
        assert_eq!(role, UserRole::SchoolOwner);
        assert_eq!(UserRole::Guardian.companion(), Some(UserRole::Teacher));
        assert_eq!(UserRole::Student.companion(), None);
    }

    #[test]
    fn full_name_skips_missing_middle() {
        let name = PersonName {
            first_name: "Ada".to_string(),
            middle_name: None,
            last_name: "Lovelace".to_string(),
        };
        assert_eq!(name.full_name(), "Ada Lovelace");

        let name = PersonName {
            middle_name: Some("King".to_string()),
            ..name
        };
        assert_eq!(name.full_name(), "Ada King Lovelace");
    }

    #[test]
    fn current_user_deserializes() {
        let json = r#"{"id":"u-1","userName":"jdoe","firstName":"Jane","lastName":"Doe","sex":"F","role":"Teacher","entityId":4,"schoolId":2}"#;
        let me: CurrentUser = serde_json::from_str(json).unwrap();
        assert_eq!(me.role, UserRole::Teacher);
        assert_eq!(me.entity_id, 4);
        assert_eq!(me.school_id, Some(2));
    }
}
