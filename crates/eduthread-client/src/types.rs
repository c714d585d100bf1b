//! Request and response bodies of the REST API.

use eduthread_core::{GuardianId, TeacherId};
use serde::{Deserialize, Serialize};

/// Request to send a message.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// Message text.
    pub content: String,
}

/// Request to start a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    /// Teacher participant.
    pub teacher_id: TeacherId,
    /// Guardian participant.
    pub guardian_id: GuardianId,
}

/// Error body returned by the server.
///
/// The server answers with problem details or a plain `{ "error": .. }`
/// object depending on the endpoint, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorResponse {
    /// Short error string.
    #[serde(default)]
    pub error: Option<String>,
    /// Problem details title.
    #[serde(default)]
    pub title: Option<String>,
    /// Problem details description.
    #[serde(default)]
    pub detail: Option<String>,
    /// Generic message field.
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorResponse {
    /// Most specific message available.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.detail
            .or(self.message)
            .or(self.error)
            .or(self.title)
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_thread_request_is_camel_case() {
        let req = CreateThreadRequest {
            teacher_id: TeacherId::new(2),
            guardian_id: GuardianId::new(7),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"teacherId":2,"guardianId":7}"#);
    }

    #[test]
    fn error_message_prefers_detail() {
        let body: ApiErrorResponse =
            serde_json::from_str(r#"{"title":"Not Found","detail":"Thread 4 not found"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Thread 4 not found"));

        let body: ApiErrorResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("nope"));

        assert_eq!(ApiErrorResponse::default().into_message(), None);
    }
}
