//! HTTP client for the school REST API.
//!
//! `MessageApi` is the seam the thread view talks through, so views can be
//! driven by a test double. `ApiClient` is the reqwest implementation and also
//! carries the conversation list and account operations.

use async_trait::async_trait;
use eduthread_core::{
    Companion, CurrentUser, GuardianId, Message, MessageId, PageRequest, TeacherId, Thread,
    ThreadId, UserRole,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::hub::HubClient;
use crate::types::{ApiErrorResponse, CreateThreadRequest, SendMessageRequest};

/// Message operations of one conversation.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Fetch up to `request.take` messages, newest first or below `request.before`.
    ///
    /// The order of the returned page is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    async fn fetch_page(&self, thread_id: ThreadId, request: PageRequest) -> Result<Vec<Message>>;

    /// Send a message and return it as stored by the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the message.
    async fn send_message(&self, thread_id: ThreadId, content: &str) -> Result<Message>;

    /// Acknowledge a message as read.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn mark_read(&self, thread_id: ThreadId, message_id: MessageId) -> Result<()>;

    /// Delete a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn delete_message(&self, thread_id: ThreadId, message_id: MessageId) -> Result<()>;
}

/// Client for the school REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    ///
    /// * `config` - Server location and timeouts
    /// * `token` - Bearer token for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url(),
            token: token.into(),
            config: config.clone(),
        })
    }

    /// Configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Push hub client using the same server and token.
    #[must_use]
    pub fn hub(&self) -> HubClient {
        HubClient::new(&self.config, self.token.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .ok()
            .and_then(ApiErrorResponse::into_message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        ClientError::Api { status, message }
    }

    /// Send a request and decode the JSON body.
    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorized(request).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Send a request whose response body is ignored.
    async fn fetch_empty(&self, request: RequestBuilder) -> Result<()> {
        let response = self.authorized(request).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        Ok(())
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Get the authenticated user.
    pub async fn current_user(&self) -> Result<CurrentUser> {
        self.fetch_json(self.client.get(self.url("/auth/me"))).await
    }

    /// List the people the current user may open conversations with.
    ///
    /// Only teachers and guardians have companions; other roles get an empty list.
    pub async fn list_companions(&self, role: UserRole) -> Result<Vec<Companion>> {
        let path = match role {
            UserRole::Guardian => "/guardians/me/teachers",
            UserRole::Teacher => "/teachers/me/guardians",
            _ => return Ok(Vec::new()),
        };
        self.fetch_json(self.client.get(self.url(path))).await
    }

    // =========================================================================
    // Thread Operations
    // =========================================================================

    /// List conversations of the current user.
    pub async fn list_threads(&self) -> Result<Vec<Thread>> {
        self.fetch_json(self.client.get(self.url("/threads"))).await
    }

    /// Get a single conversation.
    pub async fn get_thread(&self, thread_id: ThreadId) -> Result<Thread> {
        self.fetch_json(self.client.get(self.url(&format!("/threads/{thread_id}"))))
            .await
    }

    /// Start a conversation between a teacher and a guardian.
    pub async fn create_thread(
        &self,
        teacher_id: TeacherId,
        guardian_id: GuardianId,
    ) -> Result<Thread> {
        let request = CreateThreadRequest {
            teacher_id,
            guardian_id,
        };
        self.fetch_json(self.client.post(self.url("/threads")).json(&request))
            .await
    }

    /// Delete a conversation with all its messages.
    pub async fn delete_thread(&self, thread_id: ThreadId) -> Result<()> {
        self.fetch_empty(self.client.delete(self.url(&format!("/threads/{thread_id}"))))
            .await
    }
}

#[async_trait]
impl MessageApi for ApiClient {
    async fn fetch_page(&self, thread_id: ThreadId, request: PageRequest) -> Result<Vec<Message>> {
        let mut builder = self
            .client
            .get(self.url(&format!("/threads/{thread_id}/messages")))
            .query(&[("take", request.take)]);
        if let Some(before) = request.before {
            builder = builder.query(&[("beforeId", before.get())]);
        }

        debug!(thread_id = %thread_id, before = ?request.before, take = request.take, "Fetching messages");
        self.fetch_json(builder).await
    }

    async fn send_message(&self, thread_id: ThreadId, content: &str) -> Result<Message> {
        let request = SendMessageRequest {
            content: content.to_string(),
        };
        self.fetch_json(
            self.client
                .post(self.url(&format!("/threads/{thread_id}/messages")))
                .json(&request),
        )
        .await
    }

    async fn mark_read(&self, thread_id: ThreadId, message_id: MessageId) -> Result<()> {
        self.fetch_empty(
            self.client
                .patch(self.url(&format!("/threads/{thread_id}/messages/{message_id}")))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn delete_message(&self, thread_id: ThreadId, message_id: MessageId) -> Result<()> {
        self.fetch_empty(
            self.client
                .delete(self.url(&format!("/threads/{thread_id}/messages/{message_id}"))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_include_api_prefix() {
        let config = ClientConfig::with_base_url("http://school.test/");
        let client = ApiClient::new(&config, "tok").unwrap();
        assert_eq!(client.url("/threads"), "http://school.test/api/threads");
    }

    #[test]
    fn hub_client_shares_server() {
        let config = ClientConfig::with_base_url("https://school.test");
        let client = ApiClient::new(&config, "tok").unwrap();
        assert_eq!(client.hub().url(), "wss://school.test/hubs/chat");
    }
}
