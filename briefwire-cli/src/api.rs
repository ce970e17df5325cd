//! Typed REST client for the Briefwire API.

use reqwest::{Client, Response, StatusCode};
use shared::models::{
    AdvanceReadStateRequest, ConversationSummary, ConversationUnreadResponse,
    IngestMessageRequest, MarkAllReadResponse, MessageListResponse, MessageView,
    NotificationCategory, NotificationListResponse, NotificationView, UnreadCountResponse,
};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Client-side error taxonomy. `Auth` tears the stream down and is surfaced;
/// `Network` drives automatic reconnects and is absorbed by the stream
/// consumer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Authenticated API client. One instance per session token; token rotation
/// means constructing a new client (and a new stream).
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Uuid,
}

impl ApiClient {
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(base_url: Url, token: Uuid) -> ClientResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(&format!("api/{path}"))
            .map_err(|err| ClientError::Decode(format!("invalid endpoint {path}: {err}")))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(response: Response) -> ClientResult<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth("session expired or missing".into()));
        }
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// One page of the inbox.
    ///
    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn list_notifications(
        &self,
        category: Option<NotificationCategory>,
        cursor: Option<&str>,
        limit: i64,
        unread_only: bool,
    ) -> ClientResult<NotificationListResponse> {
        let mut url = self.endpoint("notifications")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(category) = category {
                pairs.append_pair("category", category.as_str());
            }
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
            pairs.append_pair("limit", &limit.to_string());
            if unread_only {
                pairs.append_pair("unreadOnly", "true");
            }
        }

        let response = self
            .http
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Unread row count for a category (or all).
    ///
    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn unread_count(
        &self,
        category: Option<NotificationCategory>,
    ) -> ClientResult<i64> {
        let mut url = self.endpoint("notifications/unread-count")?;
        if let Some(category) = category {
            url.query_pairs_mut()
                .append_pair("category", category.as_str());
        }

        let response = self
            .http
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        let counted: UnreadCountResponse = Self::check(response).await?.json().await?;
        Ok(counted.count)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn mark_read(&self, id: Uuid) -> ClientResult<NotificationView> {
        let response = self
            .http
            .post(self.endpoint(&format!("notifications/{id}/read"))?)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn mark_unread(&self, id: Uuid) -> ClientResult<NotificationView> {
        let response = self
            .http
            .post(self.endpoint(&format!("notifications/{id}/unread"))?)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn mark_all_read(
        &self,
        category: Option<NotificationCategory>,
    ) -> ClientResult<i64> {
        let mut url = self.endpoint("notifications/read-all")?;
        if let Some(category) = category {
            url.query_pairs_mut()
                .append_pair("category", category.as_str());
        }

        let response = self
            .http
            .post(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        let marked: MarkAllReadResponse = Self::check(response).await?.json().await?;
        Ok(marked.updated)
    }

    /// Posts a message with its idempotency key.
    ///
    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        request: &IngestMessageRequest,
    ) -> ClientResult<MessageView> {
        let response = self
            .http
            .post(self.endpoint(&format!("conversations/{conversation_id}/messages"))?)
            .header("Authorization", self.bearer())
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        after_seq: Option<i64>,
    ) -> ClientResult<MessageListResponse> {
        let mut url = self.endpoint(&format!("conversations/{conversation_id}/messages"))?;
        if let Some(after_seq) = after_seq {
            url.query_pairs_mut()
                .append_pair("afterSeq", &after_seq.to_string());
        }

        let response = self
            .http
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn advance_read_state(&self, conversation_id: Uuid, seq: i64) -> ClientResult<()> {
        let response = self
            .http
            .post(self.endpoint(&format!("conversations/{conversation_id}/read"))?)
            .header("Authorization", self.bearer())
            .json(&AdvanceReadStateRequest { seq })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Conversation header and membership.
    ///
    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn conversation(&self, conversation_id: Uuid) -> ClientResult<ConversationSummary> {
        let response = self
            .http
            .get(self.endpoint(&format!("conversations/{conversation_id}"))?)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// # Errors
    /// [`ClientError`] on transport, auth, or decode failure.
    pub async fn conversation_unread(&self, conversation_id: Uuid) -> ClientResult<i64> {
        let response = self
            .http
            .get(self.endpoint(&format!("conversations/{conversation_id}/unread"))?)
            .header("Authorization", self.bearer())
            .send()
            .await?;
        let unread: ConversationUnreadResponse = Self::check(response).await?.json().await?;
        Ok(unread.unread)
    }

    /// Opens the long-lived notification stream.
    ///
    /// # Errors
    /// `Auth` on a rejected token, `Network` on transport failure.
    pub async fn open_stream(&self) -> ClientResult<Response> {
        let response = self
            .http
            .get(self.endpoint("notifications/stream")?)
            .header("Authorization", self.bearer())
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_the_api_base() {
        let client = ApiClient::new(
            Url::parse("http://localhost:8080").unwrap(),
            Uuid::new_v4(),
        )
        .unwrap();

        let url = client.endpoint("notifications/unread-count").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/notifications/unread-count");
    }
}
