//! REST client for the chat API.
//!
//! Covers the pull side of synchronization: paginated history, the read
//! roster, and the two POST fallbacks (read announce, message send) used when
//! the push channel is unavailable. REST failures are `ChatError::Network`
//! and are never retried automatically.

use serde::Deserialize;
use serde_json::json;

use crate::config::Endpoints;
use crate::message::types::{Message, MessageCreate, Reader};
use crate::shared::{ChatError, ResultExt};

/// One page of history, ascending by id.
#[derive(Clone, Debug)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<Message>,
    /// Explicit flag when the server provides one.
    has_more: Option<bool>,
}

#[derive(Deserialize)]
struct ReadersResponse {
    #[serde(default)]
    readers: Vec<Reader>,
}

pub struct ChatApi {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl ChatApi {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// `GET history(space_id, limit, before_id?)`.
    ///
    /// `has_more` is taken from the explicit server flag when present, else
    /// inferred as `returned >= limit`.
    pub async fn fetch_history(
        &self,
        space_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<HistoryPage, ChatError> {
        let mut request = self.client.get(self.endpoints.history_url()?).query(&[
            ("space_id", space_id.to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(before) = before_id {
            request = request.query(&[("before_id", before.to_string())]);
        }

        let response = request
            .send()
            .await
            .net_context("history request failed")?
            .error_for_status()
            .net_context("history request rejected")?;
        let body: HistoryResponse = response
            .json()
            .await
            .net_context("history response decode failed")?;

        let has_more = body
            .has_more
            .unwrap_or(body.messages.len() as u32 >= limit);
        Ok(HistoryPage {
            messages: body.messages,
            has_more,
        })
    }

    /// Cheap freshness check: the newest message id, if any.
    pub async fn peek_latest(&self, space_id: i64) -> Result<Option<i64>, ChatError> {
        let page = self.fetch_history(space_id, 1, None).await?;
        Ok(page.messages.last().map(|m| m.id))
    }

    /// `GET readers(space_id)`: the full read-pointer roster for the space.
    pub async fn fetch_readers(&self, space_id: i64) -> Result<Vec<Reader>, ChatError> {
        let response = self
            .client
            .get(self.endpoints.readers_url()?)
            .query(&[("space_id", space_id.to_string())])
            .send()
            .await
            .net_context("readers request failed")?
            .error_for_status()
            .net_context("readers request rejected")?;
        let body: ReadersResponse = response
            .json()
            .await
            .net_context("readers response decode failed")?;
        Ok(body.readers)
    }

    /// `POST read`: fallback announce of the viewer's read pointer.
    pub async fn post_read(
        &self,
        space_id: i64,
        user_id: &str,
        last_read_message_id: i64,
    ) -> Result<(), ChatError> {
        self.client
            .post(self.endpoints.read_url()?)
            .json(&json!({
                "space_id": space_id,
                "user_id": user_id,
                "last_read_message_id": last_read_message_id,
            }))
            .send()
            .await
            .net_context("read announce failed")?
            .error_for_status()
            .net_context("read announce rejected")?;
        Ok(())
    }

    /// `POST send`: fallback transport carrying the identical payload shape
    /// as the socket path, plus `space_id`.
    pub async fn post_send(&self, message: &MessageCreate) -> Result<(), ChatError> {
        self.client
            .post(self.endpoints.send_url()?)
            .json(message)
            .send()
            .await
            .net_context("send fallback failed")?
            .error_for_status()
            .net_context("send fallback rejected")?;
        Ok(())
    }
}
