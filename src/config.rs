//! Endpoint configuration and engine tuning constants.

use std::time::Duration;

use url::Url;

use crate::shared::ChatError;

/// Default history page size; the server clamps limits to 1..=100.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Number of raw messages kept in the per-space persisted cache.
pub const MAX_CACHED_MESSAGES: usize = 50;

/// Fixed delay between reconnect attempts. No backoff growth, no attempt cap.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Silence window after the last compose change before typing-stop is emitted.
pub const TYPING_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Maximum characters shown in a text reply preview.
pub const REPLY_PREVIEW_MAX_CHARS: usize = 40;

/// REST and push-channel endpoints for one deployment.
#[derive(Clone, Debug)]
pub struct Endpoints {
    base_url: Url,
    ws_url: Url,
}

impl Endpoints {
    pub fn new(base_url: &str, ws_url: &str) -> Result<Self, ChatError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ChatError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        let ws_url = Url::parse(ws_url)
            .map_err(|e| ChatError::Config(format!("invalid ws url '{}': {}", ws_url, e)))?;
        Ok(Self { base_url, ws_url })
    }

    fn api(&self, path: &str) -> Result<Url, ChatError> {
        let joined = format!("{}/api/chat/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined)
            .map_err(|e| ChatError::Config(format!("invalid api url '{}': {}", joined, e)))
    }

    pub fn history_url(&self) -> Result<Url, ChatError> {
        self.api("history")
    }

    pub fn readers_url(&self) -> Result<Url, ChatError> {
        self.api("readers")
    }

    pub fn read_url(&self) -> Result<Url, ChatError> {
        self.api("read")
    }

    pub fn send_url(&self) -> Result<Url, ChatError> {
        self.api("send")
    }

    /// One logical push channel per open conversation, addressed by space id.
    pub fn chat_socket_url(&self, space_id: i64) -> Result<Url, ChatError> {
        let joined = format!(
            "{}/ws/chat/{}",
            self.ws_url.as_str().trim_end_matches('/'),
            space_id
        );
        Url::parse(&joined)
            .map_err(|e| ChatError::Config(format!("invalid socket url '{}': {}", joined, e)))
    }
}
