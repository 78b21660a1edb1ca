//! Error taxonomy and context helpers.
//!
//! This module contains:
//! - `ChatError`: the crate-wide error type split by failure class
//! - `ResultExt`: an extension trait that reduces duplicate `.map_err()`
//!   patterns when classifying errors

use std::fmt;

/// Crate-wide error type.
///
/// The class of an error decides how callers react: network failures surface
/// as a transient notice, malformed frames are dropped without touching
/// state. Push-channel failures are not errors at all; they surface as
/// refused sends or missing write acks and route to the REST fallback.
#[derive(Debug)]
pub enum ChatError {
    /// REST call failure (request, status, or body decode).
    Network(String),
    /// Unparsable push payload; the frame is skipped, never a crash.
    MalformedFrame(String),
    /// Local persistence failure (sqlite or cache serialization).
    Storage(String),
    /// Invalid endpoint configuration.
    Config(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Network(msg) => write!(f, "network error: {}", msg),
            ChatError::MalformedFrame(msg) => write!(f, "malformed frame: {}", msg),
            ChatError::Storage(msg) => write!(f, "storage error: {}", msg),
            ChatError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}

/// Extension trait for classifying Result errors with added context.
pub trait ResultExt<T, E> {
    /// Classify as a network failure with context.
    fn net_context(self, msg: &str) -> Result<T, ChatError>;

    /// Classify as a storage failure with context.
    fn storage_context(self, msg: &str) -> Result<T, ChatError>;
}

impl<T, E: fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn net_context(self, msg: &str) -> Result<T, ChatError> {
        self.map_err(|e| ChatError::Network(format!("{}: {}", msg, e)))
    }

    fn storage_context(self, msg: &str) -> Result<T, ChatError> {
        self.map_err(|e| ChatError::Storage(format!("{}: {}", msg, e)))
    }
}
