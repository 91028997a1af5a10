//! Remote journal service.
//!
//! The backup talks to the service only through [`JournalApi`], a blocking
//! capability covering the listing, entry, user info and comment export
//! endpoints. [`HttpJournalApi`] implements it over HTTP; tests use an
//! in-memory fake.
//!
//! Authentication is not modelled here: the HTTP client forwards an opaque
//! bearer token when one is configured.

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpJournalApi;
pub use types::{
    CommentBodies, CommentBody, CommentMeta, CommentMetaPage, EventsResponse, SessionHandle,
    SyncItem, SyncItemKind, SyncItemsPage,
};

use chrono::NaiveDateTime;

use crate::model::UserInfo;

/// Errors from the remote capability.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Connection, TLS or timeout failure.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String, timeout: bool },

    /// Non-success HTTP status.
    #[error("Remote returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("Malformed response from {url}: {message}")]
    Decode { url: String, message: String },

    /// Client could not be set up.
    #[error("Remote client setup failed: {0}")]
    Setup(String),
}

impl RemoteError {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } | Self::Setup(_) => false,
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Blocking access to one account on the remote journal service.
pub trait JournalApi {
    /// Account owner description.
    fn fetch_userinfo(&self) -> RemoteResult<UserInfo>;

    /// Items changed since `cursor` (everything when `None`).
    fn list_changes(&self, cursor: Option<NaiveDateTime>) -> RemoteResult<SyncItemsPage>;

    /// Full content of one entry; a well-behaved remote returns exactly one
    /// event.
    fn fetch_entry(&self, entry_id: u64) -> RemoteResult<EventsResponse>;

    /// Open a session for the comment export endpoints.
    fn open_session(&self) -> RemoteResult<SessionHandle>;

    fn close_session(&self, session: &SessionHandle) -> RemoteResult<()>;

    /// Comment metadata for ids above `highest`.
    fn fetch_comment_meta(&self, highest: u64, session: &SessionHandle)
    -> RemoteResult<CommentMetaPage>;

    /// Comment bodies for ids above `highest`.
    fn fetch_comment_bodies(&self, highest: u64, session: &SessionHandle)
    -> RemoteResult<CommentBodies>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let transport = RemoteError::Transport {
            url: "u".into(),
            message: "reset".into(),
            timeout: false,
        };
        assert!(transport.is_retryable());

        let status = |status| RemoteError::Status {
            url: "u".into(),
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());

        let decode = RemoteError::Decode {
            url: "u".into(),
            message: "eof".into(),
        };
        assert!(!decode.is_retryable());
    }
}
