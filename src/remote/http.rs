//! HTTP implementation of [`JournalApi`] against a JSON gateway.
//!
//! Endpoints, relative to `{endpoint}/users/{account}`:
//!
//! | call                   | request                                 |
//! |------------------------|-----------------------------------------|
//! | `fetch_userinfo`       | `GET  /userinfo`                        |
//! | `list_changes`         | `GET  /syncitems?lastsync=<timestamp>`  |
//! | `fetch_entry`          | `GET  /entries/<id>`                    |
//! | `open_session`         | `POST /sessions` → `{"session": "..."}` |
//! | `close_session`        | `DELETE /sessions/<session>`            |
//! | `fetch_comment_meta`   | `GET  /comments/meta?startid=<n>`       |
//! | `fetch_comment_bodies` | `GET  /comments/bodies?startid=<n>`     |
//!
//! The comment endpoints carry the session in an `X-Session` header.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::types::{CommentBodies, CommentMetaPage, EventsResponse, SessionHandle, SyncItemsPage};
use super::{JournalApi, RemoteError, RemoteResult};
use crate::model::{UserInfo, timestamp};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SESSION_HEADER: &str = "X-Session";

/// Blocking HTTP client for one account.
///
/// Owns a tokio runtime and drives every request to completion with
/// `block_on`, so callers stay synchronous.
pub struct HttpJournalApi {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    session: String,
}

impl HttpJournalApi {
    /// Create a client for `account` at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Setup` if the runtime or HTTP client cannot be
    /// created.
    pub fn new(
        endpoint: &str,
        account: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| RemoteError::Setup(format!("Failed to create async runtime: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("journal-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Setup(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            runtime,
            base_url: format!("{}/users/{account}", endpoint.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = format!("{}/{path}", self.base_url);
        let mut builder = self.client.request(method, &url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        (url, builder)
    }

    /// Send a request and decode the JSON response.
    fn send_json<T: DeserializeOwned>(
        &self,
        url: &str,
        builder: RequestBuilder,
    ) -> RemoteResult<T> {
        trace!(%url, "Sending request");
        self.runtime.block_on(async {
            let response = builder.send().await.map_err(|e| transport_error(url, &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(|e| transport_error(url, &e))?;
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<T> {
        let (url, builder) = self.request(Method::GET, path);
        self.send_json(&url, builder.query(query))
    }

    fn get_comments<T: DeserializeOwned>(
        &self,
        kind: &str,
        highest: u64,
        session: &SessionHandle,
    ) -> RemoteResult<T> {
        let (url, builder) = self.request(Method::GET, &format!("comments/{kind}"));
        let builder = builder
            .header(SESSION_HEADER, &session.0)
            .query(&[("startid", highest + 1)]);
        self.send_json(&url, builder)
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        url: url.to_string(),
        message: e.to_string(),
        timeout: e.is_timeout(),
    }
}

impl JournalApi for HttpJournalApi {
    fn fetch_userinfo(&self) -> RemoteResult<UserInfo> {
        self.get_json("userinfo", &[])
    }

    fn list_changes(&self, cursor: Option<NaiveDateTime>) -> RemoteResult<SyncItemsPage> {
        let query: Vec<(&str, String)> = cursor
            .map(|c| ("lastsync", timestamp::format(&c)))
            .into_iter()
            .collect();
        self.get_json("syncitems", &query)
    }

    fn fetch_entry(&self, entry_id: u64) -> RemoteResult<EventsResponse> {
        self.get_json(&format!("entries/{entry_id}"), &[])
    }

    fn open_session(&self) -> RemoteResult<SessionHandle> {
        let (url, builder) = self.request(Method::POST, "sessions");
        let response: SessionResponse = self.send_json(&url, builder)?;
        let handle = SessionHandle(response.session);
        debug!(session = %handle, "Session opened");
        Ok(handle)
    }

    fn close_session(&self, session: &SessionHandle) -> RemoteResult<()> {
        let (url, builder) = self.request(Method::DELETE, &format!("sessions/{}", session.0));
        self.runtime.block_on(async {
            let response = builder.send().await.map_err(|e| transport_error(&url, &e))?;
            let status = response.status();
            if status.is_success() {
                debug!(session = %session, "Session closed");
                Ok(())
            } else {
                Err(RemoteError::Status {
                    url: url.clone(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                })
            }
        })
    }

    fn fetch_comment_meta(
        &self,
        highest: u64,
        session: &SessionHandle,
    ) -> RemoteResult<CommentMetaPage> {
        self.get_comments("meta", highest, session)
    }

    fn fetch_comment_bodies(
        &self,
        highest: u64,
        session: &SessionHandle,
    ) -> RemoteResult<CommentBodies> {
        self.get_comments("bodies", highest, session)
    }
}
