//! Slack Web API client module
//!
//! Wraps the two read endpoints the archiver needs behind the [`SlackApi`]
//! trait. Responses are checked for status, content type and Slack's `ok`
//! flag before they are decoded; nothing is retried.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use slack_morphism::{SlackApiToken, SlackApiTokenValue, SlackChannelId, SlackTs};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::core::config::AppConfig;
use crate::core::models::{RawMessage, UserRecord};
use crate::errors::ArchiveError;

/// One page of `conversations.history`, newest message first.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<UserRecord>,
}

/// Slack's envelope: every Web API body carries `ok` and, on failure, `error`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

/// The read side of the Slack Web API used by the fetchers.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Fetch one history page. `latest` is an exclusive upper bound.
    async fn conversations_history(
        &self,
        channel: &SlackChannelId,
        latest: Option<&SlackTs>,
    ) -> Result<HistoryPage, ArchiveError>;

    async fn users_list(&self) -> Result<UsersListResponse, ArchiveError>;
}

/// reqwest-backed [`SlackApi`].
pub struct SlackClient {
    token: SlackApiToken,
    http: Client,
    base_url: Url,
    page_limit: Option<u16>,
}

impl SlackClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(token: String, base_url: Url, timeout: Duration) -> Result<Self, ArchiveError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::NetworkError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
            http,
            base_url,
            page_limit: None,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ArchiveError> {
        let client = Self::new(
            config.slack_token.clone(),
            config.api_base_url.clone(),
            config.http_timeout,
        )?;
        Ok(client.with_page_limit(config.history_page_limit))
    }

    #[must_use]
    pub fn with_page_limit(mut self, limit: Option<u16>) -> Self {
        self.page_limit = limit;
        self
    }

    fn endpoint(&self, method: &str) -> Result<Url, ArchiveError> {
        self.base_url
            .join(method)
            .map_err(|e| ArchiveError::ProtocolError(format!("{method}: invalid endpoint URL: {e}")))
    }

    async fn get_json<T>(&self, method: &str, query: &[(&str, String)]) -> Result<T, ArchiveError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(method)?;
        debug!("GET {} ({} params)", url, query.len());

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token.token_value.0)
            .query(query)
            .send()
            .await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        check_response(method, resp.status().as_u16(), content_type.as_deref())?;

        let raw = resp.text().await?;
        decode_envelope(method, &raw)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn conversations_history(
        &self,
        channel: &SlackChannelId,
        latest: Option<&SlackTs>,
    ) -> Result<HistoryPage, ArchiveError> {
        let mut query = vec![("channel", channel.0.clone())];
        if let Some(ts) = latest {
            query.push(("latest", ts.0.clone()));
        }
        if let Some(limit) = self.page_limit {
            query.push(("limit", limit.to_string()));
        }

        self.get_json("conversations.history", &query).await
    }

    async fn users_list(&self) -> Result<UsersListResponse, ArchiveError> {
        self.get_json("users.list", &[]).await
    }
}

/// Reject anything that isn't a 2xx JSON response.
///
/// # Errors
///
/// Returns `ProtocolError` naming the method and the offending status or content type.
pub fn check_response(
    method: &str,
    status: u16,
    content_type: Option<&str>,
) -> Result<(), ArchiveError> {
    if !(200..300).contains(&status) {
        return Err(ArchiveError::ProtocolError(format!(
            "{method} HTTP {status}"
        )));
    }

    let is_json = content_type
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"));
    if !is_json {
        return Err(ArchiveError::ProtocolError(format!(
            "{method}: expected application/json but received {}",
            content_type.unwrap_or("no content type")
        )));
    }

    Ok(())
}

/// Decode a Slack body, turning `ok: false` into a `ProtocolError`.
///
/// # Errors
///
/// Returns `ParseError` on malformed JSON and `ProtocolError` when Slack
/// reports a failure.
pub fn decode_envelope<T>(method: &str, raw: &str) -> Result<T, ArchiveError>
where
    T: DeserializeOwned,
{
    let envelope: Envelope<T> = serde_json::from_str(raw)
        .map_err(|e| ArchiveError::ParseError(format!("{method} response: {e}")))?;

    if !envelope.ok {
        return Err(ArchiveError::ProtocolError(format!(
            "{method} error: {}",
            envelope.error.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(envelope.body)
}
