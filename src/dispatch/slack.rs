//! Slack Web API transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::taste::sanitize_error_body;

use super::{ChannelHandle, Messenger, MessengerError};

const CONNECT_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Error code returned when an email has no Slack user.
const USER_NOT_FOUND: &str = "users_not_found";

/// Envelope shared by every Web API response.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct SlackEnvelope {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Error code when `ok` is false.
    pub error: Option<String>,
    /// Opened conversation (`conversations.open`).
    pub channel: Option<SlackChannel>,
    /// Resolved user (`users.lookupByEmail`).
    pub user: Option<SlackUser>,
}

/// Conversation object.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct SlackChannel {
    /// Conversation id.
    pub id: String,
}

/// User object.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct SlackUser {
    /// User id.
    pub id: String,
}

/// Parse an envelope and fail when `ok` is false.
#[doc(hidden)]
pub fn parse_envelope(body: &str) -> Result<SlackEnvelope, MessengerError> {
    let envelope: SlackEnvelope =
        serde_json::from_str(body).map_err(|e| MessengerError::Parse(e.to_string()))?;
    if !envelope.ok {
        return Err(MessengerError::Api(
            envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
        ));
    }
    Ok(envelope)
}

/// Extract the conversation id from a `conversations.open` response.
#[doc(hidden)]
pub fn parse_open(body: &str) -> Result<ChannelHandle, MessengerError> {
    parse_envelope(body)?
        .channel
        .map(|c| ChannelHandle(c.id))
        .ok_or_else(|| MessengerError::Parse("conversations.open returned no channel".to_owned()))
}

/// Extract the user id from a `users.lookupByEmail` response. An unknown
/// email is `Ok(None)`.
#[doc(hidden)]
pub fn parse_lookup(body: &str) -> Result<Option<String>, MessengerError> {
    match parse_envelope(body) {
        Ok(envelope) => Ok(envelope.user.map(|u| u.id)),
        Err(MessengerError::Api(code)) if code == USER_NOT_FOUND => Ok(None),
        Err(e) => Err(e),
    }
}

/// [`Messenger`] over the Slack Web API with a bot token.
pub struct SlackMessenger {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for SlackMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackMessenger")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl SlackMessenger {
    /// Create a messenger for `base_url` (e.g. `https://slack.com/api`).
    pub fn new(base_url: &str, token: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    async fn read(response: reqwest::Response, method: &str) -> Result<String, MessengerError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MessengerError::HttpStatus {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }
        debug!(method, bytes = body.len(), "slack response");
        Ok(body)
    }

    async fn post(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<String, MessengerError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        Self::read(response, method).await
    }
}

#[async_trait]
impl Messenger for SlackMessenger {
    async fn open_conversation(&self, identity: &str) -> Result<ChannelHandle, MessengerError> {
        let body = self
            .post("conversations.open", json!({ "users": identity }))
            .await?;
        parse_open(&body)
    }

    async fn post_message(
        &self,
        channel: &ChannelHandle,
        content: &str,
    ) -> Result<(), MessengerError> {
        let body = self
            .post(
                "chat.postMessage",
                json!({ "channel": channel.0, "text": content }),
            )
            .await?;
        parse_envelope(&body).map(|_| ())
    }

    async fn lookup_identity_by_contact(
        &self,
        contact: &str,
    ) -> Result<Option<String>, MessengerError> {
        let response = self
            .client
            .get(format!("{}/users.lookupByEmail", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("email", contact)])
            .send()
            .await?;
        let body = Self::read(response, "users.lookupByEmail").await?;
        parse_lookup(&body)
    }
}
