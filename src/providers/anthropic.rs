//! Anthropic backend over the `/v1/messages` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    check_http_response, http_client, CompletionRequest, CompletionResponse, LlmProvider,
    ProviderError, Role, UsageStats,
};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Used when a request does not set its own budget.
const FALLBACK_MAX_TOKENS: u32 = 512;

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Body posted to `/v1/messages`.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct MessagesBody {
    /// Model name without the `anthropic/` prefix.
    pub model: String,
    /// User and assistant turns.
    pub messages: Vec<WireTurn>,
    /// Generation budget.
    pub max_tokens: u32,
    /// System prompt, sent as a top-level field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// One turn on the wire.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct WireTurn {
    /// `user` or `assistant`.
    pub role: &'static str,
    /// Turn text.
    pub content: String,
}

/// Reply from `/v1/messages`.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct MessagesReply {
    /// Content blocks; only `text` blocks are read.
    #[serde(default)]
    pub content: Vec<ReplyBlock>,
    /// Model that answered.
    pub model: String,
    /// Token counts.
    #[serde(default)]
    pub usage: ReplyUsage,
}

/// Content block in a reply.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyBlock {
    /// Generated text.
    Text {
        /// Block text.
        text: String,
    },
    /// Tool calls, thinking and anything newer.
    #[serde(other)]
    Ignored,
}

/// Token counts in a reply.
#[doc(hidden)]
#[derive(Debug, Default, Deserialize)]
pub struct ReplyUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u32,
    /// Generated tokens.
    #[serde(default)]
    pub output_tokens: u32,
}

/// Map a completion request onto the wire body.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> MessagesBody {
    MessagesBody {
        model: model.to_owned(),
        messages: request
            .messages
            .iter()
            .map(|m| WireTurn {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect(),
        max_tokens: request.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
        system: request.system.clone(),
    }
}

/// Decode a reply body. Text blocks are concatenated in order.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] when the body is not a messages reply.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let reply: MessagesReply =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let mut text = String::new();
    for block in reply.content {
        if let ReplyBlock::Text { text: part } = block {
            text.push_str(&part);
        }
    }

    Ok(CompletionResponse {
        text,
        usage: UsageStats {
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
        },
        model: reply.model,
    })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// [`LlmProvider`] for Anthropic models.
pub struct AnthropicProvider {
    spec: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("spec", &self.spec)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a provider for `spec` (`anthropic/<model>`) calling `model`.
    pub fn new(spec: String, model: String, api_key: String, timeout: Duration) -> Self {
        Self {
            spec,
            model,
            api_key,
            client: http_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = build_request(&self.model, &request);
        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let raw = check_http_response(response).await?;
        let completion = parse_response(&raw)?;
        debug!(
            model = %completion.model,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "anthropic completion"
        );
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.spec
    }
}
