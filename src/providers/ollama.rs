//! Local Ollama backend over `/api/chat`, non-streaming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    check_http_response, http_client, CompletionRequest, CompletionResponse, LlmProvider,
    ProviderError, Role, UsageStats,
};

/// Where a local Ollama listens by default.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Body posted to `/api/chat`.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatBody {
    /// Local model tag, e.g. `llama3.1:8b`.
    pub model: String,
    /// System prompt first, then the turns.
    pub messages: Vec<ChatTurn>,
    /// Always `false`: one JSON object back.
    pub stream: bool,
    /// Sampling options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

/// One chat turn, used both ways.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Turn text.
    #[serde(default)]
    pub content: String,
}

/// Sampling options.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatOptions {
    /// Generation budget in tokens.
    pub num_predict: u32,
}

/// Reply from `/api/chat`.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    /// The assistant turn.
    pub message: ChatTurn,
    /// Model tag that answered.
    pub model: String,
    /// Prompt tokens, when reported.
    pub prompt_eval_count: Option<u32>,
    /// Generated tokens, when reported.
    pub eval_count: Option<u32>,
}

/// Map a completion request onto the wire body. The system prompt becomes a
/// leading `system` turn.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> ChatBody {
    let system = request.system.iter().map(|s| ChatTurn {
        role: "system".to_owned(),
        content: s.clone(),
    });
    let turns = request.messages.iter().map(|m| ChatTurn {
        role: match m.role {
            Role::User => "user".to_owned(),
            Role::Assistant => "assistant".to_owned(),
        },
        content: m.content.clone(),
    });

    ChatBody {
        model: model.to_owned(),
        messages: system.chain(turns).collect(),
        stream: false,
        options: request
            .max_tokens
            .map(|num_predict| ChatOptions { num_predict }),
    }
}

/// Decode a reply body.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] when the body is not a chat reply.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let reply: ChatReply =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(CompletionResponse {
        text: reply.message.content,
        usage: UsageStats {
            input_tokens: reply.prompt_eval_count.unwrap_or_default(),
            output_tokens: reply.eval_count.unwrap_or_default(),
        },
        model: reply.model,
    })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// [`LlmProvider`] for models served by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    spec: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for `spec` (`ollama/<model>`). A missing base URL
    /// means [`DEFAULT_OLLAMA_URL`].
    pub fn new(spec: String, model: String, base_url: Option<String>, timeout: Duration) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_owned());
        Self {
            spec,
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: http_client(timeout),
        }
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = build_request(&self.model, &request);
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let raw = check_http_response(response).await?;
        let completion = parse_response(&raw)?;
        debug!(model = %completion.model, "ollama completion");
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.spec
    }
}
