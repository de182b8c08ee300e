//! Client for the OpenAI `/chat/completions` wire format
//!
//! Perplexity's `sonar` models accept the same body, plus search options
//! passed through [`ChatRequest::extra`].
//!
//! ```no_run
//! use stockcast_llm::{ChatProvider, ChatRequest};
//! use stockcast_llm::providers::{OpenAiCompatible, ProviderConfig};
//!
//! # async fn run() -> stockcast_llm::Result<()> {
//! let config = ProviderConfig::new("pplx-...", "https://api.perplexity.ai").named("perplexity");
//! let client = OpenAiCompatible::new(config)?;
//!
//! let reply = client
//!     .chat(ChatRequest::builder("sonar").user("Latest news for Infosys").build())
//!     .await?;
//! println!("{}", reply.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::{ChatError, ChatProvider, ChatReply, ChatRequest, FinishReason, Result, Role, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Base URL without the `/chat/completions` suffix
    pub api_base: String,
    pub timeout: Duration,
    pub name: String,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
            name: "openai".to_string(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

pub struct OpenAiCompatible {
    http: Client,
    config: ProviderConfig,
}

impl OpenAiCompatible {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::Config(format!("{} API key is empty", config.name)));
        }
        if config.timeout.is_zero() {
            return Err(ChatError::Config("timeout must be non-zero".to_string()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatible {
    #[instrument(skip_all, fields(provider = %self.config.name, model = %request.model))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&WireRequest::from(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat request rejected");
            return Err(ChatError::from_status(status.as_u16(), body));
        }

        let wire: WireReply = response
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        let reply = wire.into_reply()?;

        debug!(
            finish = ?reply.finish,
            tokens = reply.usage.total(),
            "chat reply received"
        );
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<ChatRequest> for WireRequest {
    fn from(request: ChatRequest) -> Self {
        let system = request.system.map(|content| WireMessage {
            role: Role::System,
            content,
        });
        let messages = system
            .into_iter()
            .chain(request.turns.into_iter().map(|t| WireMessage {
                role: t.role,
                content: t.content,
            }))
            .collect();

        Self {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: false,
            extra: request.extra,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireReply {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl WireReply {
    fn into_reply(self) -> Result<ChatReply> {
        let choice = self.choices.into_iter().next().ok_or(ChatError::NoChoices)?;
        Ok(ChatReply {
            content: choice.message.content,
            finish: FinishReason::from_wire(choice.finish_reason.as_deref()),
            usage: self.usage.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_blank_key() {
        let result = OpenAiCompatible::new(ProviderConfig::new("  ", "https://api.perplexity.ai"));
        assert!(matches!(result, Err(ChatError::Config(_))));
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = ProviderConfig::new("pplx-test", "https://api.perplexity.ai/")
            .timeout(Duration::from_secs(30))
            .named("perplexity");
        assert_eq!(config.endpoint(), "https://api.perplexity.ai/chat/completions");

        let client = OpenAiCompatible::new(config).unwrap();
        assert_eq!(client.name(), "perplexity");
    }

    #[test]
    fn wire_body_puts_system_first() {
        let request = ChatRequest::builder("sonar")
            .system("be factual")
            .user("news please")
            .top_p(0.9)
            .extra("web_search_options", json!({"search_context_size": "high"}))
            .build();

        let body = serde_json::to_value(WireRequest::from(request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "news please");
        assert_eq!(body["stream"], false);
        assert_eq!(body["web_search_options"]["search_context_size"], "high");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn reply_takes_first_choice() {
        let wire: WireReply = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "* A: b"}, "finish_reason": "length"},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 34}
        }))
        .unwrap();
        let reply = wire.into_reply().unwrap();

        assert_eq!(reply.text(), Some("* A: b"));
        assert!(reply.truncated());
        assert_eq!(reply.usage.total(), 46);
    }

    #[test]
    fn no_choices_is_error() {
        let wire: WireReply = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(wire.into_reply(), Err(ChatError::NoChoices)));
    }
}
