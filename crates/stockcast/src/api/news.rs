//! Company news from a search-backed chat model

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use stockcast_llm::providers::{OpenAiCompatible, ProviderConfig};
use stockcast_llm::{ChatProvider, ChatRequest};

use crate::error::Result;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const NEWS_SYSTEM_PROMPT: &str = "You are a financial news expert. Provide accurate information \
about the latest news concerning the specified company. Focus on factual reporting and avoid \
opinions or predictions unless they are explicitly stated in the news. Structure your response \
as a list of news items. Format each news item as a bulleted list with the title and summary \
separated by a colon. Example: * Title: Summary.  Do not include any introductory or concluding \
statements.";

/// Source of free-text company news
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Recent news about `company` as free text, `None` when the reply is empty
    async fn fetch_news_text(&self, company: &str) -> Result<Option<String>>;
}

/// News client for Perplexity's OpenAI-compatible chat API
pub struct PerplexityNewsClient {
    provider: Arc<dyn ChatProvider>,
    model: String,
    rate_limiter: SharedRateLimiter,
}

impl PerplexityNewsClient {
    /// Create a client against `api_base`
    ///
    /// # Arguments
    /// * `rate_limit` - Requests per minute
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let config = ProviderConfig::new(api_key, api_base)
            .timeout(timeout)
            .named("perplexity");
        let provider = OpenAiCompatible::new(config)?;

        Ok(Self::with_provider(Arc::new(provider), model, rate_limit))
    }

    /// Use an already constructed chat provider
    pub fn with_provider(
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        rate_limit: u32,
    ) -> Self {
        let per_minute = NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN);
        Self {
            provider,
            model: model.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    fn request(&self, company: &str) -> ChatRequest {
        ChatRequest::builder(&self.model)
            .system(NEWS_SYSTEM_PROMPT)
            .user(format!(
                "give me the most recent and important news updates for {company}."
            ))
            .max_tokens(300)
            .temperature(0.2)
            .top_p(0.9)
            .extra("return_images", json!(false))
            .extra("return_related_questions", json!(false))
            .extra("web_search_options", json!({ "search_context_size": "high" }))
            .build()
    }
}

#[async_trait]
impl NewsSource for PerplexityNewsClient {
    #[instrument(skip(self))]
    async fn fetch_news_text(&self, company: &str) -> Result<Option<String>> {
        self.rate_limiter.until_ready().await;

        let reply = self.provider.chat(self.request(company)).await?;
        let text = reply.text().map(str::to_string);

        debug!(
            provider = self.provider.name(),
            tokens = reply.usage.total(),
            truncated = reply.truncated(),
            empty = text.is_none(),
            "news completion received"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockcast_llm::{ChatError, ChatReply, FinishReason, Usage};
    use std::sync::Mutex;

    struct RecordingProvider {
        reply: Option<String>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatProvider for RecordingProvider {
        async fn chat(&self, request: ChatRequest) -> stockcast_llm::Result<ChatReply> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Some(text) => Ok(ChatReply {
                    content: Some(text.clone()),
                    finish: FinishReason::Stop,
                    usage: Usage::default(),
                }),
                None => Err(ChatError::RateLimited("quota exhausted".to_string())),
            }
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_request_shape() {
        let provider = Arc::new(RecordingProvider {
            reply: Some("* **Deal**: Signed".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let client = PerplexityNewsClient::with_provider(provider.clone(), "sonar", 60);

        let text = client.fetch_news_text("RELIANCE").await.unwrap();
        assert_eq!(text.as_deref(), Some("* **Deal**: Signed"));

        let seen = provider.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.model, "sonar");
        assert_eq!(request.max_tokens, 300);
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.system.as_deref().unwrap().contains("* Title: Summary"));
        assert!(
            request
                .prompt()
                .unwrap()
                .ends_with("news updates for RELIANCE.")
        );
        assert_eq!(request.extra["return_images"], json!(false));
        assert_eq!(
            request.extra["web_search_options"]["search_context_size"],
            json!("high")
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_news_unavailable() {
        let provider = Arc::new(RecordingProvider {
            reply: None,
            seen: Mutex::new(Vec::new()),
        });
        let client = PerplexityNewsClient::with_provider(provider, "sonar", 60);

        let err = client.fetch_news_text("TCS").await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_rejects_empty_key() {
        let result = PerplexityNewsClient::new(
            "",
            "https://api.perplexity.ai",
            "sonar",
            60,
            Duration::from_secs(30),
        );
        assert!(result.is_err());
    }
}
