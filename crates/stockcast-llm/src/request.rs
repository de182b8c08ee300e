//! Request and reply types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat request; the system instruction is sent ahead of `turns`
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Merged into the JSON body as top-level fields
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn builder(model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder {
            request: ChatRequest {
                model: model.into(),
                system: None,
                turns: Vec::new(),
                max_tokens: 512,
                temperature: None,
                top_p: None,
                extra: Map::new(),
            },
        }
    }

    /// Text of the last user turn
    pub fn prompt(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }
}

pub struct ChatRequestBuilder {
    request: ChatRequest,
}

impl ChatRequestBuilder {
    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.request.system = Some(text.into());
        self
    }

    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.request.turns.push(Turn::user(text));
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.request.top_p = Some(top_p);
        self
    }

    /// Provider-specific body field, e.g. Perplexity's `web_search_options`
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.request.extra.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ChatRequest {
        self.request
    }
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    Other,
}

impl FinishReason {
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            None | Some("stop") => Self::Stop,
            Some("length") => Self::Length,
            Some(_) => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Usage {
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

/// First choice of a chat reply
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub finish: FinishReason,
    pub usage: Usage,
}

impl ChatReply {
    /// Reply text, `None` when absent or blank
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Whether the reply was cut off by `max_tokens`
    pub fn truncated(&self) -> bool {
        self.finish == FinishReason::Length
    }
}
