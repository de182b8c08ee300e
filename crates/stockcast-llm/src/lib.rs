//! Minimal chat-completion client used for news retrieval
//!
//! The types here model a single-turn exchange: a system instruction, one or
//! more user turns, sampling knobs, and provider-specific body fields. Any
//! service that speaks the OpenAI `/chat/completions` wire format (Perplexity
//! included) is reachable through [`providers::OpenAiCompatible`].

pub mod error;
pub mod provider;
pub mod request;

pub use error::{ChatError, Result};
pub use provider::ChatProvider;
pub use request::{ChatReply, ChatRequest, ChatRequestBuilder, FinishReason, Role, Turn, Usage};

#[cfg(feature = "openai")]
pub mod providers;
