//! Chat provider trait

use crate::{ChatReply, ChatRequest, Result};
use async_trait::async_trait;

/// A service that answers a [`ChatRequest`]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the request and wait for the first choice
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
