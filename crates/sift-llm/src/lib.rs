//! Chat-completion clients used to classify chunks

use anyhow::Result;
use async_trait::async_trait;

mod openai;

pub use openai::{OpenAiChatModel, OpenAiSettings};

/// The three-part prompt sent for every chunk
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    /// System-role instruction describing the task
    pub system: &'a str,
    /// Assistant-role instruction pinning the reply format
    pub format: &'a str,
    /// User-role serialized rows
    pub content: &'a str,
}

/// Trait implemented by concrete chat model backends.
///
/// Replies are free text; callers must not assume they follow the
/// requested format.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name, for logs and progress messages
    fn name(&self) -> &str;

    /// Send one prompt and return the reply text, trimmed
    async fn complete(&self, prompt: ChatPrompt<'_>) -> Result<String>;
}
