// Completion client boundary
//
// The form only ever talks to `dyn CompletionClient`. Concrete HTTP clients
// live in `openai_client` and `claude_client`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClaudeClient, OpenAiClient};
use crate::config::{CompletionConfig, Provider};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message { role: Role::User, content: content.into() }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the messages and return the generated text. One request, no retry.
    async fn complete(&self, messages: Vec<Message>) -> Result<String>;

    /// Short identifier for logs and the status endpoint
    fn describe(&self) -> String;
}

/// Create the client for the configured provider.
pub fn build_client(config: &CompletionConfig, api_key: String) -> Result<Box<dyn CompletionClient>> {
    let client: Box<dyn CompletionClient> = match config.provider {
        Provider::OpenAi => Box::new(OpenAiClient::new(config, api_key)?),
        Provider::Anthropic => Box::new(ClaudeClient::new(config, api_key)?),
    };
    tracing::info!(client = %client.describe(), "completion client ready");
    Ok(client)
}
