// Anthropic Messages API client
//
// System-role messages are lifted into the request's `system` field since
// the API only accepts user/assistant turns in `messages`.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::completion::{CompletionClient, Message, Role};
use crate::config::CompletionConfig;
use crate::error::{Error, Result};

const CLAUDE_VERSION: &str = "2023-06-01";
/// The Messages API requires a limit; used when the config leaves it at 0
const FALLBACK_MAX_TOKENS: u32 = 4096;

/// Request to Claude API
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

/// Response from Claude API
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

pub struct ClaudeClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    client: Client,
}

impl ClaudeClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            model: config.model_name().to_string(),
            max_tokens: if config.max_tokens > 0 { config.max_tokens } else { FALLBACK_MAX_TOKENS },
            endpoint: format!("{}/messages", config.base_url().trim_end_matches('/')),
            client,
        })
    }

    fn build_request(&self, messages: Vec<Message>) -> ClaudeRequest {
        let (system, turns): (Vec<Message>, Vec<Message>) =
            messages.into_iter().partition(|m| m.role == Role::System);
        let system = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .into_iter()
                    .map(|m| m.content)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };

        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: turns,
            system,
        }
    }

    /// Join the text blocks of a response
    fn extract_text(response: ClaudeResponse) -> Result<String> {
        let text = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(Error::EmptyCompletion);
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for ClaudeClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let request = self.build_request(messages);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", CLAUDE_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Api { status, body });
        }

        let claude_response: ClaudeResponse = response.json().await?;
        if let Some(reason) = claude_response.stop_reason.as_deref() {
            if reason == "max_tokens" {
                tracing::warn!(max_tokens = self.max_tokens, "completion truncated at max_tokens");
            }
        }
        Self::extract_text(claude_response)
    }

    fn describe(&self) -> String {
        format!("anthropic:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ClaudeClient {
        let mut config = CompletionConfig::default();
        config.provider = crate::config::Provider::Anthropic;
        ClaudeClient::new(&config, "sk-ant-test".to_string()).unwrap()
    }

    #[test]
    fn test_system_messages_lifted() {
        let messages = vec![
            Message { role: Role::System, content: "be brief".to_string() },
            Message::user("write lyrics"),
        ];
        let request = client().build_request(messages);
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_no_system_field_when_absent() {
        let request = client().build_request(vec![Message::user("hi")]);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let response: ClaudeResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"【タイトル】"},{"type":"tool_use"},{"type":"text","text":"歌詞"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(ClaudeClient::extract_text(response).unwrap(), "【タイトル】\n歌詞");
    }

    #[test]
    fn test_zero_max_tokens_uses_fallback() {
        let mut config = CompletionConfig::default();
        config.provider = crate::config::Provider::Anthropic;
        config.max_tokens = 0;
        let client = ClaudeClient::new(&config, "sk-ant-test".to_string()).unwrap();
        assert_eq!(client.build_request(vec![Message::user("hi")]).max_tokens, FALLBACK_MAX_TOKENS);
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let response: ClaudeResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(ClaudeClient::extract_text(response), Err(Error::EmptyCompletion)));
    }
}
