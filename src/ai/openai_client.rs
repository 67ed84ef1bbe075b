// OpenAI chat completions client

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::completion::{CompletionClient, Message};
use crate::config::CompletionConfig;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    endpoint: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            model: config.model_name().to_string(),
            // 0 leaves the limit to the API
            max_tokens: (config.max_tokens > 0).then_some(config.max_tokens),
            endpoint: format!("{}/chat/completions", config.base_url().trim_end_matches('/')),
            client,
        })
    }

    /// First choice's content
    fn extract_text(response: ChatResponse) -> Result<String> {
        let choice = response.choices.into_iter().next().ok_or(Error::EmptyCompletion)?;
        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!("completion truncated at max_tokens");
        }
        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(Error::EmptyCompletion),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        Self::extract_text(chat_response)
    }

    fn describe(&self) -> String {
        format!("openai:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![Message::user("歌詞を書いて")];
        let request = ChatRequest { model: "gpt-4o-mini", messages: &messages, max_tokens: None };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_extract_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"【タイトル】"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(OpenAiClient::extract_text(response).unwrap(), "【タイトル】");
    }

    #[test]
    fn test_extract_no_choices() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(OpenAiClient::extract_text(response), Err(Error::EmptyCompletion)));
    }

    #[test]
    fn test_extract_null_content() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(OpenAiClient::extract_text(response), Err(Error::EmptyCompletion)));
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let mut config = CompletionConfig::default();
        config.base_url = Some("http://localhost:8080/v1/".to_string());
        let client = OpenAiClient::new(&config, "sk-test".to_string()).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8080/v1/chat/completions");
    }
}
