// AI module: prompt assembly and completion API clients
//
// This module provides:
// - The lyric prompt template and form field model
// - A provider-neutral completion client trait
// - OpenAI and Anthropic HTTP clients
// - Keychain storage for API keys

pub mod prompt;
pub mod completion;
pub mod openai_client;
pub mod claude_client;
pub mod credentials;

// Re-export commonly used types
pub use claude_client::ClaudeClient;
pub use completion::{CompletionClient, Message, Role, build_client};
pub use credentials::CredentialManager;
pub use openai_client::OpenAiClient;
pub use prompt::{FieldName, FormFields, assemble_prompt, build_messages};
