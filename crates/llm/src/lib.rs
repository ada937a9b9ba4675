//! Model invocation crate for fewshot.
//!
//! A provider-agnostic abstraction for submitting an ordered `user`/`model`
//! message list and getting plain text back.
//!
//! # Providers
//! - **Gemini**: `generateContent` REST API (default)
//! - **Ollama**: local runtime via `/api/chat`
//! - **Scripted**: canned replies, for tests and offline use
//!
//! # Example
//! ```no_run
//! use fewshot_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    ChatMessage, ChatPart, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage, TEXT_PLAIN,
};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient, ScriptedClient, ScriptedReply};
pub use types::ProviderType;
