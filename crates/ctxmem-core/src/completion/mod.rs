//! Text-completion endpoint.
//!
//! Consolidation asks a language model for summaries and fact lists. The
//! subsystem only needs one capability: send role/content messages with a
//! token limit and temperature, get one generated text back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[cfg(feature = "client")]
mod http;

#[cfg(feature = "client")]
pub use http::HttpCompletionClient;

/// Chat role understood by the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: usize, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }
}

/// A text-completion provider
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate one completion for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::system("be brief");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be brief");
    }

    #[test]
    fn test_request_serialization() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")], 500, 0.3);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
