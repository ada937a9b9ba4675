//! Scripted client that replays canned replies.
//!
//! Useful offline and in tests: every request is recorded, and each call
//! pops the next scripted outcome. When the script runs dry the client
//! echoes the last user message back.

use crate::client::{ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use fewshot_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Reply with this text
    Text(String),
    /// Fail as a transport error with this message
    Failure(String),
}

/// An `LlmClient` driven by a queue of scripted replies.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    /// A client with an empty script (echo mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// A client that replies with `replies` in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for reply in replies {
            client.push(ScriptedReply::Text(reply.into()));
        }
        client
    }

    /// Wait `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append an outcome to the script.
    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AppError::Llm("scripted client lock poisoned".to_string()))?
            .pop_front();

        let content = match next {
            Some(ScriptedReply::Text(text)) => text,
            Some(ScriptedReply::Failure(message)) => return Err(AppError::Llm(message)),
            None => request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::User)
                .map(|m| m.text())
                .unwrap_or_default(),
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}
